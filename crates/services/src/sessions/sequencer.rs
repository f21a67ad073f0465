use exam_core::model::{CategoryId, CheckpointState, PreparedCategory};

/// Display fallback for a category whose package can no longer be resolved
/// and whose name was never learned.
pub const PACKET_NOT_FOUND: &str = "Packet not found";

/// Classification of one ordered category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionStatus {
    /// A prepared package exists and the category can still be started.
    Pending,
    /// Already finished in this run or a prior pass.
    Completed,
    /// No prepared package and not completed.
    Unavailable,
}

/// One row of the overview screen.
///
/// Question and minute counts are `None` for completed and unavailable
/// sections: those render as text sentinels, never as numeric zero, so a
/// finished category does not read as a zero-length one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub category_id: CategoryId,
    pub display_name: String,
    pub status: SectionStatus,
    pub question_count: Option<u32>,
    pub duration_minutes: Option<u32>,
}

/// Which sections an aggregate total speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalsMode {
    /// Everything still available: pending plus completed work.
    Full,
    /// Checkpoint/resume mode: only what is left to do.
    Remaining,
}

/// Summed numeric counts over the sections a mode includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionTotals {
    pub questions: u32,
    pub minutes: u32,
}

/// Classify every ordered category into exactly one section, in list order.
///
/// The partition is total: prepared wins, then completed, and whatever is
/// left is unavailable. No category is ever skipped or double-counted.
#[must_use]
pub fn classify(checkpoint: &CheckpointState) -> Vec<Section> {
    checkpoint
        .categories()
        .iter()
        .map(|id| {
            if let Some(prepared) = checkpoint.prepared_for(id) {
                Section {
                    category_id: id.clone(),
                    display_name: prepared.category_name.clone(),
                    status: SectionStatus::Pending,
                    question_count: Some(prepared.question_count),
                    duration_minutes: Some(prepared.duration_minutes),
                }
            } else if checkpoint.is_completed(id) {
                Section {
                    category_id: id.clone(),
                    display_name: fallback_name(checkpoint, id),
                    status: SectionStatus::Completed,
                    question_count: None,
                    duration_minutes: None,
                }
            } else {
                Section {
                    category_id: id.clone(),
                    display_name: fallback_name(checkpoint, id),
                    status: SectionStatus::Unavailable,
                    question_count: None,
                    duration_minutes: None,
                }
            }
        })
        .collect()
}

fn fallback_name(checkpoint: &CheckpointState, id: &CategoryId) -> String {
    checkpoint
        .display_name(id)
        .unwrap_or(PACKET_NOT_FOUND)
        .to_owned()
}

/// Sum numeric counts over the sections the mode includes.
///
/// Unavailable sections never count; `Remaining` also drops completed ones,
/// because a resumed overview communicates remaining work, not total work.
#[must_use]
pub fn totals(sections: &[Section], mode: TotalsMode) -> SectionTotals {
    let mut out = SectionTotals::default();
    for section in sections {
        match (section.status, mode) {
            (SectionStatus::Unavailable, _) | (SectionStatus::Completed, TotalsMode::Remaining) => {
                continue;
            }
            _ => {}
        }
        out.questions += section.question_count.unwrap_or(0);
        out.minutes += section.duration_minutes.unwrap_or(0);
    }
    out
}

/// The next category to attempt: the first ordered id that is prepared and
/// not completed.
///
/// Ordered-list order, not prepared-list order; pruning for unavailability
/// must not reshuffle the student's originally presented sequence. `None`
/// means there is no valid next step, never "start from the top".
#[must_use]
pub fn pick_next(checkpoint: &CheckpointState) -> Option<&PreparedCategory> {
    checkpoint
        .categories()
        .iter()
        .filter(|id| !checkpoint.is_completed(id))
        .find_map(|id| checkpoint.prepared_for(id))
}

/// Unrecoverable entry: nothing startable remains but unfinished categories
/// do. Callers must redirect home instead of rendering an overview with no
/// start target.
#[must_use]
pub fn is_dead_end(sections: &[Section]) -> bool {
    let pending = sections
        .iter()
        .filter(|s| s.status == SectionStatus::Pending)
        .count();
    let unavailable = sections
        .iter()
        .filter(|s| s.status == SectionStatus::Unavailable)
        .count();
    pending == 0 && unavailable > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{CheckpointState, PackageId};

    fn prepared(id: &str, name: &str, questions: u32, minutes: u32) -> PreparedCategory {
        PreparedCategory {
            category_id: CategoryId::new(id),
            category_name: name.to_string(),
            package_id: PackageId::new(format!("pkg-{id}")),
            turn: 1,
            question_count: questions,
            duration_minutes: minutes,
        }
    }

    fn ids(names: &[&str]) -> Vec<CategoryId> {
        names.iter().map(|s| CategoryId::new(*s)).collect()
    }

    fn fresh_run() -> CheckpointState {
        CheckpointState::new(
            ids(&["x", "y", "z"]),
            vec![
                prepared("x", "Listening", 10, 15),
                prepared("y", "Reading", 20, 30),
                prepared("z", "Writing", 5, 45),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn fresh_run_picks_first_and_sums_everything() {
        let checkpoint = fresh_run();

        let next = pick_next(&checkpoint).unwrap();
        assert_eq!(next.category_id, CategoryId::new("x"));

        let sections = classify(&checkpoint);
        let full = totals(&sections, TotalsMode::Full);
        assert_eq!(full.questions, 35);
        assert_eq!(full.minutes, 90);
    }

    #[test]
    fn resumed_run_picks_next_and_sums_remaining_only() {
        let mut checkpoint = fresh_run();
        checkpoint.mark_completed(&CategoryId::new("x"));

        let next = pick_next(&checkpoint).unwrap();
        assert_eq!(next.category_id, CategoryId::new("y"));

        let sections = classify(&checkpoint);
        let remaining = totals(&sections, TotalsMode::Remaining);
        assert_eq!(remaining.questions, 25);
        assert_eq!(remaining.minutes, 75);
    }

    #[test]
    fn classification_is_a_total_partition() {
        let mut checkpoint = fresh_run();
        checkpoint.mark_completed(&CategoryId::new("x"));
        let checkpoint = checkpoint.pruned(&CategoryId::new("z"));

        let sections = classify(&checkpoint);

        assert_eq!(sections.len(), checkpoint.categories().len());
        for (section, id) in sections.iter().zip(checkpoint.categories()) {
            assert_eq!(&section.category_id, id);
        }
        assert_eq!(sections[0].status, SectionStatus::Completed);
        assert_eq!(sections[1].status, SectionStatus::Pending);
        assert_eq!(sections[2].status, SectionStatus::Unavailable);
    }

    #[test]
    fn completed_sections_use_sentinels_not_zero() {
        let mut checkpoint = fresh_run();
        checkpoint.mark_completed(&CategoryId::new("x"));

        let sections = classify(&checkpoint);

        assert_eq!(sections[0].status, SectionStatus::Completed);
        assert_eq!(sections[0].display_name, "Listening");
        assert_eq!(sections[0].question_count, None);
        assert_eq!(sections[0].duration_minutes, None);
    }

    #[test]
    fn unknown_unavailable_category_gets_fallback_name_and_dead_ends() {
        let checkpoint = CheckpointState::new(ids(&["x"]), Vec::new(), None).unwrap();

        let sections = classify(&checkpoint);

        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].status, SectionStatus::Unavailable);
        assert_eq!(sections[0].display_name, PACKET_NOT_FOUND);
        assert!(is_dead_end(&sections));
    }

    #[test]
    fn exhausted_run_is_not_a_dead_end() {
        let mut checkpoint = fresh_run();
        for id in ["x", "y", "z"] {
            checkpoint.mark_completed(&CategoryId::new(id));
        }

        let sections = classify(&checkpoint);

        assert!(pick_next(&checkpoint).is_none());
        assert!(!is_dead_end(&sections));
    }

    #[test]
    fn pick_next_is_idempotent_for_unchanged_state() {
        let mut checkpoint = fresh_run();
        checkpoint.mark_completed(&CategoryId::new("x"));

        let first = pick_next(&checkpoint).cloned();
        let second = pick_next(&checkpoint).cloned();
        assert_eq!(first, second);
    }

    #[test]
    fn pick_next_skips_pruned_categories_in_original_order() {
        let checkpoint = fresh_run().pruned(&CategoryId::new("x"));

        let next = pick_next(&checkpoint).unwrap();
        assert_eq!(next.category_id, CategoryId::new("y"));
    }
}
