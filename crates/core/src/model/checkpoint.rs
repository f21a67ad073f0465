use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CategoryId, PackageId, RecordId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CheckpointError {
    #[error("duplicate category in ordered list: {0}")]
    DuplicateCategory(CategoryId),

    #[error("prepared entry references a category outside the ordered list: {0}")]
    ForeignPrepared(CategoryId),
}

/// Server-computed readiness snapshot for one category.
///
/// Produced by the upstream prepare step before the overview renders. Valid
/// only until the referenced package is unpublished or deleted server-side;
/// the client cannot observe that except by a rejected start call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedCategory {
    pub category_id: CategoryId,
    pub category_name: String,
    pub package_id: PackageId,
    pub turn: u32,
    pub question_count: u32,
    pub duration_minutes: u32,
}

/// Client-held description of progress through an ordered multi-category run.
///
/// Every category in the ordered list is, at any time, in exactly one of
/// three states: completed, prepared-and-pending, or unavailable (no
/// prepared entry and not completed). The same serialized shape doubles as
/// the durable reload snapshot and the cross-device metadata sent with a
/// start call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    categories: Vec<CategoryId>,
    completed: BTreeSet<CategoryId>,
    prepared: Vec<PreparedCategory>,
    record_id: Option<RecordId>,
    known_names: BTreeMap<CategoryId, String>,
}

impl CheckpointState {
    /// Create a checkpoint for a fresh run.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError::DuplicateCategory` if the ordered list
    /// repeats an id, or `CheckpointError::ForeignPrepared` if a prepared
    /// entry references a category that is not in the ordered list.
    pub fn new(
        categories: Vec<CategoryId>,
        prepared: Vec<PreparedCategory>,
        record_id: Option<RecordId>,
    ) -> Result<Self, CheckpointError> {
        let mut seen = BTreeSet::new();
        for id in &categories {
            if !seen.insert(id.clone()) {
                return Err(CheckpointError::DuplicateCategory(id.clone()));
            }
        }
        for entry in &prepared {
            if !seen.contains(&entry.category_id) {
                return Err(CheckpointError::ForeignPrepared(entry.category_id.clone()));
            }
        }

        Ok(Self {
            categories,
            completed: BTreeSet::new(),
            prepared,
            record_id,
            known_names: BTreeMap::new(),
        })
    }

    /// Mark categories as already completed (restored runs).
    #[must_use]
    pub fn with_completed(mut self, completed: impl IntoIterator<Item = CategoryId>) -> Self {
        self.completed.extend(completed);
        self
    }

    /// Record display names for categories that have no prepared entry.
    #[must_use]
    pub fn with_known_names(
        mut self,
        names: impl IntoIterator<Item = (CategoryId, String)>,
    ) -> Self {
        self.known_names.extend(names);
        self
    }

    /// The student's originally presented sequence.
    #[must_use]
    pub fn categories(&self) -> &[CategoryId] {
        &self.categories
    }

    #[must_use]
    pub fn completed(&self) -> &BTreeSet<CategoryId> {
        &self.completed
    }

    #[must_use]
    pub fn prepared(&self) -> &[PreparedCategory] {
        &self.prepared
    }

    #[must_use]
    pub fn record_id(&self) -> Option<&RecordId> {
        self.record_id.as_ref()
    }

    #[must_use]
    pub fn prepared_for(&self, category_id: &CategoryId) -> Option<&PreparedCategory> {
        self.prepared.iter().find(|p| &p.category_id == category_id)
    }

    #[must_use]
    pub fn is_completed(&self, category_id: &CategoryId) -> bool {
        self.completed.contains(category_id)
    }

    /// Display name for a category, from its prepared entry or the recorded
    /// name lookup.
    #[must_use]
    pub fn display_name(&self, category_id: &CategoryId) -> Option<&str> {
        self.prepared_for(category_id)
            .map(|p| p.category_name.as_str())
            .or_else(|| self.known_names.get(category_id).map(String::as_str))
    }

    /// True while at least one ordered category is prepared and not completed.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.categories
            .iter()
            .any(|id| !self.completed.contains(id) && self.prepared_for(id).is_some())
    }

    /// True once every ordered category has been completed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.categories.iter().all(|id| self.completed.contains(id))
    }

    /// Move a category out of the prepared list and into the completed set,
    /// keeping its display name for later rendering.
    pub fn mark_completed(&mut self, category_id: &CategoryId) {
        if let Some(pos) = self
            .prepared
            .iter()
            .position(|p| &p.category_id == category_id)
        {
            let entry = self.prepared.remove(pos);
            self.known_names
                .entry(entry.category_id.clone())
                .or_insert(entry.category_name);
        }
        self.completed.insert(category_id.clone());
    }

    /// A copy of this checkpoint with one prepared entry dropped because its
    /// package turned out to be unavailable. The category stays in the
    /// ordered list (it is not completed), and its name is remembered so it
    /// can still be rendered.
    #[must_use]
    pub fn pruned(&self, category_id: &CategoryId) -> Self {
        let mut next = self.clone();
        if let Some(pos) = next
            .prepared
            .iter()
            .position(|p| &p.category_id == category_id)
        {
            let entry = next.prepared.remove(pos);
            next.known_names
                .entry(entry.category_id.clone())
                .or_insert(entry.category_name);
        }
        next
    }
}
