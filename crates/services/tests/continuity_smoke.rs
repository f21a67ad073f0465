use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use exam_core::model::{
    Attempt, AttemptId, CategoryId, CheckpointState, PackageId, PreparedCategory, SessionToken,
};
use exam_core::time::{fixed_clock, fixed_now};
use services::api::{SessionApi, SessionCheck, StartAttemptReply, StartAttemptRequest};
use services::error::ApiError;
use services::{
    AttemptStarter, Enter, OverviewFlow, ResolveOptions, SessionResolver, StartOutcome,
};
use storage::repository::{AttemptCacheRepository, CheckpointSnapshotRepository, InMemoryRepository};

/// Backend stub: one scripted check reply, then scripted start replies.
struct ScriptedBackend {
    check: SessionCheck,
    starts: Mutex<VecDeque<Result<StartAttemptReply, ApiError>>>,
}

#[async_trait]
impl SessionApi for ScriptedBackend {
    async fn check_active_session(&self) -> Result<SessionCheck, ApiError> {
        Ok(self.check.clone())
    }

    async fn start_attempt(
        &self,
        request: &StartAttemptRequest,
    ) -> Result<StartAttemptReply, ApiError> {
        let _ = request;
        self.starts
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted start reply left")
    }
}

fn prepared(id: &str, name: &str) -> PreparedCategory {
    PreparedCategory {
        category_id: CategoryId::new(id),
        category_name: name.to_string(),
        package_id: PackageId::new(format!("pkg-{id}")),
        turn: 1,
        question_count: 20,
        duration_minutes: 30,
    }
}

fn two_category_run() -> CheckpointState {
    CheckpointState::new(
        vec![CategoryId::new("listening"), CategoryId::new("reading")],
        vec![prepared("listening", "Listening"), prepared("reading", "Reading")],
        None,
    )
    .unwrap()
}

#[tokio::test]
async fn reload_resume_start_and_advance() {
    let repo = InMemoryRepository::new();
    let now = fixed_now();

    // Leftovers from an attempt the server has since auto-submitted.
    repo.save_session_token(&AttemptId::new("att-old"), &SessionToken::new("stale"), now)
        .await
        .unwrap();
    repo.set_last_attempt(&AttemptId::new("att-old")).await.unwrap();

    // A checkpoint snapshotted before the page reload being simulated here.
    let checkpoint = two_category_run();
    CheckpointSnapshotRepository::save(&repo, &checkpoint)
        .await
        .unwrap();

    let backend = Arc::new(ScriptedBackend {
        check: SessionCheck {
            active_session: None,
            auto_submitted: vec![AttemptId::new("att-old")],
        },
        starts: Mutex::new(VecDeque::from([Ok(StartAttemptReply::Started(
            Attempt::started(
                AttemptId::new("att-new"),
                CategoryId::new("listening"),
                PackageId::new("pkg-listening"),
                1,
                SessionToken::new("fresh"),
            ),
        ))])),
    });

    // Gate first: the resolver check runs before any sequencing.
    let resolver = SessionResolver::new(backend.clone(), Arc::new(repo.clone()));
    let resolution = resolver.resolve(ResolveOptions::default()).await;
    assert!(!resolution.has_active_session);

    // The auto-submitted attempt's local state is gone.
    assert!(repo.get(&AttemptId::new("att-old")).await.unwrap().is_none());
    assert_eq!(repo.last_attempt().await.unwrap(), None);

    // Reload path: no navigation context, restore from the snapshot slot.
    let entered = OverviewFlow::enter(&resolution, None, &repo).await;
    let Enter::Overview(mut flow) = entered else {
        panic!("expected Overview");
    };
    assert_eq!(flow.checkpoint(), &checkpoint);

    let starter = AttemptStarter::new(
        backend,
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    )
    .with_clock(fixed_clock());

    let outcome = flow.start_next(&starter).await.unwrap();
    let StartOutcome::Started { attempt, checkpoint: handoff } = outcome else {
        panic!("expected Started");
    };
    assert_eq!(attempt.category_id(), &CategoryId::new("listening"));

    // The fresh token is cached and the snapshot slot is discarded.
    let cached = repo.get(&AttemptId::new("att-new")).await.unwrap().unwrap();
    assert_eq!(cached.session_token, SessionToken::new("fresh"));
    assert_eq!(repo.load().await.unwrap(), None);

    // Once this attempt finalizes, the handed-off checkpoint resolves the
    // next category without another server round-trip.
    let mut next_run = handoff;
    next_run.mark_completed(&CategoryId::new("listening"));
    let next = services::sessions::pick_next(&next_run).unwrap();
    assert_eq!(next.category_id, CategoryId::new("reading"));
}

#[tokio::test]
async fn resume_elsewhere_wins_over_a_fresh_start() {
    let repo = InMemoryRepository::new();
    CheckpointSnapshotRepository::save(&repo, &two_category_run())
        .await
        .unwrap();

    let backend = Arc::new(ScriptedBackend {
        check: SessionCheck {
            active_session: Some(services::ActiveSession {
                attempt_id: AttemptId::new("att-live"),
                is_expired: false,
            }),
            auto_submitted: Vec::new(),
        },
        starts: Mutex::new(VecDeque::new()),
    });

    let resolver = SessionResolver::new(backend.clone(), Arc::new(repo.clone()));
    let resolution = resolver.resolve(ResolveOptions::default()).await;
    assert_eq!(
        resolution.redirect,
        Some(services::Navigation::TestRoute(AttemptId::new("att-live")))
    );

    // Even with restorable checkpoint state, entry resolves to the live attempt.
    let entered = OverviewFlow::enter(&resolution, None, &repo).await;
    assert!(matches!(
        entered,
        Enter::Redirect(services::Navigation::TestRoute(id)) if id == AttemptId::new("att-live")
    ));
}
