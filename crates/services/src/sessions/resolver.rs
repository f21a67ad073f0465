use std::sync::Arc;

use exam_core::model::AttemptId;
use storage::repository::AttemptCacheRepository;

use crate::api::SessionApi;

/// Where the caller must navigate next.
///
/// Test-route navigation replaces history so the back button cannot return
/// the student to a stale overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    TestRoute(AttemptId),
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Skip the backend check entirely when false.
    pub check_on_mount: bool,
    /// Emit a test-route navigation when a live session is found.
    pub auto_redirect: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            check_on_mount: true,
            auto_redirect: true,
        }
    }
}

/// What the resolver concluded about the user's session state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionResolution {
    pub has_active_session: bool,
    pub active_attempt_id: Option<AttemptId>,
    pub redirect: Option<Navigation>,
}

impl SessionResolution {
    /// The "nothing special" result: no active session, no redirect.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

/// Gate run on every student-facing entry point before any sequencing.
///
/// Asks the backend whether an active test session exists and reconciles the
/// local attempt cache against what the server did on its own (auto-submitted
/// attempts whose window elapsed).
#[derive(Clone)]
pub struct SessionResolver {
    api: Arc<dyn SessionApi>,
    cache: Arc<dyn AttemptCacheRepository>,
}

impl SessionResolver {
    #[must_use]
    pub fn new(api: Arc<dyn SessionApi>, cache: Arc<dyn AttemptCacheRepository>) -> Self {
        Self { api, cache }
    }

    /// Run one active-session check.
    ///
    /// Fail-open policy: any transport or decode failure downgrades to "no
    /// active session" instead of blocking the page. The backend stays the
    /// authority that would reject a genuinely invalid resume, so the worst
    /// case is the user re-entering a flow they would have entered anyway.
    ///
    /// The result is never cached; every call issues a fresh check.
    pub async fn resolve(&self, options: ResolveOptions) -> SessionResolution {
        if !options.check_on_mount {
            return SessionResolution::none();
        }

        let check = match self.api.check_active_session().await {
            Ok(check) => check,
            Err(error) => {
                tracing::debug!(%error, "active-session check failed, assuming none");
                return SessionResolution::none();
            }
        };

        self.purge_auto_submitted(&check.auto_submitted).await;

        let Some(active) = check.active_session else {
            return SessionResolution::none();
        };
        if active.is_expired {
            return SessionResolution::none();
        }

        let redirect = options
            .auto_redirect
            .then(|| Navigation::TestRoute(active.attempt_id.clone()));
        SessionResolution {
            has_active_session: true,
            active_attempt_id: Some(active.attempt_id),
            redirect,
        }
    }

    /// Drop local state for every attempt the server finalized on its own.
    ///
    /// Best-effort: a failure on one id never stops the rest and never
    /// surfaces to the caller.
    async fn purge_auto_submitted(&self, finalized: &[AttemptId]) {
        for attempt_id in finalized {
            if let Err(error) = self.cache.clear_local(attempt_id).await {
                tracing::warn!(%attempt_id, %error, "failed to clear cached attempt");
            }
            if let Err(error) = self.cache.clear_last_attempt_if(attempt_id).await {
                tracing::warn!(%attempt_id, %error, "failed to clear last-attempt pointer");
            }
        }
    }
}
