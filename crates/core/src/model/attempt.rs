use serde::{Deserialize, Serialize};

use crate::model::{AttemptId, CategoryId, PackageId, SessionToken};

/// One server-tracked, timed engagement with a single category's package.
///
/// The server is the sole authority over an attempt's existence and expiry.
/// The client holds only advisory copies: once the server finalizes an
/// attempt (normal submission or auto-submit on expiry), its id is stale and
/// must never be resumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    id: AttemptId,
    category_id: CategoryId,
    package_id: PackageId,
    turn: u32,
    session_token: SessionToken,
    is_expired: bool,
    is_active: bool,
}

impl Attempt {
    /// Rehydrate an attempt from a server payload.
    ///
    /// The expiry and activity flags come from the server verbatim; the
    /// client never computes them.
    #[must_use]
    pub fn from_server(
        id: AttemptId,
        category_id: CategoryId,
        package_id: PackageId,
        turn: u32,
        session_token: SessionToken,
        is_expired: bool,
        is_active: bool,
    ) -> Self {
        Self {
            id,
            category_id,
            package_id,
            turn,
            session_token,
            is_expired,
            is_active,
        }
    }

    /// Shape of an attempt freshly created by a start call: active, not expired.
    #[must_use]
    pub fn started(
        id: AttemptId,
        category_id: CategoryId,
        package_id: PackageId,
        turn: u32,
        session_token: SessionToken,
    ) -> Self {
        Self::from_server(id, category_id, package_id, turn, session_token, false, true)
    }

    #[must_use]
    pub fn id(&self) -> &AttemptId {
        &self.id
    }

    #[must_use]
    pub fn category_id(&self) -> &CategoryId {
        &self.category_id
    }

    #[must_use]
    pub fn package_id(&self) -> &PackageId {
        &self.package_id
    }

    /// Turn number for retakes of the same category.
    #[must_use]
    pub fn turn(&self) -> u32 {
        self.turn
    }

    #[must_use]
    pub fn session_token(&self) -> &SessionToken {
        &self.session_token
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// An attempt may be resumed only while the server reports it active and
    /// not yet expired.
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        self.is_active && !self.is_expired
    }
}
