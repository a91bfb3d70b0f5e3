//! Daily quota for image identification.
//!
//! Non-admin users get a fixed number of identifications per UTC day. Each
//! successful identification is logged in the document store, so the count
//! survives restarts and is shared across sessions.

use chrono::{DateTime, Utc};

use crate::models::CurrentUser;
use crate::services::documents::{DocumentError, DocumentStore};

/// What a user may still do today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quota {
    /// Admins are not counted.
    Unlimited,
    /// Identifications left today; never negative.
    Remaining(u32),
}

impl Quota {
    #[must_use]
    pub const fn allows_search(self) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Remaining(n) => n > 0,
        }
    }

    /// Whether searches are counted against a limit.
    #[must_use]
    pub const fn is_metered(self) -> bool {
        matches!(self, Self::Remaining(_))
    }

    /// Remaining searches, `None` when unlimited.
    #[must_use]
    pub const fn remaining(self) -> Option<u32> {
        match self {
            Self::Unlimited => None,
            Self::Remaining(n) => Some(n),
        }
    }
}

/// Midnight UTC of the day containing `now`.
#[must_use]
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |midnight| midnight.and_utc())
}

/// The user's quota as of `now`.
///
/// # Errors
///
/// Returns an error if the search log cannot be read.
pub async fn quota(
    documents: &dyn DocumentStore,
    user: &CurrentUser,
    daily_limit: u32,
    now: DateTime<Utc>,
) -> Result<Quota, DocumentError> {
    if user.is_admin() {
        return Ok(Quota::Unlimited);
    }
    let used = documents
        .count_visual_searches_since(&user.identity, start_of_day(now))
        .await?;
    Ok(Quota::Remaining(daily_limit.saturating_sub(used)))
}

/// Log a successful identification. Admin searches are not logged.
///
/// # Errors
///
/// Returns an error if the log entry cannot be written.
pub async fn record(
    documents: &dyn DocumentStore,
    user: &CurrentUser,
    now: DateTime<Utc>,
) -> Result<(), DocumentError> {
    if user.is_admin() {
        return Ok(());
    }
    documents.log_visual_search(&user.identity, now).await
}
