//! Session-related types.
//!
//! Everything the storefront remembers about a browser lives in its session:
//! the signed-in user, the cart and a one-shot notice for the next page.

use serde::{Deserialize, Serialize};

use luna_moth_core::UserProfile;

use crate::services::identity::Identity;

/// Session-stored signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Identity from the provider, including the document store token.
    pub identity: Identity,
    /// Profile as loaded at sign-in and updated by profile edits.
    pub profile: UserProfile,
}

impl CurrentUser {
    /// Name for greetings: the first name, else the email's local part.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        self.profile
            .first_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.identity.email.local_part())
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.profile.is_admin()
    }
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

impl NoticeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// A toast shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// The signed-in [`CurrentUser`](super::CurrentUser).
    pub const CURRENT_USER: &str = "current_user";

    /// The session [`Cart`](luna_moth_core::Cart).
    pub const CART: &str = "cart";

    /// A pending [`Notice`](super::Notice).
    pub const NOTICE: &str = "notice";
}
