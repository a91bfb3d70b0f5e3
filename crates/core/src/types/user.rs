//! User profile document.

use serde::{Deserialize, Serialize};

use super::{Email, Order, UserId};

/// Account role. Admins bypass the daily visual search quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

/// The per-user profile document.
///
/// Owned by the document store; the storefront mirrors it into the session
/// for as long as the user stays signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: UserId,
    pub email: Email,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<Order>>,
    #[serde(default)]
    pub role: Role,
}

impl UserProfile {
    /// A fresh profile for a first-time sign-in.
    #[must_use]
    pub fn new(uid: UserId, email: Email) -> Self {
        Self {
            uid,
            email,
            first_name: Some(String::new()),
            last_name: Some(String::new()),
            orders: Some(Vec::new()),
            role: Role::Customer,
        }
    }

    /// "First Last", or `None` when both are blank.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Whether this user is exempt from usage quotas.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(first) = &update.first_name {
            self.first_name = Some(first.clone());
        }
        if let Some(last) = &update.last_name {
            self.last_name = Some(last.clone());
        }
    }
}

/// A partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl ProfileUpdate {
    /// True when the update would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile::new(UserId::new("u1"), Email::parse("jade@example.com").unwrap())
    }

    #[test]
    fn test_new_profile_has_blank_names_and_no_orders() {
        let p = profile();
        assert_eq!(p.display_name(), None);
        assert_eq!(p.orders.as_deref(), Some(&[][..]));
        assert!(!p.is_admin());
    }

    #[test]
    fn test_apply_partial_update() {
        let mut p = profile();
        p.apply(&ProfileUpdate {
            first_name: Some("Jade".to_string()),
            last_name: None,
        });
        assert_eq!(p.display_name().as_deref(), Some("Jade"));
        assert_eq!(p.last_name.as_deref(), Some(""));
    }

    #[test]
    fn test_role_defaults_to_customer_when_missing() {
        let json = r#"{"uid":"u1","email":"jade@example.com"}"#;
        let p: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(p.role, Role::Customer);
        assert!(p.orders.is_none());
    }
}
