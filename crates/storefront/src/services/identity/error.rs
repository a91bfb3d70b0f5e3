//! Identity provider error types.

use thiserror::Error;

/// Errors that can occur during sign-up, sign-in or sign-out.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No identity provider is configured for this deployment.
    #[error("identity provider is not configured")]
    NotConfigured,

    /// The provider rejected the project configuration or API key.
    #[error("identity provider configuration rejected: {0}")]
    Configuration(String),

    /// An account already exists for the email.
    #[error("email already in use")]
    EmailExists,

    /// The email address is malformed.
    #[error("invalid email")]
    InvalidEmail,

    /// The password is shorter than the provider allows.
    #[error("weak password")]
    WeakPassword,

    /// Unknown email, wrong password or otherwise invalid credential.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account has been disabled.
    #[error("user disabled")]
    UserDisabled,

    /// Email/password sign-in is turned off for the project.
    #[error("email/password sign-in is not enabled")]
    OperationNotAllowed,

    /// The refresh token was revoked or has expired; the user must sign in again.
    #[error("session expired")]
    SessionExpired,

    /// The provider is throttling this client.
    #[error("too many attempts")]
    TooManyAttempts,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Any other provider error code.
    #[error("provider error: {0}")]
    Provider(String),
}

impl IdentityError {
    /// Message safe to show on the login and register pages.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConfigured | Self::Configuration(_) => {
                "Sign-in is not available right now. Please contact support.".to_string()
            }
            Self::EmailExists => "An account with this email already exists.".to_string(),
            Self::InvalidEmail => "The email address is not valid.".to_string(),
            Self::WeakPassword => {
                "The password is too weak. Please use at least 6 characters.".to_string()
            }
            Self::InvalidCredentials => "Invalid email or password.".to_string(),
            Self::UserDisabled => "This user account has been disabled.".to_string(),
            Self::OperationNotAllowed => "Email/password accounts are not enabled.".to_string(),
            Self::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            Self::TooManyAttempts => {
                "Too many attempts. Please wait a moment and try again.".to_string()
            }
            Self::Http(_) => {
                "An unexpected error occurred: the sign-in service could not be reached."
                    .to_string()
            }
            Self::Provider(detail) => format!("An unexpected error occurred: {detail}"),
        }
    }

    /// Map an Identity Toolkit error message such as
    /// `WEAK_PASSWORD : Password should be at least 6 characters`.
    #[must_use]
    pub fn from_provider_code(message: &str) -> Self {
        let code = message.split(" : ").next().unwrap_or(message).trim();
        match code {
            "EMAIL_EXISTS" => Self::EmailExists,
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "WEAK_PASSWORD" => Self::WeakPassword,
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS"
            | "MISSING_PASSWORD" => Self::InvalidCredentials,
            "USER_DISABLED" => Self::UserDisabled,
            "OPERATION_NOT_ALLOWED" | "PASSWORD_LOGIN_DISABLED" => Self::OperationNotAllowed,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" | "MISSING_REFRESH_TOKEN" => {
                Self::SessionExpired
            }
            "CONFIGURATION_NOT_FOUND" | "API_KEY_INVALID" | "INVALID_API_KEY" => {
                Self::Configuration(code.to_string())
            }
            _ if message.starts_with("API key not valid") => Self::Configuration(code.to_string()),
            _ => Self::Provider(message.to_string()),
        }
    }

    /// Whether this error points at a deployment problem rather than user input.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured | Self::Configuration(_) | Self::Http(_) | Self::Provider(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_codes_map_to_variants() {
        assert!(matches!(
            IdentityError::from_provider_code("EMAIL_EXISTS"),
            IdentityError::EmailExists
        ));
        assert!(matches!(
            IdentityError::from_provider_code(
                "WEAK_PASSWORD : Password should be at least 6 characters"
            ),
            IdentityError::WeakPassword
        ));
        assert!(matches!(
            IdentityError::from_provider_code("INVALID_LOGIN_CREDENTIALS"),
            IdentityError::InvalidCredentials
        ));
        assert!(matches!(
            IdentityError::from_provider_code("API key not valid. Please pass a valid API key."),
            IdentityError::Configuration(_)
        ));
        assert!(matches!(
            IdentityError::from_provider_code("TOKEN_EXPIRED"),
            IdentityError::SessionExpired
        ));
        assert!(matches!(
            IdentityError::from_provider_code("SOMETHING_NEW"),
            IdentityError::Provider(_)
        ));
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            IdentityError::EmailExists.user_message(),
            "An account with this email already exists."
        );
        assert_eq!(
            IdentityError::InvalidCredentials.user_message(),
            "Invalid email or password."
        );
        assert_eq!(
            IdentityError::Configuration("CONFIGURATION_NOT_FOUND".to_string()).user_message(),
            "Sign-in is not available right now. Please contact support."
        );
        assert_eq!(
            IdentityError::Provider("QUOTA_EXCEEDED".to_string()).user_message(),
            "An unexpected error occurred: QUOTA_EXCEEDED"
        );
    }
}
