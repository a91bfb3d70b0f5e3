//! Authentication route handlers.
//!
//! Handles email/password sign-in, registration and sign-out against the
//! configured identity provider. A successful sign-in goes through
//! [`on_auth_state_changed`], which loads the profile and the saved cart.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use luna_moth_core::Email;

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::models::Notice;
use crate::routes::layout::Shell;
use crate::services::identity::{Identity, IdentityError};
use crate::services::session::{AuthTransition, current_user, on_auth_state_changed, push_notice};
use crate::state::AppState;

const FILL_ALL_FIELDS: &str = "Please fill in all fields.";
const PASSWORDS_DIFFER: &str = "Passwords do not match.";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub shell: Shell,
    pub error: Option<String>,
    /// Email to prefill after a failed attempt.
    pub email: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub shell: Shell,
    pub error: Option<String>,
    pub email: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Parse the email, reporting a malformed address the way the provider would.
fn parse_email(email: &str) -> std::result::Result<Email, IdentityError> {
    Email::parse(email).map_err(|_| IdentityError::InvalidEmail)
}

/// Finish a successful provider call: load the account into the session.
///
/// Returns the page error to show when the account could not be loaded.
async fn complete_sign_in(
    state: &AppState,
    session: &Session,
    identity: Identity,
) -> Result<std::result::Result<(), String>> {
    match on_auth_state_changed(state, session, Some(identity)).await? {
        AuthTransition::SignedIn(user) => {
            add_breadcrumb("auth", "signed in", None);
            push_notice(
                session,
                Notice::success(format!("Welcome, {}!", user.greeting_name())),
            )
            .await?;
            Ok(Ok(()))
        }
        AuthTransition::FailedOpen { message } => Ok(Err(message.to_string())),
        AuthTransition::SignedOut => Ok(Err(IdentityError::NotConfigured.user_message())),
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(session: Session) -> Result<Response> {
    if current_user(&session).await?.is_some() {
        return Ok(Redirect::to("/account").into_response());
    }
    Ok(LoginTemplate {
        shell: Shell::load(&session).await?,
        error: None,
        email: String::new(),
    }
    .into_response())
}

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let email = form.email.trim().to_string();
    let password = form.password.as_str();

    let error = if email.is_empty() || password.is_empty() {
        FILL_ALL_FIELDS.to_string()
    } else {
        let signed_in = match parse_email(&email) {
            Ok(parsed) => state.identity().sign_in(&parsed, password).await,
            Err(e) => Err(e),
        };
        match signed_in {
            Ok(identity) => match complete_sign_in(&state, &session, identity).await? {
                Ok(()) => return Ok(Redirect::to("/").into_response()),
                Err(message) => message,
            },
            Err(e) => {
                tracing::warn!(error = %e, "sign-in failed");
                e.user_message()
            }
        }
    };

    Ok(LoginTemplate {
        shell: Shell::load(&session).await?,
        error: Some(error),
        email,
    }
    .into_response())
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(session: Session) -> Result<Response> {
    if current_user(&session).await?.is_some() {
        return Ok(Redirect::to("/account").into_response());
    }
    Ok(RegisterTemplate {
        shell: Shell::load(&session).await?,
        error: None,
        email: String::new(),
    }
    .into_response())
}

/// Handle registration form submission.
///
/// The provider signs the new account in directly; the empty profile is
/// created by the account load.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let email = form.email.trim().to_string();
    let password = form.password.as_str();
    let confirm = form.password_confirm.as_str();

    let error = if email.is_empty() || password.is_empty() || confirm.is_empty() {
        FILL_ALL_FIELDS.to_string()
    } else if password != confirm {
        PASSWORDS_DIFFER.to_string()
    } else {
        let signed_up = match parse_email(&email) {
            Ok(parsed) => state.identity().sign_up(&parsed, password).await,
            Err(e) => Err(e),
        };
        match signed_up {
            Ok(identity) => {
                tracing::info!(uid = %identity.uid, "account created");
                match complete_sign_in(&state, &session, identity).await? {
                    Ok(()) => return Ok(Redirect::to("/").into_response()),
                    Err(message) => message,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "registration failed");
                e.user_message()
            }
        }
    };

    Ok(RegisterTemplate {
        shell: Shell::load(&session).await?,
        error: Some(error),
        email,
    }
    .into_response())
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
///
/// Clears the user and the cart from the session. The remote cart keeps its
/// last synced state.
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    on_auth_state_changed(&state, &session, None).await?;
    push_notice(&session, Notice::info("You have been signed out.")).await?;
    Ok(Redirect::to("/"))
}
