//! Account route handlers.
//!
//! The account page shows the profile and order history of the signed-in
//! user. Signed-out visitors get a prompt to log in rather than a redirect.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use luna_moth_core::{Order, ProfileUpdate};

use crate::error::Result;
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{CurrentUser, Notice};
use crate::routes::layout::Shell;
use crate::services::session::{push_notice, store_user};
use crate::state::AppState;

/// Order line display data.
#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    pub size: String,
    pub quantity: u32,
    pub price: String,
    pub image_url: String,
}

/// Order display data.
#[derive(Clone)]
pub struct OrderView {
    pub id: String,
    pub date: String,
    pub total: String,
    pub item_count: u32,
    pub items: Vec<OrderItemView>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            date: order.date.clone(),
            total: order.total.to_string(),
            item_count: order.unit_count(),
            items: order
                .items
                .iter()
                .map(|item| OrderItemView {
                    name: item.name.clone(),
                    size: item.size.clone(),
                    quantity: item.quantity,
                    price: item.price.to_string(),
                    image_url: item.image_url.clone(),
                })
                .collect(),
        }
    }
}

/// Profile display data.
#[derive(Clone)]
pub struct AccountView {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub orders: Vec<OrderView>,
}

impl From<&CurrentUser> for AccountView {
    fn from(user: &CurrentUser) -> Self {
        let profile = &user.profile;
        Self {
            email: profile.email.to_string(),
            first_name: profile.first_name.clone().unwrap_or_default(),
            last_name: profile.last_name.clone().unwrap_or_default(),
            orders: profile
                .orders
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(OrderView::from)
                .collect(),
        }
    }
}

/// Account page query.
#[derive(Debug, Deserialize)]
pub struct AccountQuery {
    /// Show the profile form instead of the read-only details.
    #[serde(default)]
    pub edit: bool,
}

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl From<ProfileForm> for ProfileUpdate {
    fn from(form: ProfileForm) -> Self {
        Self {
            first_name: Some(form.first_name.trim().to_string()),
            last_name: Some(form.last_name.trim().to_string()),
        }
    }
}

/// Account page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub shell: Shell,
    /// `None` renders the access denied prompt.
    pub account: Option<AccountView>,
    pub editing: bool,
}

/// Display the account page.
#[instrument(skip(session, user))]
pub async fn index(
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<AccountQuery>,
) -> Result<AccountTemplate> {
    Ok(AccountTemplate {
        shell: Shell::load(&session).await?,
        editing: query.edit && user.is_some(),
        account: user.as_ref().map(AccountView::from),
    })
}

/// Save first and last name.
///
/// The document is updated first; the session copy only changes once the
/// write succeeded.
#[instrument(skip(state, session, user, form), fields(uid = %user.identity.uid))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(mut user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Redirect> {
    let update = ProfileUpdate::from(form);

    if let Err(e) = state.documents().update_profile(&user.identity, &update).await {
        let event_id = sentry::capture_error(&e);
        tracing::error!(error = %e, sentry_event_id = %event_id, "profile update failed");
        push_notice(
            &session,
            Notice::error("We couldn't save your changes. Please try again."),
        )
        .await?;
        return Ok(Redirect::to("/account?edit=true"));
    }

    user.profile.apply(&update);
    store_user(&session, &user).await?;
    push_notice(&session, Notice::success("Your information has been updated.")).await?;
    Ok(Redirect::to("/account"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use luna_moth_core::{Email, UserId, UserProfile};

    use super::*;
    use crate::services::account::sample_orders;
    use crate::services::identity::Identity;

    #[test]
    fn test_form_trims_names() {
        let update = ProfileUpdate::from(ProfileForm {
            first_name: "  Opal ".to_string(),
            last_name: String::new(),
        });
        assert_eq!(update.first_name.as_deref(), Some("Opal"));
        assert_eq!(update.last_name.as_deref(), Some(""));
    }

    #[test]
    fn test_account_view_lists_orders() {
        let email = Email::parse("opal@example.com").unwrap();
        let mut profile = UserProfile::new(UserId::new("u1"), email.clone());
        profile.orders = Some(sample_orders());
        let user = CurrentUser {
            identity: Identity {
                uid: UserId::new("u1"),
                email,
                id_token: "t".to_string(),
                refresh_token: "r".to_string(),
                expires_at: chrono::Utc::now() + chrono::TimeDelta::hours(1),
            },
            profile,
        };

        let view = AccountView::from(&user);
        assert_eq!(view.email, "opal@example.com");
        assert_eq!(view.first_name, "");
        assert_eq!(view.orders.len(), 2);
        assert_eq!(view.orders[0].id, "LMG-84321");
    }
}
