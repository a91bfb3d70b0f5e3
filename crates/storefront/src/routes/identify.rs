//! Stone identifier: upload a photo, get the crystal and a link to it.
//!
//! Only signed-in users may identify stones, and non-admins are limited to
//! a daily number of successful identifications.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Multipart, State};
use chrono::Utc;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::CurrentUser;
use crate::routes::layout::Shell;
use crate::routes::oracle::SuggestionView;
use crate::services::oracle::{ImageInput, OracleError};
use crate::services::visual_search::{self, Quota};
use crate::state::AppState;

/// Multipart field carrying the photo.
const IMAGE_FIELD: &str = "image";

const QUOTA_UNAVAILABLE: &str =
    "We couldn't check your remaining searches right now. Please try again later.";
const QUOTA_EXHAUSTED: &str =
    "You have no searches remaining today. Please check back tomorrow for more.";
const NO_IMAGE: &str = "Please choose an image to upload.";

/// Quota banner data.
#[derive(Clone, Copy)]
pub struct QuotaView {
    pub unlimited: bool,
    pub remaining: u32,
}

impl QuotaView {
    #[must_use]
    pub const fn exhausted(&self) -> bool {
        !self.unlimited && self.remaining == 0
    }
}

impl From<Quota> for QuotaView {
    fn from(quota: Quota) -> Self {
        Self {
            unlimited: !quota.is_metered(),
            remaining: quota.remaining().unwrap_or_default(),
        }
    }
}

/// Stone identifier page template.
#[derive(Template, WebTemplate)]
#[template(path = "identify.html")]
pub struct IdentifyTemplate {
    pub shell: Shell,
    pub signed_in: bool,
    /// `None` when signed out or when the quota could not be read.
    pub quota: Option<QuotaView>,
    pub result: Option<SuggestionView>,
    pub error: Option<String>,
}

impl IdentifyTemplate {
    /// Whether the upload form is usable.
    #[must_use]
    pub fn can_search(&self) -> bool {
        self.quota.is_some_and(|q| !q.exhausted())
    }
}

async fn current_quota(state: &AppState, user: &CurrentUser) -> Option<Quota> {
    match visual_search::quota(
        state.documents(),
        user,
        state.config().visual_search_daily_limit,
        Utc::now(),
    )
    .await
    {
        Ok(quota) => Some(quota),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read visual search quota");
            None
        }
    }
}

/// Display the stone identifier.
#[instrument(skip(state, session, user))]
pub async fn page(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<IdentifyTemplate> {
    let (quota, error) = match &user {
        Some(user) => match current_quota(&state, user).await {
            Some(quota) => (Some(quota), None),
            None => (None, Some(QUOTA_UNAVAILABLE.to_string())),
        },
        None => (None, None),
    };

    Ok(IdentifyTemplate {
        shell: Shell::load(&session).await?,
        signed_in: user.is_some(),
        quota: quota.map(QuotaView::from),
        result: None,
        error,
    })
}

/// Read the uploaded photo from the form.
async fn read_image(multipart: &mut Multipart) -> std::result::Result<ImageInput, String> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
            OracleError::ImageTooLarge.to_string()
        } else {
            e.body_text()
        }
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let mime_type = field.content_type().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| {
            if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
                OracleError::ImageTooLarge.to_string()
            } else {
                e.body_text()
            }
        })?;
        if data.is_empty() {
            return Err(NO_IMAGE.to_string());
        }
        return ImageInput::new(&mime_type, data.to_vec()).map_err(|e| e.to_string());
    }
    Err(NO_IMAGE.to_string())
}

/// Identify the uploaded stone.
///
/// The quota is checked before the model is called; only a successful
/// identification is counted.
#[instrument(skip_all, fields(uid = %user.identity.uid))]
pub async fn identify(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    mut multipart: Multipart,
) -> Result<IdentifyTemplate> {
    let mut page = IdentifyTemplate {
        shell: Shell::load(&session).await?,
        signed_in: true,
        quota: None,
        result: None,
        error: None,
    };

    let Some(quota) = current_quota(&state, &user).await else {
        page.error = Some(QUOTA_UNAVAILABLE.to_string());
        return Ok(page);
    };
    page.quota = Some(QuotaView::from(quota));
    if !quota.allows_search() {
        page.error = Some(QUOTA_EXHAUSTED.to_string());
        return Ok(page);
    }

    let image = match read_image(&mut multipart).await {
        Ok(image) => image,
        Err(message) => {
            page.error = Some(message);
            return Ok(page);
        }
    };

    match state.oracle().identify(&image, state.catalog().all()).await {
        Ok(found) => {
            let found = found.resolve(state.catalog());
            tracing::info!(crystal = %found.crystal_name, "stone identified");
            if let Err(e) = visual_search::record(state.documents(), &user, Utc::now()).await {
                tracing::warn!(error = %e, "failed to log visual search");
            }
            if let Quota::Remaining(n) = quota {
                page.quota = Some(QuotaView::from(Quota::Remaining(n.saturating_sub(1))));
            }
            page.result = Some(SuggestionView::from(&found));
        }
        Err(e) => {
            if e.is_server_error() {
                let event_id = sentry::capture_error(&e);
                tracing::error!(error = %e, sentry_event_id = %event_id, "identification failed");
            }
            page.error = Some(e.to_string());
        }
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_view() {
        let admin = QuotaView::from(Quota::Unlimited);
        assert!(admin.unlimited);
        assert!(!admin.exhausted());

        let spent = QuotaView::from(Quota::Remaining(0));
        assert!(!spent.unlimited);
        assert!(spent.exhausted());

        assert_eq!(QuotaView::from(Quota::Remaining(3)).remaining, 3);
    }
}
