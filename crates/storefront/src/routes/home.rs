//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::routes::layout::{ProductCardView, Shell};
use crate::state::AppState;

/// Home page template: hero with the oracle form, then featured products.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub shell: Shell,
    pub featured: Vec<ProductCardView>,
}

/// Display the home page.
#[instrument(skip(state, session))]
pub async fn home(State(state): State<AppState>, session: Session) -> Result<HomeTemplate> {
    let featured = state
        .catalog()
        .featured()
        .into_iter()
        .map(ProductCardView::from)
        .collect();

    Ok(HomeTemplate {
        shell: Shell::load(&session).await?,
        featured,
    })
}
