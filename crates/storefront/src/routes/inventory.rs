//! Inventory page: the whole catalog with category, search and sort.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use tower_sessions::Session;
use tracing::instrument;

use crate::catalog::{ALL_CATEGORIES, InventoryQuery, SortOption};
use crate::error::Result;
use crate::filters;
use crate::routes::layout::{ProductCardView, Shell};
use crate::state::AppState;

/// Sort picker entry.
#[derive(Clone)]
pub struct SortChoice {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Category filter entry.
#[derive(Clone)]
pub struct CategoryChoice {
    pub name: String,
    pub url: String,
    pub selected: bool,
}

/// Inventory page template.
#[derive(Template, WebTemplate)]
#[template(path = "inventory.html")]
pub struct InventoryTemplate {
    pub shell: Shell,
    pub categories: Vec<CategoryChoice>,
    pub category: String,
    pub search: String,
    pub sorts: Vec<SortChoice>,
    pub products: Vec<ProductCardView>,
    pub total: usize,
    /// Link that shows the next batch, when more remain.
    pub load_more_url: Option<String>,
}

/// Inventory URL for the given filters. Defaults are left out.
fn inventory_url(category: &str, search: Option<&str>, sort: SortOption, visible: Option<usize>) -> String {
    let mut params = Vec::new();
    if category != ALL_CATEGORIES {
        params.push(format!("category={}", urlencoding::encode(category)));
    }
    if let Some(q) = search {
        params.push(format!("q={}", urlencoding::encode(q)));
    }
    if sort != SortOption::Default {
        params.push(format!("sort={}", sort.as_str()));
    }
    if let Some(visible) = visible {
        params.push(format!("visible={visible}"));
    }

    if params.is_empty() {
        "/inventory".to_string()
    } else {
        format!("/inventory?{}", params.join("&"))
    }
}

/// Display the inventory page.
#[instrument(skip(state, session))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<InventoryQuery>,
) -> Result<InventoryTemplate> {
    let catalog = state.catalog();
    let results = catalog.browse(&query);
    let active = query.category();
    let search = query.search();

    let categories = catalog
        .categories()
        .into_iter()
        .map(|name| CategoryChoice {
            url: inventory_url(name, search, query.sort, None),
            selected: name == active,
            name: name.to_string(),
        })
        .collect();

    let sorts = SortOption::ALL
        .iter()
        .map(|&sort| SortChoice {
            value: sort.as_str(),
            label: sort.label(),
            selected: sort == query.sort,
        })
        .collect();

    Ok(InventoryTemplate {
        shell: Shell::load(&session).await?,
        categories,
        category: active.to_string(),
        search: search.unwrap_or_default().to_string(),
        sorts,
        products: results.products.into_iter().map(ProductCardView::from).collect(),
        total: results.total,
        load_more_url: results
            .next_visible
            .map(|next| inventory_url(active, search, query.sort, Some(next))),
    })
}
