//! Catalog pages and the JSON API.

#![allow(clippy::unwrap_used)]

use luna_moth_integration_tests::TestApp;

#[tokio::test]
async fn test_health() {
    let app = TestApp::spawn().await;
    let body = app.get_html(&app.browser(), "/health").await;
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_home_shows_oracle_and_featured_products() {
    let app = TestApp::spawn().await;
    let body = app.get_html(&app.browser(), "/").await;

    assert!(body.contains("Find Your Perfect Stone"));
    assert!(body.contains("Consult the Oracle"));
    assert!(body.contains("Featured Products"));
    assert!(body.contains("View Full Collection"));
    assert!(body.contains("product-card"));
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = TestApp::spawn().await;
    let response = app.browser().get(app.url("/")).send().await.unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["cache-control"], "no-store");
    let policy = headers["content-security-policy"].to_str().unwrap();
    assert!(policy.contains("https://unpkg.com"));
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_inventory_filters_by_category() {
    let app = TestApp::spawn().await;
    let body = app
        .get_html(&app.browser(), "/inventory?category=Palm%20Stones")
        .await;

    assert!(body.contains("Filter by Category"));
    assert!(body.contains("Labradorite Palm Stone"));
    assert!(!body.contains("Rose Quartz"));
}

#[tokio::test]
async fn test_inventory_search_without_matches() {
    let app = TestApp::spawn().await;
    let body = app
        .get_html(&app.browser(), "/inventory?q=unobtainium")
        .await;

    assert!(body.contains("No Products Found"));
    assert!(body.contains("Try adjusting your search or filters."));
}

#[tokio::test]
async fn test_inventory_search_matches_description() {
    let app = TestApp::spawn().await;
    let body = app.get_html(&app.browser(), "/inventory?q=MASTER%20healer").await;

    assert!(body.contains("Clear Quartz Point"));
    assert!(!body.contains("No Products Found"));
}

#[tokio::test]
async fn test_product_page_lists_sizes() {
    let app = TestApp::spawn().await;
    let body = app.get_html(&app.browser(), "/products/7?size=Large").await;

    assert!(body.contains("Labradorite Palm Stone"));
    assert!(body.contains("Small"));
    assert!(body.contains("Medium"));
    assert!(body.contains("$35.00"));
    assert!(body.contains("Add to Cart"));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let app = TestApp::spawn().await;
    let response = app
        .browser()
        .get(app.url("/products/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_products_api_returns_catalog() {
    let app = TestApp::spawn().await;
    let products: serde_json::Value = app
        .browser()
        .get(app.url("/api/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let products = products.as_array().unwrap();
    assert_eq!(products.len(), app.state.catalog().all().len());
    assert_eq!(products[0]["id"], "1");
    assert!(products[0]["imageUrls"].as_array().is_some());
}
