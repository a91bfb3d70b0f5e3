//! Cart edits and checkout for anonymous visitors.

#![allow(clippy::unwrap_used)]

use luna_moth_integration_tests::{TestApp, cart_lines};

#[tokio::test]
async fn test_same_product_and_size_bumps_quantity() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let first = app.add_to_cart(&browser, "2", None).await;
    assert_eq!(first.status(), 200);
    assert_eq!(first.headers()["hx-trigger"], "cart-updated");
    app.add_to_cart(&browser, "2", None).await;

    let cart = app.cart_json(&browser).await;
    assert_eq!(
        cart_lines(&cart),
        vec![("2".to_string(), "Standard".to_string(), 2)]
    );
    assert_eq!(cart["itemCount"], 2);
}

#[tokio::test]
async fn test_different_size_is_a_new_line() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    app.add_to_cart(&browser, "7", Some("Small")).await;
    app.add_to_cart(&browser, "7", Some("Large")).await;

    let cart = app.cart_json(&browser).await;
    assert_eq!(
        cart_lines(&cart),
        vec![
            ("7".to_string(), "Small".to_string(), 1),
            ("7".to_string(), "Large".to_string(), 1),
        ]
    );
    assert_eq!(cart["lines"][1]["cartId"], "7-Large");
}

#[tokio::test]
async fn test_count_badge_tracks_items() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    app.add_to_cart(&browser, "2", None).await;
    let badge = app.add_to_cart(&browser, "3", None).await.text().await.unwrap();
    assert!(badge.contains(">2<"));

    let count = app.get_html(&browser, "/cart/count").await;
    assert!(count.contains(">2<"));
}

#[tokio::test]
async fn test_zero_quantity_removes_line() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    app.add_to_cart(&browser, "2", None).await;
    app.add_to_cart(&browser, "3", None).await;
    let fragment = app
        .set_quantity(&browser, "2", "Standard", 0)
        .await
        .text()
        .await
        .unwrap();
    assert!(fragment.contains("cart-items"));
    assert!(!fragment.contains("Rose Quartz"));

    let cart = app.cart_json(&browser).await;
    assert_eq!(
        cart_lines(&cart),
        vec![("3".to_string(), "Standard".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_negative_quantity_removes_line() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    app.add_to_cart(&browser, "2", None).await;
    app.set_quantity(&browser, "2", "Standard", -3).await;

    let cart = app.cart_json(&browser).await;
    assert!(cart_lines(&cart).is_empty());
}

#[tokio::test]
async fn test_cart_page_shows_subtotal() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    app.add_to_cart(&browser, "2", None).await;
    app.add_to_cart(&browser, "2", None).await;
    app.add_to_cart(&browser, "7", Some("Large")).await;

    let body = app.get_html(&browser, "/cart").await;
    assert!(body.contains("Your Cart"));
    assert!(body.contains("Subtotal"));
    // 2 x $25.00 + $35.00
    assert!(body.contains("$85.00"));
    assert!(body.contains("Proceed to Checkout"));
}

#[tokio::test]
async fn test_empty_cart_page() {
    let app = TestApp::spawn().await;
    let body = app.get_html(&app.browser(), "/cart").await;
    assert!(body.contains("Your cart is empty."));
    assert!(body.contains("Find something special to add!"));
}

#[tokio::test]
async fn test_unknown_size_is_rejected() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let response = app.add_to_cart(&browser, "7", Some("Enormous")).await;
    assert_eq!(response.status(), 400);
    let missing = app.add_to_cart(&browser, "999", None).await;
    assert_eq!(missing.status(), 404);

    assert!(cart_lines(&app.cart_json(&browser).await).is_empty());
}

#[tokio::test]
async fn test_plain_form_post_redirects_to_cart() {
    let app = TestApp::spawn().await;
    let browser = app.browser_without_redirects();

    let response = browser
        .post(app.url("/cart/add"))
        .form(&[("product_id", "2")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(response.headers()["location"], "/cart");
}

#[tokio::test]
async fn test_checkout_is_a_placeholder() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    app.add_to_cart(&browser, "2", None).await;
    let home = browser
        .post(app.url("/checkout"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(home.contains("Checkout is not yet implemented."));

    // The notice is shown once.
    let again = app.get_html(&browser, "/").await;
    assert!(!again.contains("Checkout is not yet implemented."));

    assert_eq!(cart_lines(&app.cart_json(&browser).await).len(), 1);
}
