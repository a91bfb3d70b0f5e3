//! Sign-in, sign-out and the debounced remote cart writes.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use luna_moth_integration_tests::{PASSWORD, TestApp, cart_lines};

const EMAIL: &str = "selene@example.com";

#[tokio::test]
async fn test_rapid_edits_collapse_into_one_write() {
    let app = TestApp::spawn_with(|config| {
        config.cart_sync_debounce = Duration::from_millis(300);
    })
    .await;
    let browser = app.browser();
    app.sign_up(&browser, EMAIL).await;
    let uid = app.uid(EMAIL).await;

    app.add_to_cart(&browser, "2", None).await;
    app.add_to_cart(&browser, "2", None).await;
    app.set_quantity(&browser, "2", "Standard", 3).await;
    assert_eq!(app.documents.cart_writes(&uid).await, 0);

    app.settle().await;
    assert_eq!(app.documents.cart_writes(&uid).await, 1);
    let stored = app.documents.stored_cart(&uid).await.unwrap();
    assert_eq!(stored.item_count(), 3);
}

#[tokio::test]
async fn test_signed_out_edits_are_never_written() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    app.add_to_cart(&browser, "2", None).await;
    app.settle().await;

    // Signing up replaces the anonymous cart with the (empty) remote one.
    app.sign_up(&browser, EMAIL).await;
    let uid = app.uid(EMAIL).await;
    app.settle().await;

    assert_eq!(app.documents.cart_writes(&uid).await, 0);
    assert!(cart_lines(&app.cart_json(&browser).await).is_empty());
}

#[tokio::test]
async fn test_sign_out_clears_cart_without_write_back() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    app.sign_up(&browser, EMAIL).await;
    let uid = app.uid(EMAIL).await;

    app.add_to_cart(&browser, "7", Some("Medium")).await;
    app.settle().await;
    assert_eq!(app.documents.cart_writes(&uid).await, 1);

    let home = app.sign_out(&browser).await;
    assert!(home.contains("You have been signed out."));
    assert!(cart_lines(&app.cart_json(&browser).await).is_empty());

    app.settle().await;
    assert_eq!(app.documents.cart_writes(&uid).await, 1);
    let stored = app.documents.stored_cart(&uid).await.unwrap();
    assert_eq!(stored.item_count(), 1);
    assert_eq!(app.identity.active_sessions().await, 0);
}

#[tokio::test]
async fn test_sign_out_drops_pending_write() {
    let app = TestApp::spawn_with(|config| {
        config.cart_sync_debounce = Duration::from_millis(300);
    })
    .await;
    let browser = app.browser();
    app.sign_up(&browser, EMAIL).await;
    let uid = app.uid(EMAIL).await;

    app.add_to_cart(&browser, "2", None).await;
    app.sign_out(&browser).await;
    app.settle().await;

    assert_eq!(app.documents.cart_writes(&uid).await, 0);
}

#[tokio::test]
async fn test_sign_in_replaces_local_cart_with_remote() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    app.sign_up(&browser, EMAIL).await;
    app.add_to_cart(&browser, "7", Some("Large")).await;
    app.add_to_cart(&browser, "7", Some("Large")).await;
    app.settle().await;
    app.sign_out(&browser).await;

    // Added while signed out; dropped by the sign-in below.
    app.add_to_cart(&browser, "3", None).await;

    let home = app.sign_in(&browser, EMAIL, PASSWORD).await;
    assert!(home.contains("Welcome, selene!"));
    assert_eq!(
        cart_lines(&app.cart_json(&browser).await),
        vec![("7".to_string(), "Large".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_cart_follows_user_to_another_browser() {
    let app = TestApp::spawn().await;
    let laptop = app.browser();
    app.sign_up(&laptop, EMAIL).await;
    app.add_to_cart(&laptop, "5", None).await;
    app.settle().await;

    let phone = app.browser();
    app.sign_in(&phone, EMAIL, PASSWORD).await;
    assert_eq!(
        cart_lines(&app.cart_json(&phone).await),
        vec![("5".to_string(), "Standard".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_signing_out_one_browser_keeps_the_other_syncing() {
    let app = TestApp::spawn().await;
    let laptop = app.browser();
    let phone = app.browser();
    app.sign_up(&laptop, EMAIL).await;
    app.sign_in(&phone, EMAIL, PASSWORD).await;
    let uid = app.uid(EMAIL).await;

    app.sign_out(&laptop).await;
    app.add_to_cart(&phone, "4", None).await;
    app.settle().await;

    assert_eq!(app.documents.cart_writes(&uid).await, 1);
    let stored = app.documents.stored_cart(&uid).await.unwrap();
    assert_eq!(stored.item_count(), 1);
    assert_eq!(app.identity.active_sessions().await, 1);
}

#[tokio::test]
async fn test_edits_keep_syncing_after_token_expires() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    app.sign_up(&browser, EMAIL).await;
    let uid = app.uid(EMAIL).await;

    app.identity.expire_id_tokens().await;
    app.add_to_cart(&browser, "2", None).await;
    app.settle().await;

    assert_eq!(app.documents.cart_writes(&uid).await, 1);
    let account = app.get_html(&browser, "/account").await;
    assert!(account.contains(EMAIL));
}

#[tokio::test]
async fn test_rejected_write_does_not_stop_later_edits() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    app.sign_up(&browser, EMAIL).await;
    let uid = app.uid(EMAIL).await;

    app.documents.set_rejecting_tokens(true);
    app.add_to_cart(&browser, "2", None).await;
    app.settle().await;
    assert_eq!(app.documents.cart_writes(&uid).await, 0);

    app.documents.set_rejecting_tokens(false);
    app.add_to_cart(&browser, "3", None).await;
    app.settle().await;

    assert_eq!(app.documents.cart_writes(&uid).await, 1);
    let stored = app.documents.stored_cart(&uid).await.unwrap();
    assert_eq!(stored.item_count(), 2);
}

#[tokio::test]
async fn test_failed_account_load_fails_open() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    app.add_to_cart(&browser, "2", None).await;

    app.documents.set_unavailable(true);
    let page = app.sign_up(&browser, EMAIL).await;
    assert!(page.contains("load your account right now"));

    // Signed out, with an empty cart, and the site still works.
    assert!(cart_lines(&app.cart_json(&browser).await).is_empty());
    let account = app.get_html(&browser, "/account").await;
    assert!(account.contains("Access Denied"));

    // Edits are not written for a user whose load failed.
    app.add_to_cart(&browser, "2", None).await;
    app.settle().await;
    let uid = app.uid(EMAIL).await;
    assert_eq!(app.documents.cart_writes(&uid).await, 0);
}
