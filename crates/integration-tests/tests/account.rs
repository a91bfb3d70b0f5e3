//! Registration, login and the account page.

#![allow(clippy::unwrap_used)]

use luna_moth_integration_tests::{PASSWORD, TestApp};

const EMAIL: &str = "opal@example.com";

#[tokio::test]
async fn test_register_validates_fields() {
    let app = TestApp::spawn().await;
    let browser = app.browser();

    let empty = app.register(&browser, EMAIL, "", "").await;
    assert!(empty.contains("Please fill in all fields."));

    let mismatch = app.register(&browser, EMAIL, PASSWORD, "moonstone43").await;
    assert!(mismatch.contains("Passwords do not match."));

    let weak = app.register(&browser, EMAIL, "abc", "abc").await;
    assert!(weak.contains("Please use at least 6 characters."));
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let app = TestApp::spawn().await;
    let first = app.browser();
    app.sign_up(&first, EMAIL).await;

    let second = app.browser();
    let page = app.sign_up(&second, EMAIL).await;
    assert!(page.contains("An account with this email already exists."));
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    app.sign_up(&browser, EMAIL).await;
    app.sign_out(&browser).await;

    let page = app.sign_in(&browser, EMAIL, "not-the-password").await;
    assert!(page.contains("Invalid email or password."));

    let unknown = app.sign_in(&browser, "nobody@example.com", PASSWORD).await;
    assert!(unknown.contains("Invalid email or password."));
}

#[tokio::test]
async fn test_account_requires_sign_in() {
    let app = TestApp::spawn().await;
    let body = app.get_html(&app.browser(), "/account").await;
    assert!(body.contains("Access Denied"));
    assert!(body.contains("Please log in to view your account details."));
}

#[tokio::test]
async fn test_new_account_shows_sample_orders() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    app.sign_up(&browser, EMAIL).await;

    let body = app.get_html(&browser, "/account").await;
    assert!(body.contains("My Account"));
    assert!(body.contains("Personal Information"));
    assert!(body.contains("Not provided"));
    assert!(body.contains("Order History"));
    assert!(body.contains("LMG-84321"));
    assert!(body.contains("LMG-84119"));

    let uid = app.uid(EMAIL).await;
    let stored = app.documents.stored_profile(&uid).await.unwrap();
    assert_eq!(stored.email.as_str(), EMAIL);
}

#[tokio::test]
async fn test_profile_update_is_saved_and_shown() {
    let app = TestApp::spawn().await;
    let browser = app.browser();
    app.sign_up(&browser, EMAIL).await;

    let edit = app.get_html(&browser, "/account?edit=true").await;
    assert!(edit.contains("Save Changes"));

    let page = browser
        .post(app.url("/account/profile"))
        .form(&[("first_name", " Opal "), ("last_name", "Moon")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Your information has been updated."));
    assert!(page.contains("Hi, Opal"));
    assert!(page.contains("Moon"));

    let uid = app.uid(EMAIL).await;
    let stored = app.documents.stored_profile(&uid).await.unwrap();
    assert_eq!(stored.first_name.as_deref(), Some("Opal"));
    assert_eq!(stored.last_name.as_deref(), Some("Moon"));
}

#[tokio::test]
async fn test_profile_update_requires_sign_in() {
    let app = TestApp::spawn().await;
    let response = app
        .browser_without_redirects()
        .post(app.url("/account/profile"))
        .form(&[("first_name", "Opal"), ("last_name", "Moon")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(response.headers()["location"], "/auth/login");
}

#[tokio::test]
async fn test_signed_in_user_skips_login_page() {
    let app = TestApp::spawn().await;
    let browser = app.browser_without_redirects();
    browser
        .post(app.url("/auth/register"))
        .form(&[
            ("email", EMAIL),
            ("password", PASSWORD),
            ("password_confirm", PASSWORD),
        ])
        .send()
        .await
        .unwrap();

    let response = browser.get(app.url("/auth/login")).send().await.unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(response.headers()["location"], "/account");
}
