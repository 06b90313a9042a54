use axum::http::StatusCode;
use crm_accounts::modules::account::AccountError;

use crate::common::TestContext;

#[tokio::test]
async fn get_info_returns_profile_of_session_owner() {
    let ctx = TestContext::new().await;
    let (profile, token) = ctx.signed_in_user().await;

    let response = ctx
        .server
        .get("/user/info")
        .authorization_bearer(&token)
        .await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["id"], profile.id);
    assert_eq!(body["data"]["email"], profile.email);
    assert!(body["data"]["subscription_expires_at"].is_null());
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn get_info_without_token_is_invalid_param() {
    let ctx = TestContext::new().await;

    let response = ctx.server.get("/user/info").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 1001);
}

#[tokio::test]
async fn get_info_for_unknown_uid() {
    let ctx = TestContext::new().await;

    assert_eq!(
        ctx.accounts.get_info(987_654).await.unwrap_err(),
        AccountError::UserNotFound
    );
    assert!(matches!(
        ctx.accounts.get_info(-1).await,
        Err(AccountError::InvalidParam(_))
    ));
}
