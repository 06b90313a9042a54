use axum::http::StatusCode;
use crm_accounts::modules::account::model::Purpose;
use crm_accounts::modules::account::AccountError;
use serde_json::json;

use crate::common::{test_email, test_password, TestContext};

const NEW_PASSWORD: &str = "BrandNewPassword456!";

#[tokio::test]
async fn forgot_password_replaces_credential() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.register(&email, test_password()).await;
    let code = ctx.issue_code(&email, Purpose::ForgotPassword).await;

    let response = ctx
        .server
        .post("/user/forgot-password")
        .json(&json!({
            "email": &email,
            "password": NEW_PASSWORD,
            "code": code
        }))
        .await;

    response.assert_status(StatusCode::OK);

    assert_eq!(
        ctx.accounts.login(&email, test_password()).await.unwrap_err(),
        AccountError::CredentialMismatch
    );
    ctx.accounts.login(&email, NEW_PASSWORD).await.unwrap();
}

#[tokio::test]
async fn forgot_password_with_wrong_code_keeps_old_password() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.register(&email, test_password()).await;
    let code = ctx.issue_code(&email, Purpose::ForgotPassword).await;
    let wrong = if code == "999999" { "888888" } else { "999999" };

    let response = ctx
        .server
        .post("/user/forgot-password")
        .json(&json!({
            "email": &email,
            "password": NEW_PASSWORD,
            "code": wrong
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 1006);

    ctx.accounts.login(&email, test_password()).await.unwrap();
}

#[tokio::test]
async fn forgot_password_rejects_registration_code() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.register(&email, test_password()).await;
    let code = ctx.issue_code(&email, Purpose::Register).await;

    let result = ctx.accounts.forgot_pass(&email, NEW_PASSWORD, &code).await;
    assert!(matches!(result, Err(AccountError::CodeInvalid(_))));
}

#[tokio::test]
async fn forgot_password_for_unknown_account() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let code = ctx.issue_code(&email, Purpose::ForgotPassword).await;

    let result = ctx.accounts.forgot_pass(&email, NEW_PASSWORD, &code).await;
    assert_eq!(result, Err(AccountError::UserNotFound));
}

#[tokio::test]
async fn forgot_password_code_is_single_use() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.register(&email, test_password()).await;
    let code = ctx.issue_code(&email, Purpose::ForgotPassword).await;

    ctx.accounts.forgot_pass(&email, NEW_PASSWORD, &code).await.unwrap();

    let replay = ctx.accounts.forgot_pass(&email, "Another789!", &code).await;
    assert!(matches!(replay, Err(AccountError::CodeInvalid(_))));
    ctx.accounts.login(&email, NEW_PASSWORD).await.unwrap();
}

#[tokio::test]
async fn existing_sessions_survive_password_reset() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.register(&email, test_password()).await;
    let token = ctx.login(&email, test_password()).await;
    let code = ctx.issue_code(&email, Purpose::ForgotPassword).await;

    ctx.accounts.forgot_pass(&email, NEW_PASSWORD, &code).await.unwrap();

    assert!(ctx.accounts.authenticate(&token).await.is_ok());
}
