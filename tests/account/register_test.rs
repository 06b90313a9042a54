use axum::http::StatusCode;
use crm_accounts::modules::account::model::Purpose;
use crm_accounts::modules::account::AccountError;
use serde_json::json;

use crate::common::{test_email, test_password, TestContext};

#[tokio::test]
async fn register_with_issued_code_creates_account() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let code = ctx.issue_code(&email, Purpose::Register).await;

    let response = ctx
        .server
        .post("/user/register")
        .json(&json!({
            "email": &email,
            "password": test_password(),
            "code": code
        }))
        .await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["email"], email);
    assert_eq!(body["data"]["verified"], true);
    assert!(body["data"]["id"].as_i64().unwrap() > 0);
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn register_with_invalid_email_returns_bad_request() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/user/register")
        .json(&json!({
            "email": "bad",
            "password": "x",
            "code": "1"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 1002);
}

#[tokio::test]
async fn register_with_missing_fields_returns_invalid_param() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/user/register")
        .json(&json!({ "email": test_email() }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 1001);
}

#[tokio::test]
async fn register_with_wrong_code_is_rejected() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let code = ctx.issue_code(&email, Purpose::Register).await;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let result = ctx.accounts.register(&email, test_password(), wrong).await;
    assert!(matches!(result, Err(AccountError::CodeInvalid(_))));

    // the real code is still redeemable
    ctx.accounts
        .register(&email, test_password(), &code)
        .await
        .unwrap();
}

#[tokio::test]
async fn register_without_any_issued_code_is_rejected() {
    let ctx = TestContext::new().await;

    let result = ctx
        .accounts
        .register(&test_email(), test_password(), "123456")
        .await;
    assert!(matches!(result, Err(AccountError::CodeInvalid(_))));
}

#[tokio::test]
async fn register_code_cannot_be_reused() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let code = ctx.issue_code(&email, Purpose::Register).await;

    ctx.accounts
        .register(&email, test_password(), &code)
        .await
        .unwrap();

    let second = ctx.accounts.register(&email, test_password(), &code).await;
    assert_eq!(second.unwrap_err(), AccountError::EmailTaken);
}

#[tokio::test]
async fn register_duplicate_email_returns_conflict() {
    let ctx = TestContext::new().await;
    let email = test_email();
    ctx.register(&email, test_password()).await;

    let code = ctx.issue_code(&email, Purpose::Register).await;
    let response = ctx
        .server
        .post("/user/register")
        .json(&json!({
            "email": email.to_uppercase(),
            "password": test_password(),
            "code": code
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);

    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 1003);
}

#[tokio::test]
async fn register_with_code_for_other_purpose_is_rejected() {
    let ctx = TestContext::new().await;
    let email = test_email();
    let code = ctx.issue_code(&email, Purpose::ForgotPassword).await;

    let result = ctx.accounts.register(&email, test_password(), &code).await;
    assert!(matches!(result, Err(AccountError::CodeInvalid(_))));
}
