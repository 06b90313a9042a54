use axum::http::StatusCode;
use crm_accounts::modules::account::model::Purpose;
use crm_accounts::modules::account::AccountError;
use serde_json::json;

use crate::common::{test_email, test_password, TestContext};

#[tokio::test]
async fn update_mail_with_both_codes_moves_the_account() {
    let ctx = TestContext::new().await;
    let old_email = test_email();
    let new_email = test_email();
    let profile = ctx.register(&old_email, test_password()).await;

    let old_code = ctx.issue_code(&old_email, Purpose::EmailChangeOld).await;
    let new_code = ctx.issue_code(&new_email, Purpose::EmailChangeNew).await;

    let response = ctx
        .server
        .post("/user/update-mail")
        .json(&json!({
            "email": &old_email,
            "new_email": &new_email,
            "code": old_code,
            "new_code": new_code
        }))
        .await;

    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"]["id"], profile.id);
    assert_eq!(body["data"]["email"], new_email);

    ctx.accounts.login(&new_email, test_password()).await.unwrap();
    assert_eq!(
        ctx.accounts.login(&old_email, test_password()).await.unwrap_err(),
        AccountError::UserNotFound
    );
}

#[tokio::test]
async fn update_mail_with_one_valid_code_changes_nothing() {
    let ctx = TestContext::new().await;
    let old_email = test_email();
    let new_email = test_email();
    ctx.register(&old_email, test_password()).await;

    let old_code = ctx.issue_code(&old_email, Purpose::EmailChangeOld).await;
    let new_code = ctx.issue_code(&new_email, Purpose::EmailChangeNew).await;
    let wrong = if new_code == "000000" { "000001" } else { "000000" };

    let result = ctx
        .accounts
        .update_mail(&old_email, &new_email, &old_code, wrong)
        .await;
    assert!(matches!(result, Err(AccountError::CodeInvalid(_))));

    // email unchanged and the valid old code was not burned
    ctx.accounts.login(&old_email, test_password()).await.unwrap();
    let profile = ctx
        .accounts
        .update_mail(&old_email, &new_email, &old_code, &new_code)
        .await
        .unwrap();
    assert_eq!(profile.email, new_email);
}

#[tokio::test]
async fn update_mail_codes_are_not_interchangeable() {
    let ctx = TestContext::new().await;
    let old_email = test_email();
    let new_email = test_email();
    ctx.register(&old_email, test_password()).await;

    let old_code = ctx.issue_code(&old_email, Purpose::EmailChangeOld).await;
    let new_code = ctx.issue_code(&new_email, Purpose::EmailChangeNew).await;

    let result = ctx
        .accounts
        .update_mail(&old_email, &new_email, &new_code, &old_code)
        .await;
    assert!(matches!(result, Err(AccountError::CodeInvalid(_))));
}

#[tokio::test]
async fn update_mail_to_taken_address_conflicts() {
    let ctx = TestContext::new().await;
    let old_email = test_email();
    let taken = test_email();
    ctx.register(&old_email, test_password()).await;
    ctx.register(&taken, test_password()).await;

    let old_code = ctx.issue_code(&old_email, Purpose::EmailChangeOld).await;
    let new_code = ctx.issue_code(&taken, Purpose::EmailChangeNew).await;

    let response = ctx
        .server
        .post("/user/update-mail")
        .json(&json!({
            "email": &old_email,
            "new_email": &taken,
            "code": old_code,
            "new_code": new_code
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 1003);
}

#[tokio::test]
async fn update_mail_to_same_address_is_invalid_param() {
    let ctx = TestContext::new().await;
    let email = test_email();

    let result = ctx
        .accounts
        .update_mail(&email, &email.to_uppercase(), "123456", "654321")
        .await;
    assert!(matches!(result, Err(AccountError::InvalidParam(_))));
}

#[tokio::test]
async fn update_mail_validates_new_address_format() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/user/update-mail")
        .json(&json!({
            "email": test_email(),
            "new_email": "not-an-email",
            "code": "123456",
            "new_code": "654321"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 1002);
}

#[tokio::test]
async fn update_mail_for_unknown_account() {
    let ctx = TestContext::new().await;
    let old_email = test_email();
    let new_email = test_email();

    let old_code = ctx.issue_code(&old_email, Purpose::EmailChangeOld).await;
    let new_code = ctx.issue_code(&new_email, Purpose::EmailChangeNew).await;

    let result = ctx
        .accounts
        .update_mail(&old_email, &new_email, &old_code, &new_code)
        .await;
    assert_eq!(result.unwrap_err(), AccountError::UserNotFound);
}
