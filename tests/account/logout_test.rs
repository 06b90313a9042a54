use axum::http::StatusCode;

use crate::common::TestContext;

#[tokio::test]
async fn logout_invalidates_the_session() {
    let ctx = TestContext::new().await;
    let (_, token) = ctx.signed_in_user().await;

    ctx.server
        .post("/user/logout")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::OK);

    let response = ctx
        .server
        .get("/user/info")
        .authorization_bearer(&token)
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 1007);
}

#[tokio::test]
async fn logout_twice_reports_session_not_found() {
    let ctx = TestContext::new().await;
    let (_, token) = ctx.signed_in_user().await;

    ctx.server
        .post("/user/logout")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::OK);

    let response = ctx
        .server
        .post("/user/logout")
        .authorization_bearer(&token)
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 1007);
}

#[tokio::test]
async fn logout_with_unknown_token_reports_session_not_found() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post("/user/logout")
        .authorization_bearer("not-a-real-token")
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_without_token_is_invalid_param() {
    let ctx = TestContext::new().await;

    let response = ctx.server.post("/user/logout").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 1001);
}
