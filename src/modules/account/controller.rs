use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::AppState;
use crate::modules::account::{
    interface::AccountError,
    model::{LoginOutcome, Purpose, SubscriptionInfo, UserId, UserProfile},
    schema::{
        ApiResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest, UpdateMailRequest,
        VerifyCodeQuery,
    },
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AccountError>;

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let body = ApiResponse::error(self.code(), self.to_string());
        (self.status_code(), Json(body)).into_response()
    }
}

/// Unwraps a decoded body and enforces required fields. Email format is
/// checked by the service on the populated value.
fn decoded<T: Validate>(body: Result<T, String>) -> Result<T, AccountError> {
    let body = body.map_err(AccountError::InvalidParam)?;
    body.validate()
        .map_err(|e| AccountError::invalid_param(e.to_string()))?;
    Ok(body)
}

fn json_body<T: Validate>(body: Result<Json<T>, JsonRejection>) -> Result<T, AccountError> {
    decoded(body.map(|Json(inner)| inner).map_err(|e| e.body_text()))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// uid-scoped routes trust only a validated session, never a client-supplied id.
async fn authenticated_uid(state: &AppState, headers: &HeaderMap) -> Result<UserId, AccountError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AccountError::invalid_param("bearer token is required"))?;
    state.accounts.authenticate(token).await
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<UserProfile> {
    let req = json_body(body)?;
    let profile = state
        .accounts
        .register(&req.email, &req.password, &req.code)
        .await?;
    Ok(Json(ApiResponse::ok(profile)))
}

pub async fn get_verify_code(
    State(state): State<Arc<AppState>>,
    query: Result<Query<VerifyCodeQuery>, QueryRejection>,
) -> ApiResult<()> {
    let query = decoded(query.map(|Query(inner)| inner).map_err(|e| e.body_text()))?;
    let purpose = query.purpose.unwrap_or(Purpose::Register);
    state.accounts.get_verify_code(&query.email, purpose).await?;
    Ok(Json(ApiResponse::empty()))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginOutcome> {
    let req = json_body(body)?;
    let outcome = state.accounts.login(&req.email, &req.password).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<()> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AccountError::invalid_param("bearer token is required"))?;
    state.accounts.logout(token).await?;
    Ok(Json(ApiResponse::empty()))
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> ApiResult<()> {
    let req = json_body(body)?;
    state
        .accounts
        .forgot_pass(&req.email, &req.password, &req.code)
        .await?;
    Ok(Json(ApiResponse::empty()))
}

pub async fn update_mail(
    State(state): State<Arc<AppState>>,
    body: Result<Json<UpdateMailRequest>, JsonRejection>,
) -> ApiResult<UserProfile> {
    let req = json_body(body)?;
    let profile = state
        .accounts
        .update_mail(&req.email, &req.new_email, &req.code, &req.new_code)
        .await?;
    Ok(Json(ApiResponse::ok(profile)))
}

pub async fn delete(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<()> {
    let uid = authenticated_uid(&state, &headers).await?;
    state.accounts.delete(uid).await?;
    Ok(Json(ApiResponse::empty()))
}

pub async fn get_info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<UserProfile> {
    let uid = authenticated_uid(&state, &headers).await?;
    let profile = state.accounts.get_info(uid).await?;
    Ok(Json(ApiResponse::ok(profile)))
}

pub async fn buy(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<SubscriptionInfo> {
    let uid = authenticated_uid(&state, &headers).await?;
    let subscription = state.accounts.buy(uid).await?;
    Ok(Json(ApiResponse::ok(subscription)))
}
