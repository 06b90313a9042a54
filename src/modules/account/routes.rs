use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::AppState;
use super::controller;

pub fn account_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(controller::register))
        .route("/verify-code", get(controller::get_verify_code))
        .route("/login", post(controller::login))
        .route("/logout", post(controller::logout))
        .route("/forgot-password", post(controller::forgot_password))
        .route("/update-mail", post(controller::update_mail))
        .route("/delete", post(controller::delete))
        .route("/info", get(controller::get_info))
        .route("/buy", post(controller::buy))
}
