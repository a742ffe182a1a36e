use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::forms::{LoginForm, SignupForm};
use crate::models::Identity;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/login", post(login))
        .route("/auth/signup", post(signup))
        .route("/auth/logout", post(logout))
}

// GET /api/auth/me
async fn me(State(state): State<Arc<AppState>>) -> AppResult<Json<Identity>> {
    state
        .session
        .current()
        .map(Json)
        .ok_or_else(|| AppError::Unauthorized("Not logged in".to_string()))
}

// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    Json(form): Json<LoginForm>,
) -> AppResult<Json<Identity>> {
    form.check()?;
    let identity = state.session.login(form.username.trim(), &form.password).await?;
    Ok(Json(identity))
}

// POST /api/auth/signup
async fn signup(
    State(state): State<Arc<AppState>>,
    Json(form): Json<SignupForm>,
) -> AppResult<Json<Identity>> {
    let data = form.into_signup_data()?;
    let identity = state.session.signup(&data).await?;
    info!("Signed up {} as {}", identity.username, identity.role);
    Ok(Json(identity))
}

// POST /api/auth/logout
async fn logout(State(state): State<Arc<AppState>>) -> AppResult<Json<serde_json::Value>> {
    state.session.logout().await?;
    Ok(Json(json!({ "success": true })))
}
