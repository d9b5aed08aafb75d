use axum::extract::{Query, State};
use axum::http::HeaderMap;
use serde::Deserialize;

use super::extract::{bearer_token, CurrentUser};
use super::response::{created, ok, ApiResult, Body};
use super::AppState;
use crate::types::{AuthResponse, LoginRequest, RefreshTokenRequest, RegisterRequest, UserSummary};

pub(crate) async fn register(
    State(state): State<AppState>,
    Body(req): Body<RegisterRequest>,
) -> ApiResult<AuthResponse> {
    let response = state.auth.register(req)?;
    created("Registration successful", response)
}

pub(crate) async fn login(
    State(state): State<AppState>,
    Body(req): Body<LoginRequest>,
) -> ApiResult<AuthResponse> {
    ok("Login successful", state.auth.login(&req)?)
}

pub(crate) async fn refresh_token(
    State(state): State<AppState>,
    Body(req): Body<RefreshTokenRequest>,
) -> ApiResult<AuthResponse> {
    ok("Token refreshed successfully", state.auth.refresh(&req.refresh_token)?)
}

pub(crate) async fn logout(State(state): State<AppState>, user: CurrentUser) -> ApiResult<()> {
    state.auth.logout(user.id())?;
    ok("Logout successful", ())
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyQuery {
    token: String,
}

pub(crate) async fn verify_email(
    State(state): State<AppState>,
    Query(q): Query<VerifyQuery>,
) -> ApiResult<()> {
    state.auth.verify_email(&q.token)?;
    ok("Email verified successfully", ())
}

pub(crate) async fn me(State(state): State<AppState>, user: CurrentUser) -> ApiResult<UserSummary> {
    ok("User retrieved successfully", state.auth.current_user(user.id())?)
}

/// Never fails: a missing or bad token reports `false`.
pub(crate) async fn validate(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<bool> {
    let valid = bearer_token(&headers).is_some_and(|t| state.auth.validate_token(t));
    ok("Token validation result", valid)
}
