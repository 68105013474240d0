use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{ApiResponse, LoginRequest, LoginResponse, Profile, RegisterRequest},
        extractors::AuthUser,
    },
    error::AuthError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user", post(register))
        .route("/user/login", post(login))
        .route("/user/logout", put(logout))
        .route("/user/get-user-details", get(get_user_details))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<()>>), AuthError> {
    let Json(payload) = payload?;
    payload.validate()?;
    state
        .auth
        .register(&payload.display_name, &payload.email, &payload.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            message: "User created successfully",
            data: None,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, AuthError> {
    let Json(payload) = payload?;
    let res = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(ApiResponse {
        message: "Login successful",
        data: Some(res),
    }))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ApiResponse<()>>, AuthError> {
    state.auth.logout(user_id).await?;
    info!(user_id = %user_id, "session closed");
    Ok(Json(ApiResponse {
        message: "Logout successful",
        data: None,
    }))
}

#[instrument(skip(state))]
pub async fn get_user_details(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ApiResponse<Profile>>, AuthError> {
    let profile = state.auth.get_profile(user_id).await?;
    Ok(Json(ApiResponse {
        message: "User details fetched successfully",
        data: Some(profile),
    }))
}
