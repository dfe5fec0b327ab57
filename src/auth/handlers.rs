use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest, RegisterResponse},
        extractors::AuthUser,
    },
    error::reject,
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), (StatusCode, String)> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.username.is_empty() {
        warn!("empty username");
        return Err((StatusCode::BAD_REQUEST, "Username is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }
    if payload.password.is_empty() {
        warn!("empty password");
        return Err((StatusCode::BAD_REQUEST, "Password is required".into()));
    }

    let id = state
        .backend
        .register_user(
            &payload.username,
            &payload.email,
            &payload.password,
            payload.full_name.as_deref(),
        )
        .await
        .map_err(reject)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id,
            message: "Registration successful! You can now login.".into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let user = state
        .backend
        .authenticate(payload.username.trim(), &payload.password)
        .await
        .map_err(reject)?;

    let access_token = state.jwt.sign(user.id).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    })?;

    info!(user_id = %user.id, "token issued");
    Ok(Json(AuthResponse { access_token, user }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = state.backend.get_user(user_id).await.map_err(reject)?;
    Ok(Json(PublicUser::from(user)))
}
