use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{CreatePredictionRequest, CreatePredictionResponse};
use crate::{auth::extractors::AuthUser, error::reject, state::AppState, store::Prediction};

pub fn routes() -> Router<AppState> {
    Router::new().route("/predictions", get(list_predictions).post(create_prediction))
}

#[instrument(skip(state))]
pub async fn list_predictions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Prediction>>, (StatusCode, String)> {
    let rows = state
        .backend
        .list_predictions(user_id)
        .await
        .map_err(reject)?;
    Ok(Json(rows))
}

#[instrument(skip(state, body))]
pub async fn create_prediction(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreatePredictionRequest>,
) -> Result<(StatusCode, Json<CreatePredictionResponse>), (StatusCode, String)> {
    let id = state
        .backend
        .save_prediction(user_id, body.features, body.prediction)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(CreatePredictionResponse { id })))
}
