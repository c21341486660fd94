use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use validator::Validate;

use crate::dto::generation_dto::{AssignAllRequest, AssignAllResponse, AssignRequest};
use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::models::generation::GenerationOptions;
use crate::AppState;

#[axum::debug_handler]
pub async fn generate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(options): Json<GenerationOptions>,
) -> Result<Response> {
    let generated = state
        .generation_service
        .generate(&options, &claims.sub)
        .await?;
    Ok((StatusCode::CREATED, Json(generated)).into_response())
}

#[axum::debug_handler]
pub async fn generate_personalized(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(options): Json<GenerationOptions>,
) -> Result<Response> {
    let tests = state
        .generation_service
        .generate_personalized(&options, &claims.sub)
        .await?;
    Ok((StatusCode::CREATED, Json(tests)).into_response())
}

#[axum::debug_handler]
pub async fn generate_and_assign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(options): Json<GenerationOptions>,
) -> Result<Response> {
    let generated = state
        .generation_service
        .generate_and_assign(&options, &claims.sub)
        .await?;
    Ok((StatusCode::CREATED, Json(generated)).into_response())
}

#[axum::debug_handler]
pub async fn assign(
    State(state): State<AppState>,
    Json(payload): Json<AssignRequest>,
) -> Result<Response> {
    let assignment = state
        .generation_service
        .assign_test(
            payload.test_id,
            payload.user_id,
            payload.start_at_utc,
            payload.end_at_utc,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)).into_response())
}

#[axum::debug_handler]
pub async fn assign_all(
    State(state): State<AppState>,
    Json(payload): Json<AssignAllRequest>,
) -> Result<Response> {
    payload.validate()?;
    let assignments = state
        .generation_service
        .assign_all(&payload.pairs(), payload.start_at_utc, payload.end_at_utc)
        .await?;
    Ok(Json(AssignAllResponse {
        created: assignments.len(),
        assignments,
    })
    .into_response())
}
