use axum::{
    extract::{Extension, Path, State},
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;

use crate::dto::session_dto::{SessionSummary, SessionView, SubmitRequest, SubmitResponse};
use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::services::session_service::Viewer;
use crate::AppState;

#[axum::debug_handler]
pub async fn start_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<Uuid>,
) -> Result<Json<SessionView>> {
    let user_id = claims.user_id()?;
    tracing::info!("User {} starting test {}", user_id, test_id);
    let session = state.session_service.start(test_id, user_id).await?;
    Ok(Json(SessionView::from(&session)))
}

#[axum::debug_handler]
pub async fn touch(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let status = state
        .session_service
        .touch(session_id, claims.user_id()?)
        .await?;
    Ok(Json(status).into_response())
}

#[axum::debug_handler]
pub async fn pause(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let status = state
        .session_service
        .pause(session_id, claims.user_id()?)
        .await?;
    Ok(Json(status).into_response())
}

#[axum::debug_handler]
pub async fn resume(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let status = state
        .session_service
        .resume(session_id, claims.user_id()?)
        .await?;
    Ok(Json(status).into_response())
}

#[axum::debug_handler]
pub async fn timer_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let status = state
        .session_service
        .timer_status(session_id, claims.user_id()?)
        .await?;
    Ok(Json(status).into_response())
}

#[axum::debug_handler]
pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>> {
    let answers = payload.into_answers();
    let session = state
        .session_service
        .submit(session_id, claims.user_id()?, &answers)
        .await?;
    Ok(Json(SubmitResponse::from(&session)))
}

/// Owners get the candidate view; staff get the full session with keys.
#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    if claims.is_staff() {
        let session = state
            .session_service
            .get_session(session_id, Viewer::Staff)
            .await?;
        return Ok(Json(session).into_response());
    }

    let session = state
        .session_service
        .get_session(session_id, Viewer::Owner(claims.user_id()?))
        .await?;
    Ok(Json(SessionView::from(&session)).into_response())
}

#[axum::debug_handler]
pub async fn my_sessions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<SessionSummary>>> {
    let sessions = state
        .session_service
        .list_for_user(claims.user_id()?)
        .await?;
    Ok(Json(sessions.iter().map(SessionSummary::from).collect()))
}
