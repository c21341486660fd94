use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

use crate::dto::session_dto::{GradeRequest, SessionSummary, SubmitResponse};
use crate::error::Result;
use crate::AppState;

#[axum::debug_handler]
pub async fn list_pending(State(state): State<AppState>) -> Result<Json<Vec<SessionSummary>>> {
    let sessions = state.session_service.list_pending_grading().await?;
    Ok(Json(sessions.iter().map(SessionSummary::from).collect()))
}

#[axum::debug_handler]
pub async fn grade(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<GradeRequest>,
) -> Result<Json<SubmitResponse>> {
    let session = state
        .session_service
        .grade_essays(session_id, &payload.scores)
        .await?;
    Ok(Json(SubmitResponse::from(&session)))
}
