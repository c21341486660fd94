pub mod autotests;
pub mod grading;
pub mod health;
pub mod sessions;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::middleware::auth::{require_bearer_auth, require_staff};
use crate::middleware::rate_limit::{rps_middleware, RateLimiter};
use crate::AppState;

pub fn router(state: AppState, rps: u32) -> Router {
    let staff_api = Router::new()
        .route("/api/autotests/generate", post(autotests::generate))
        .route(
            "/api/autotests/personalized",
            post(autotests::generate_personalized),
        )
        .route(
            "/api/autotests/generate-assign",
            post(autotests::generate_and_assign),
        )
        .route("/api/autotests/assign", post(autotests::assign))
        .route("/api/autotests/assign-all", post(autotests::assign_all))
        .route("/api/grading/pending", get(grading::list_pending))
        .route("/api/grading/:id", post(grading::grade))
        .route_layer(from_fn_with_state(state.clone(), require_staff));

    let session_api = Router::new()
        .route("/api/tests/:id/start", post(sessions::start_test))
        .route("/api/tests/sessions/mine", get(sessions::my_sessions))
        .route("/api/tests/sessions/:id", get(sessions::get_session))
        .route("/api/tests/sessions/:id/touch", post(sessions::touch))
        .route("/api/tests/sessions/:id/pause", post(sessions::pause))
        .route("/api/tests/sessions/:id/resume", post(sessions::resume))
        .route("/api/tests/sessions/:id/submit", post(sessions::submit))
        .route("/api/tests/sessions/:id/status", get(sessions::timer_status))
        .route_layer(from_fn_with_state(state.clone(), require_bearer_auth));

    Router::new()
        .route("/health", get(health::health))
        .merge(staff_api)
        .merge(session_api)
        .layer(from_fn_with_state(RateLimiter::new(rps), rps_middleware))
        .with_state(state)
}
