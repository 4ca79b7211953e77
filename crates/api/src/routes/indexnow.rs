//! IndexNow queue routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use beacon_common::error::AppError;
use beacon_common::types::{PingAccepted, PingRequest, QueueStatus};

use crate::state::AppState;

/// IndexNow accepts at most this many URLs per submission.
const MAX_URLS_PER_REQUEST: usize = 10_000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/indexnow", post(queue_urls))
        .route("/api/indexnow/status", get(queue_status))
}

/// POST /api/indexnow: Queue URLs for submission.
///
/// Returns as soon as the URLs are queued; delivery happens in the background.
async fn queue_urls(
    State(state): State<AppState>,
    Json(request): Json<PingRequest>,
) -> Result<(StatusCode, Json<PingAccepted>), AppError> {
    if request.urls.is_empty() {
        return Err(AppError::Validation("urls must not be empty".to_string()));
    }
    if request.urls.len() > MAX_URLS_PER_REQUEST {
        return Err(AppError::Validation(format!(
            "at most {} urls per request",
            MAX_URLS_PER_REQUEST
        )));
    }

    if !state.queue.is_enabled() {
        tracing::debug!(count = request.urls.len(), "IndexNow disabled, ignoring ping");
        return Ok((
            StatusCode::ACCEPTED,
            Json(PingAccepted {
                accepted: 0,
                rejected: Vec::new(),
            }),
        ));
    }

    let (accepted, rejected): (Vec<String>, Vec<String>) = request
        .urls
        .into_iter()
        .partition(|url| state.queue.accepts(url).is_some());

    state.queue.enqueue(&accepted);

    Ok((
        StatusCode::ACCEPTED,
        Json(PingAccepted {
            accepted: accepted.len(),
            rejected,
        }),
    ))
}

/// GET /api/indexnow/status: Pending-set diagnostics.
async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(state.queue.status())
}
