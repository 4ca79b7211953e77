//! IndexNow key file.
//!
//! Search engines fetch `https://{host}/{key}.txt` and expect the key as the
//! body. Serving it here keeps the key location in sync with configuration.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use beacon_common::error::AppError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/{file}", get(key_file))
}

/// GET /{key}.txt: Serve the configured key as plain text.
async fn key_file(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let indexnow = &state.config.indexnow;
    match (indexnow.key(), indexnow.key_file_name()) {
        (Some(key), Some(name)) if name == file => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            key.to_string(),
        )),
        _ => Err(AppError::NotFound(format!("{} not found", file))),
    }
}
