//! Route definitions for recorder jobs.
//!
//! Mounted at `/recordings`.
//!
//! ```text
//! POST /        start_recording
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::recordings;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(recordings::start_recording))
}
