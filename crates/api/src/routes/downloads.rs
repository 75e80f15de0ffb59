//! Route definitions for artifact downloads.
//!
//! Mounted at `/downloads`.
//!
//! ```text
//! GET /{filename}    download_artifact
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::downloads;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/{filename}", get(downloads::download_artifact))
}
