//! Route definitions for animation jobs.
//!
//! Mounted at `/animations`.
//!
//! ```text
//! POST /                               submit_animation
//! POST /from-frames                    create_from_frames
//! GET  /{session_id}                   get_status
//! GET  /{session_id}/capture-script    get_capture_script
//! POST /{session_id}/frames            upload_frames
//! POST /{session_id}/cancel            cancel_animation
//! ```

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::animations;
use crate::state::AppState;

/// Body limit for frame batches; axum defaults to 2 MB.
const FRAME_UPLOAD_LIMIT: usize = 256 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(animations::submit_animation))
        .route(
            "/from-frames",
            post(animations::create_from_frames).layer(DefaultBodyLimit::max(FRAME_UPLOAD_LIMIT)),
        )
        .route("/{session_id}", get(animations::get_status))
        .route(
            "/{session_id}/capture-script",
            get(animations::get_capture_script),
        )
        .route(
            "/{session_id}/frames",
            post(animations::upload_frames).layer(DefaultBodyLimit::max(FRAME_UPLOAD_LIMIT)),
        )
        .route("/{session_id}/cancel", post(animations::cancel_animation))
}
