pub mod animations;
pub mod data;
pub mod downloads;
pub mod health;
pub mod recordings;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /data/sample                                     all rows of the active dataset
/// /data/table                                      rows + columns (?limit=)
/// /data/chart                                      chart projection (POST)
/// /data/columns                                    column schema
/// /data/upload                                     replace dataset (POST)
/// /data/upload-csv                                 replace dataset from CSV (POST, multipart)
/// /data/sample-datasets                            sample catalogue
/// /data/load-sample/{name}                         load a sample (POST)
/// /data/filter                                     filtered rows (POST)
///
/// /animations                                      submit job (POST)
/// /animations/from-frames                          encode ordered frames (POST)
/// /animations/{session_id}                         job status
/// /animations/{session_id}/capture-script          client capture script
/// /animations/{session_id}/frames                  client frame upload (POST)
/// /animations/{session_id}/cancel                  cancel job (POST)
///
/// /recordings                                      recorder job (POST)
///
/// /downloads/{filename}                            artifact bytes
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Active dataset.
        .nest("/data", data::router())
        // Animation jobs.
        .nest("/animations", animations::router())
        // External recorder jobs.
        .nest("/recordings", recordings::router())
        // Artifact downloads.
        .nest("/downloads", downloads::router())
}
