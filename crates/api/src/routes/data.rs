//! Route definitions for the active dataset.
//!
//! Mounted at `/data`.
//!
//! ```text
//! GET  /sample                 get_sample
//! GET  /table                  get_table
//! POST /chart                  chart_data
//! GET  /columns                get_columns
//! POST /upload                 upload_data
//! POST /upload-csv             upload_csv
//! GET  /sample-datasets        list_sample_datasets
//! POST /load-sample/{name}     load_sample_dataset
//! POST /filter                 filter_data
//! ```

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::data;
use crate::state::AppState;

/// Body limit for CSV files; axum defaults to 2 MB.
const CSV_UPLOAD_LIMIT: usize = 64 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sample", get(data::get_sample))
        .route("/table", get(data::get_table))
        .route("/chart", post(data::chart_data))
        .route("/columns", get(data::get_columns))
        .route("/upload", post(data::upload_data))
        .route(
            "/upload-csv",
            post(data::upload_csv).layer(DefaultBodyLimit::max(CSV_UPLOAD_LIMIT)),
        )
        .route("/sample-datasets", get(data::list_sample_datasets))
        .route("/load-sample/{name}", post(data::load_sample_dataset))
        .route("/filter", post(data::filter_data))
}
