//! Serves encoded artifacts from the output directory.

use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chartcast_core::error::CoreError;
use chartcast_core::job::OutputFormat;
use chartcast_core::naming;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /downloads/{filename}
// ---------------------------------------------------------------------------

/// Raw artifact bytes as an attachment.
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<impl IntoResponse> {
    naming::validate_filename(&filename)?;

    let path = state.config.output_dir.join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CoreError::NotFound {
                entity: "File",
                id: filename,
            }
            .into())
        }
        Err(e) => {
            return Err(AppError::InternalError(format!(
                "reading {}: {e}",
                path.display()
            )))
        }
    };

    let content_type = OutputFormat::from_filename(&filename)
        .map_or("application/octet-stream", OutputFormat::content_type);

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, content_type.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}
