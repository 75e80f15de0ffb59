//! Handlers for the active dataset: browsing, chart projection, filtering,
//! and replacing it with uploaded rows or a generated sample.

use axum::extract::{Multipart, Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chartcast_core::dataset::query::{self, ChartPoint};
use chartcast_core::dataset::{samples, Dataset, Row};
use chartcast_core::frame::FrameConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TableQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ChartData {
    pub points: Vec<ChartPoint>,
    pub config: FrameConfig,
    pub total_points: usize,
}

#[derive(Debug, Serialize)]
pub struct UploadSummary {
    pub message: String,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Serialize)]
pub struct CsvUploadSummary {
    pub message: String,
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LoadedSample {
    pub message: String,
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub sample_row: Option<Row>,
}

#[derive(Debug, Serialize)]
pub struct FilteredRows {
    pub rows: Vec<Row>,
    pub total_rows: usize,
}

// ---------------------------------------------------------------------------
// GET /data/sample
// ---------------------------------------------------------------------------

/// Every row of the active dataset.
pub async fn get_sample(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let rows = state.data.read(|d| d.rows().to_vec()).await;
    Ok(Json(DataResponse { data: rows }))
}

// ---------------------------------------------------------------------------
// GET /data/table
// ---------------------------------------------------------------------------

pub async fn get_table(
    State(state): State<AppState>,
    Query(params): Query<TableQuery>,
) -> AppResult<impl IntoResponse> {
    let view = state.data.read(|d| query::table(d, params.limit)).await;
    Ok(Json(DataResponse { data: view }))
}

// ---------------------------------------------------------------------------
// POST /data/chart
// ---------------------------------------------------------------------------

/// Project the dataset onto the chart axes in `config`.
pub async fn chart_data(
    State(state): State<AppState>,
    Json(config): Json<FrameConfig>,
) -> AppResult<impl IntoResponse> {
    config.validate()?;
    let points = state
        .data
        .read(|d| query::chart_points(d, &config))
        .await?;
    let total_points = points.len();
    Ok(Json(DataResponse {
        data: ChartData {
            points,
            config,
            total_points,
        },
    }))
}

// ---------------------------------------------------------------------------
// GET /data/columns
// ---------------------------------------------------------------------------

pub async fn get_columns(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let schema = state.data.read(query::column_schema).await;
    Ok(Json(DataResponse { data: schema }))
}

// ---------------------------------------------------------------------------
// POST /data/upload
// ---------------------------------------------------------------------------

/// Replace the active dataset with a JSON array of row objects.
pub async fn upload_data(
    State(state): State<AppState>,
    Json(records): Json<Vec<Value>>,
) -> AppResult<impl IntoResponse> {
    let dataset = Dataset::from_json_records(records)?;
    let (rows, columns) = state.data.replace(dataset).await;
    tracing::info!(rows, columns, "Dataset replaced by upload");
    Ok(Json(DataResponse {
        data: UploadSummary {
            message: "Data uploaded successfully".into(),
            rows,
            columns,
        },
    }))
}

// ---------------------------------------------------------------------------
// POST /data/upload-csv
// ---------------------------------------------------------------------------

/// Replace the active dataset with a CSV file sent as the multipart `file`
/// field.
pub async fn upload_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        file = Some((filename, data.to_vec()));
    }

    let (filename, data) = file
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| AppError::BadRequest("No file selected".into()))?;
    if !filename.to_ascii_lowercase().ends_with(".csv") {
        return Err(AppError::BadRequest("File must be a CSV file".into()));
    }
    if data.is_empty() {
        return Err(AppError::BadRequest("File is empty".into()));
    }

    let dataset = tokio::task::spawn_blocking(move || Dataset::from_csv_bytes(&data))
        .await
        .map_err(|e| AppError::InternalError(format!("CSV parsing task: {e}")))??;
    let column_names = dataset.columns().to_vec();
    let (rows, columns) = state.data.replace(dataset).await;
    tracing::info!(%filename, rows, columns, "Dataset replaced by CSV upload");

    Ok(Json(DataResponse {
        data: CsvUploadSummary {
            message: format!("CSV file '{filename}' uploaded successfully"),
            rows,
            columns,
            column_names,
        },
    }))
}

// ---------------------------------------------------------------------------
// GET /data/sample-datasets
// ---------------------------------------------------------------------------

pub async fn list_sample_datasets() -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: samples::CATALOGUE,
    }))
}

// ---------------------------------------------------------------------------
// POST /data/load-sample/{name}
// ---------------------------------------------------------------------------

/// Regenerate a named sample dataset and make it the active one.
pub async fn load_sample_dataset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<impl IntoResponse> {
    let dataset = samples::generate(&name, &mut rand::rng())?;
    let column_names = dataset.columns().to_vec();
    let sample_row = dataset.rows().first().cloned();
    let (rows, columns) = state.data.replace(dataset).await;
    tracing::info!(dataset = %name, rows, "Sample dataset loaded");
    Ok(Json(DataResponse {
        data: LoadedSample {
            message: format!("Sample dataset '{name}' loaded successfully"),
            rows,
            columns,
            column_names,
            sample_row,
        },
    }))
}

// ---------------------------------------------------------------------------
// POST /data/filter
// ---------------------------------------------------------------------------

/// Rows matching every filter. A filter value is either an exact match or
/// a `{ "min": .., "max": .. }` range.
pub async fn filter_data(
    State(state): State<AppState>,
    Json(filters): Json<Map<String, Value>>,
) -> AppResult<impl IntoResponse> {
    let rows = state.data.read(|d| query::filter(d, filters)).await?;
    let total_rows = rows.len();
    Ok(Json(DataResponse {
        data: FilteredRows { rows, total_rows },
    }))
}
