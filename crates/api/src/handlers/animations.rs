//! Handlers for animation jobs.
//!
//! A job is submitted once and then polled. Server-mode jobs start capturing
//! immediately in a WebDriver-controlled browser; client-mode jobs hand back
//! a capture script and wait for the browser to post its frames to
//! `/animations/{session_id}/frames`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chartcast_core::capture_script::{self, CaptureScriptParams};
use chartcast_core::error::CoreError;
use chartcast_core::frame::FrameConfig;
use chartcast_core::job::{
    estimate_duration_secs, AnimationJob, CaptureMode, EncoderSettings, JobStatus, OutputFormat,
};
use chartcast_core::naming;
use chartcast_core::types::{SessionId, Timestamp};
use chartcast_pipeline::encoder;
use chartcast_pipeline::registry::NewJob;
use chartcast_pipeline::sequencer::CapturedFrame;
use chartcast_pipeline::uploaded::{decode_frame_payload, UploadedFrameSource};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitAnimationRequest {
    #[serde(default)]
    pub mode: CaptureMode,
    pub frames: Vec<FrameConfig>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub settings: EncoderSettings,
    /// Chart page the server-side browser opens. Required in server mode.
    #[serde(default)]
    pub page_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmittedAnimation {
    pub session_id: SessionId,
    pub mode: CaptureMode,
    pub filename: String,
    /// Seconds.
    pub estimated_duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_script: Option<String>,
}

impl SubmittedAnimation {
    pub fn new(job: &AnimationJob, capture_script: Option<String>) -> Self {
        Self {
            session_id: job.session_id.clone(),
            mode: job.mode,
            filename: job.filename.clone(),
            estimated_duration: estimate_duration_secs(
                job.total_frames,
                job.settings.frame_delay_ms,
            ),
            capture_script,
        }
    }
}

/// Polling view of a job.
#[derive(Debug, Serialize)]
pub struct AnimationStatus {
    pub session_id: SessionId,
    pub mode: CaptureMode,
    pub status: JobStatus,
    /// Frames attempted so far.
    pub progress: usize,
    pub total_frames: usize,
    pub captured_frames: usize,
    pub percent: u8,
    pub message: String,
    pub completed: bool,
    pub error: Option<String>,
    pub filename: String,
    /// Present once the artifact exists.
    pub download_url: Option<String>,
    pub frame_count: Option<usize>,
    pub byte_size: Option<u64>,
    pub cleanup_eligible: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<AnimationJob> for AnimationStatus {
    fn from(job: AnimationJob) -> Self {
        let percent = job.percent();
        let completed = job.is_completed();
        let artifact = job.artifact.as_ref();
        Self {
            download_url: artifact.map(|a| download_url(&a.filename)),
            frame_count: artifact.map(|a| a.frame_count),
            byte_size: artifact.map(|a| a.byte_size),
            session_id: job.session_id,
            mode: job.mode,
            status: job.status,
            progress: job.progress,
            total_frames: job.total_frames,
            captured_frames: job.captured_frames,
            percent,
            message: job.message,
            completed,
            error: job.error,
            filename: job.filename,
            cleanup_eligible: job.cleanup_eligible,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CaptureScriptResponse {
    pub session_id: SessionId,
    pub capture_script: String,
}

/// Frames posted back by the capture script, one entry per requested frame.
/// `null` marks a frame the browser failed to capture.
#[derive(Debug, Deserialize)]
pub struct UploadFramesRequest {
    pub frames: Vec<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFromFramesRequest {
    /// Base64 PNGs or data URLs, already in playback order.
    pub frames: Vec<String>,
    #[serde(default)]
    pub settings: EncoderSettings,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedAnimation {
    pub filename: String,
    pub format: OutputFormat,
    pub frame_count: usize,
    pub byte_size: u64,
    pub download_url: String,
}

pub fn download_url(filename: &str) -> String {
    format!("/api/v1/downloads/{filename}")
}

// ---------------------------------------------------------------------------
// POST /animations
// ---------------------------------------------------------------------------

/// Register a job and start it (server mode) or hand back its capture
/// script (client mode).
pub async fn submit_animation(
    State(state): State<AppState>,
    Json(input): Json<SubmitAnimationRequest>,
) -> AppResult<impl IntoResponse> {
    let server_capture = match input.mode {
        CaptureMode::Server => {
            let browser = state.config.browser_config().ok_or_else(|| {
                CoreError::Validation(
                    "Server-side capture is not configured; use client mode".into(),
                )
            })?;
            let page_url = input
                .page_url
                .as_deref()
                .map(str::trim)
                .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
                .ok_or_else(|| {
                    CoreError::Validation("page_url must be an http(s) URL in server mode".into())
                })?
                .to_string();
            Some((browser, page_url))
        }
        CaptureMode::Client => None,
        CaptureMode::Recorder => {
            return Err(AppError::BadRequest(
                "Recorder jobs are submitted to /recordings".into(),
            ))
        }
    };

    let job = state
        .registry
        .create(NewJob {
            mode: input.mode,
            frames: input.frames,
            filename: input.filename,
            settings: input.settings,
        })
        .await?;

    let capture_script = match server_capture {
        Some((browser, page_url)) => {
            state
                .runner
                .spawn_server_capture(job.session_id.clone(), browser, page_url);
            None
        }
        None => {
            let script = capture_script::generate(&CaptureScriptParams {
                session_id: &job.session_id,
                frames: &job.frames,
                frame_delay_ms: job.settings.frame_delay_ms,
                settle_delay_ms: state.config.settle_delay_ms,
                upload_url: capture_script::upload_url(
                    &state.config.public_base_url,
                    &job.session_id,
                ),
            })
            .map_err(|e| AppError::InternalError(format!("capture script: {e}")))?;
            state
                .registry
                .attach_capture_script(&job.session_id, script.clone())
                .await?;
            Some(script)
        }
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SubmittedAnimation::new(&job, capture_script),
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /animations/{session_id}
// ---------------------------------------------------------------------------

pub async fn get_status(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> AppResult<impl IntoResponse> {
    let job = state.registry.get(&session_id).await?;
    Ok(Json(DataResponse {
        data: AnimationStatus::from(job),
    }))
}

// ---------------------------------------------------------------------------
// GET /animations/{session_id}/capture-script
// ---------------------------------------------------------------------------

pub async fn get_capture_script(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> AppResult<impl IntoResponse> {
    let capture_script = state
        .registry
        .capture_script(&session_id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "CaptureScript",
            id: session_id.clone(),
        })?;
    Ok(Json(DataResponse {
        data: CaptureScriptResponse {
            session_id,
            capture_script,
        },
    }))
}

// ---------------------------------------------------------------------------
// POST /animations/{session_id}/frames
// ---------------------------------------------------------------------------

/// Accept the browser's frames for a client-mode job and run the pipeline
/// on them in the background.
pub async fn upload_frames(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(input): Json<UploadFramesRequest>,
) -> AppResult<impl IntoResponse> {
    if input.frames.is_empty() {
        return Err(AppError::BadRequest("No frames provided".into()));
    }

    let job = state
        .registry
        .begin_capture(&session_id, CaptureMode::Client)
        .await?;
    if input.frames.len() != job.total_frames {
        tracing::warn!(
            session_id = %session_id,
            expected = job.total_frames,
            received = input.frames.len(),
            "Uploaded frame count differs from the job"
        );
    }

    state
        .runner
        .spawn(session_id, UploadedFrameSource::new(input.frames));

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: AnimationStatus::from(job),
        }),
    ))
}

// ---------------------------------------------------------------------------
// POST /animations/{session_id}/cancel
// ---------------------------------------------------------------------------

pub async fn cancel_animation(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> AppResult<impl IntoResponse> {
    let job = state.registry.cancel(&session_id).await?;
    Ok(Json(DataResponse {
        data: AnimationStatus::from(job),
    }))
}

// ---------------------------------------------------------------------------
// POST /animations/from-frames
// ---------------------------------------------------------------------------

/// Encode already-ordered frames straight into an artifact, bypassing the
/// job registry.
pub async fn create_from_frames(
    State(state): State<AppState>,
    Json(input): Json<CreateFromFramesRequest>,
) -> AppResult<impl IntoResponse> {
    if input.frames.is_empty() {
        return Err(AppError::BadRequest("No frames provided".into()));
    }
    if input.settings.frame_delay_ms == 0 {
        return Err(CoreError::Validation("frame_delay_ms must be greater than zero".into()).into());
    }

    let filename = naming::artifact_filename(
        input.filename.as_deref(),
        &naming::new_session_id(chrono::Utc::now()),
        input.settings.format,
    )?;

    let payloads = input.frames;
    let frames = tokio::task::spawn_blocking(move || {
        payloads
            .iter()
            .enumerate()
            .map(|(index, payload)| {
                decode_frame_payload(payload)
                    .map(|image| CapturedFrame { index, image })
                    .map_err(|e| AppError::BadRequest(format!("Frame {index}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| AppError::InternalError(format!("frame decoding task: {e}")))??;

    let out_path = state.config.output_dir.join(&filename);
    let artifact = encoder::encode(frames, &input.settings, &out_path).await?;
    tracing::info!(
        filename = %artifact.filename,
        frames = artifact.frame_count,
        bytes = artifact.byte_size,
        "Animation created from uploaded frames"
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedAnimation {
                download_url: download_url(&artifact.filename),
                filename: artifact.filename,
                format: artifact.format,
                frame_count: artifact.frame_count,
                byte_size: artifact.byte_size,
            },
        }),
    ))
}
