//! Handler for recorder-driven jobs: the external recorder opens the chart
//! page itself and the job only tracks its outcome.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chartcast_core::error::CoreError;
use chartcast_core::frame::frames_from_axis_lists;
use chartcast_core::job::{estimate_recording_secs, CaptureMode, EncoderSettings};
use chartcast_core::naming;
use chartcast_pipeline::recorder::RecorderRequest;
use chartcast_pipeline::registry::NewJob;

use crate::error::AppResult;
use crate::handlers::animations::SubmittedAnimation;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// POST /recordings
// ---------------------------------------------------------------------------

/// Register a recorder job and launch the recorder in the background.
pub async fn start_recording(
    State(state): State<AppState>,
    Json(request): Json<RecorderRequest>,
) -> AppResult<impl IntoResponse> {
    validate_request(&request)?;

    let job = state
        .registry
        .create(NewJob {
            mode: CaptureMode::Recorder,
            frames: frames_from_axis_lists(&request.x_columns, &request.y_columns),
            filename: Some(request.output.clone()),
            settings: EncoderSettings {
                frame_delay_ms: (1000 / request.fps).max(1),
                format: request.format.artifact_format(),
                ..EncoderSettings::default()
            },
        })
        .await?;

    let mut submitted = SubmittedAnimation::new(&job, None);
    submitted.estimated_duration = estimate_recording_secs(request.duration);

    state.runner.spawn_recorder(
        job.session_id.clone(),
        state.config.recorder_config(),
        request,
    );

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: submitted })))
}

fn validate_request(request: &RecorderRequest) -> Result<(), CoreError> {
    if !(request.url.starts_with("http://") || request.url.starts_with("https://")) {
        return Err(CoreError::Validation("url must be an http(s) URL".into()));
    }
    naming::validate_filename(&request.output)?;
    if request.duration == 0 || request.fps == 0 {
        return Err(CoreError::Validation(
            "duration and fps must be greater than zero".into(),
        ));
    }
    if !(request.speed.is_finite() && request.speed > 0.0) {
        return Err(CoreError::Validation("speed must be positive".into()));
    }
    Ok(())
}
