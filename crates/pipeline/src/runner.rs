//! Job runner.
//!
//! Moves a registered job through `capturing -> encoding -> completed`,
//! wiring the sequencer's progress into the registry. Any failure lands the
//! job in `failed` with a readable message. Runs are meant to be spawned as
//! background tasks; the HTTP handlers only poll the registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chartcast_core::job::{AnimationArtifact, JobStatus};
use chartcast_core::types::SessionId;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use crate::browser::{BrowserError, BrowserSession, ScriptedFrameSource};
use crate::encoder::{self, EncodeError};
use crate::recorder::{self, RecorderConfig, RecorderError, RecorderRequest};
use crate::registry::{JobRegistry, RegistryError};
use crate::sequencer::{ProgressSink, RunLimits, Sequencer, SequencerError};
use crate::source::FrameSource;
use crate::webdriver::WebDriverSession;

/// Knobs shared by every run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub output_dir: PathBuf,
    pub retries: u8,
    pub call_timeout: Duration,
    /// Wall-clock budget measured from the job's `created_at`.
    pub job_timeout: Duration,
}

/// Where and how to open server-side browser sessions.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub settle_delay: Duration,
    /// Budget for the chart page to finish loading.
    pub page_load_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Browser session failed: {0}")]
    Browser(#[from] BrowserError),

    #[error("Recording failed: {0}")]
    Recorder(#[from] RecorderError),
}

#[derive(Clone)]
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    config: Arc<RunnerConfig>,
    http: reqwest::Client,
}

/// Forwards sequencer progress to the registry.
struct RegistryProgress<'a> {
    registry: &'a JobRegistry,
    session_id: &'a str,
}

impl ProgressSink for RegistryProgress<'_> {
    async fn report(&self, attempted: usize, captured: usize) {
        if let Err(e) = self
            .registry
            .update_progress(self.session_id, JobStatus::Capturing, attempted, captured)
            .await
        {
            tracing::debug!(session_id = %self.session_id, error = %e, "Progress update rejected");
        }
    }
}

impl JobRunner {
    pub fn new(registry: Arc<JobRegistry>, config: RunnerConfig, http: reqwest::Client) -> Self {
        Self {
            registry,
            config: Arc::new(config),
            http,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Spawn [`JobRunner::run`] on the runtime.
    pub fn spawn<S>(&self, session_id: SessionId, source: S) -> tokio::task::JoinHandle<()>
    where
        S: FrameSource + 'static,
    {
        let runner = self.clone();
        tokio::spawn(async move {
            let _ = runner.run(&session_id, source).await;
        })
    }

    /// Capture and encode one job with `source`.
    pub async fn run<S: FrameSource>(
        &self,
        session_id: &str,
        mut source: S,
    ) -> Result<AnimationArtifact, RunError> {
        let result = self.capture_and_encode(session_id, &mut source).await;
        source.finish().await;
        self.settle(session_id, result).await
    }

    /// Open a WebDriver session on `page_url`, then [`JobRunner::run`] with it.
    pub fn spawn_server_capture(
        &self,
        session_id: SessionId,
        browser: BrowserConfig,
        page_url: String,
    ) -> tokio::task::JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            let session = match runner.open_browser(&browser, &page_url).await {
                Ok(session) => session,
                Err(e) => {
                    let _ = runner.settle(&session_id, Err(e)).await;
                    return;
                }
            };
            let source = ScriptedFrameSource::new(session, browser.settle_delay);
            let _ = runner.run(&session_id, source).await;
        })
    }

    /// Run the external recorder for a job created in recorder mode.
    pub fn spawn_recorder(
        &self,
        session_id: SessionId,
        config: RecorderConfig,
        request: RecorderRequest,
    ) -> tokio::task::JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            let result = runner.record(&session_id, &config, &request).await;
            let _ = runner.settle(&session_id, result).await;
        })
    }

    // ---- private helpers ----

    async fn open_browser(
        &self,
        browser: &BrowserConfig,
        page_url: &str,
    ) -> Result<WebDriverSession, RunError> {
        let mut session =
            WebDriverSession::start(self.http.clone(), &browser.webdriver_url, browser.headless)
                .await?;
        let ready = async {
            session.navigate(page_url).await?;
            session.wait_until_ready(browser.page_load_timeout).await
        }
        .await;
        if let Err(e) = ready {
            session.close().await;
            return Err(e.into());
        }
        Ok(session)
    }

    async fn capture_and_encode<S: FrameSource>(
        &self,
        session_id: &str,
        source: &mut S,
    ) -> Result<AnimationArtifact, RunError> {
        let job = self.registry.get(session_id).await?;
        let cancel = self.registry.cancel_token(session_id).await?;
        self.registry
            .update_progress(session_id, JobStatus::Capturing, 0, 0)
            .await?;

        tracing::info!(session_id, frames = job.total_frames, mode = ?job.mode, "Capture started");

        let limits = RunLimits {
            retries: self.config.retries,
            call_timeout: self.config.call_timeout,
            deadline: Some(self.deadline_for(job.created_at)),
            cancel: cancel.clone(),
        };
        let progress = RegistryProgress {
            registry: &self.registry,
            session_id,
        };
        let frames = Sequencer::new(limits)
            .run(&job.frames, source, &progress)
            .await?;

        let captured = frames.len();
        self.registry
            .update_progress(session_id, JobStatus::Encoding, job.total_frames, captured)
            .await?;
        if cancel.is_cancelled() {
            return Err(SequencerError::Cancelled.into());
        }

        let out_path = self.config.output_dir.join(&job.filename);
        Ok(encoder::encode(frames, &job.settings, &out_path).await?)
    }

    async fn record(
        &self,
        session_id: &str,
        config: &RecorderConfig,
        request: &RecorderRequest,
    ) -> Result<AnimationArtifact, RunError> {
        let job = self.registry.get(session_id).await?;
        let destination = self.config.output_dir.join(&job.filename);
        if tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            return Err(EncodeError::AlreadyExists(job.filename.clone()).into());
        }
        self.registry
            .update_progress(session_id, JobStatus::Capturing, 0, 0)
            .await?;

        let output = recorder::run_recorder(config, request).await?;

        self.registry
            .update_progress(session_id, JobStatus::Encoding, job.total_frames, 0)
            .await?;

        let format = request.format.artifact_format();
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| EncodeError::WriteFailed(e.to_string()))?;
        if output.path != destination {
            copy_artifact(&output.path, &destination).await?;
        }
        Ok(encoder::inspect_artifact(&destination, format).await?)
    }

    /// Convert a job's wall-clock budget into a runtime deadline.
    fn deadline_for(&self, created_at: chartcast_core::types::Timestamp) -> Instant {
        let elapsed = (chrono::Utc::now() - created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        Instant::now() + self.config.job_timeout.saturating_sub(elapsed)
    }

    /// Record the final outcome in the registry.
    async fn settle(
        &self,
        session_id: &str,
        result: Result<AnimationArtifact, RunError>,
    ) -> Result<AnimationArtifact, RunError> {
        match result {
            Ok(artifact) => {
                if let Err(e) = self.registry.complete(session_id, artifact.clone()).await {
                    // The job went terminal while encoding; drop its output.
                    tracing::info!(session_id, error = %e, "Discarding artifact of finished job");
                    let _ = tokio::fs::remove_file(&artifact.path).await;
                    return Err(e.into());
                }
                tracing::info!(
                    session_id,
                    frames = artifact.frame_count,
                    bytes = artifact.byte_size,
                    "Job completed"
                );
                Ok(artifact)
            }
            Err(e) => {
                if let Err(registry_err) = self.registry.fail(session_id, e.to_string()).await {
                    // Already terminal, e.g. cancelled while running.
                    tracing::debug!(session_id, error = %registry_err, "Could not mark job failed");
                }
                Err(e)
            }
        }
    }
}

/// Copy a recorder artifact into the output directory without replacing
/// anything already there.
async fn copy_artifact(from: &Path, to: &Path) -> Result<(), EncodeError> {
    let mut source = tokio::fs::File::open(from)
        .await
        .map_err(|e| EncodeError::Unreadable(format!("{}: {e}", from.display())))?;
    let mut target = encoder::reserve_output(to).await?;
    let copied: std::io::Result<()> = async {
        tokio::io::copy(&mut source, &mut target).await?;
        target.flush().await
    }
    .await;
    if let Err(e) = copied {
        let _ = tokio::fs::remove_file(to).await;
        return Err(EncodeError::WriteFailed(format!("{}: {e}", to.display())));
    }
    Ok(())
}
