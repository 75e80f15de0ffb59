//! Frame sequencer.
//!
//! Walks the requested frame configurations strictly in order, asking the
//! source to configure and capture each one. A frame that keeps failing after
//! its retries is logged and skipped; the run only fails when nothing at all
//! was captured, when the job is cancelled, or when the job deadline passes.

use std::future::Future;
use std::time::Duration;

use chartcast_core::frame::FrameConfig;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::source::{CaptureError, ConfigError, ConfigureOutcome, FrameSource, RasterImage};

/// Upper bound on per-frame retries.
pub const MAX_RETRIES: u8 = 2;

/// A successfully captured frame and its position in the requested sequence.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub index: usize,
    pub image: RasterImage,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    #[error("No frames were captured ({attempted} attempted)")]
    NoFramesCaptured { attempted: usize },

    #[error("Job exceeded its time limit after {attempted} of {total} frames")]
    Timeout { attempted: usize, total: usize },

    #[error("Job was cancelled")]
    Cancelled,
}

/// Receives progress after every attempted frame.
pub trait ProgressSink: Send + Sync {
    /// `attempted` counts frames tried so far, `captured` those that succeeded.
    fn report(&self, attempted: usize, captured: usize) -> impl Future<Output = ()> + Send;
}

/// Bounds on a single sequencer run.
#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Extra attempts per frame after the first; clamped to [`MAX_RETRIES`].
    pub retries: u8,
    /// Upper bound on each configure or capture call.
    pub call_timeout: Duration,
    /// The whole run must finish before this instant.
    pub deadline: Option<Instant>,
    pub cancel: CancellationToken,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            retries: 0,
            call_timeout: Duration::from_secs(30),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug)]
enum AttemptError {
    Configure(ConfigError),
    Capture(CaptureError),
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configure(e) => write!(f, "configure: {e}"),
            Self::Capture(e) => write!(f, "capture: {e}"),
        }
    }
}

pub struct Sequencer {
    limits: RunLimits,
}

impl Sequencer {
    pub fn new(limits: RunLimits) -> Self {
        Self { limits }
    }

    /// Capture every frame in order, returning the successes in sequence
    /// order.
    pub async fn run<S, P>(
        &self,
        frames: &[FrameConfig],
        source: &mut S,
        progress: &P,
    ) -> Result<Vec<CapturedFrame>, SequencerError>
    where
        S: FrameSource,
        P: ProgressSink,
    {
        let total = frames.len();
        let attempts = 1 + self.limits.retries.min(MAX_RETRIES);
        let mut captured = Vec::with_capacity(total);

        for (index, frame) in frames.iter().enumerate() {
            if self.limits.cancel.is_cancelled() {
                tracing::info!(index, "Capture cancelled");
                return Err(SequencerError::Cancelled);
            }
            if self.limits.deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!(index, total, "Capture deadline reached");
                return Err(SequencerError::Timeout {
                    attempted: index,
                    total,
                });
            }

            for attempt in 1..=attempts {
                match self.attempt(index, frame, source).await {
                    Ok(image) => {
                        captured.push(CapturedFrame { index, image });
                        break;
                    }
                    Err(e) if attempt < attempts => {
                        tracing::debug!(index, attempt, error = %e, "Frame attempt failed, retrying");
                    }
                    Err(e) => {
                        tracing::warn!(index, attempts, error = %e, "Skipping frame");
                    }
                }
            }

            progress.report(index + 1, captured.len()).await;
        }

        if captured.is_empty() {
            return Err(SequencerError::NoFramesCaptured { attempted: total });
        }
        Ok(captured)
    }

    async fn attempt<S: FrameSource>(
        &self,
        index: usize,
        frame: &FrameConfig,
        source: &mut S,
    ) -> Result<RasterImage, AttemptError> {
        let call_timeout = self.limits.call_timeout;
        source.begin_frame(index);

        let outcome = tokio::time::timeout(call_timeout, source.configure(frame))
            .await
            .map_err(|_| AttemptError::Configure(ConfigError::Timeout))?
            .map_err(AttemptError::Configure)?;
        if outcome == ConfigureOutcome::Unacknowledged {
            tracing::debug!(index, "No configure strategy acknowledged the frame");
        }

        tokio::time::timeout(call_timeout, source.capture())
            .await
            .map_err(|_| AttemptError::Capture(CaptureError::Timeout))?
            .map_err(AttemptError::Capture)
    }
}
