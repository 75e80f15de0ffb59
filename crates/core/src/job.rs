//! Animation job model and lifecycle state machine.
//!
//! A job moves strictly forward through
//! `ready -> capturing -> encoding -> completed`, and may drop to `failed`
//! from any non-terminal state. `completed` and `failed` are terminal.

use serde::{Deserialize, Serialize};

use crate::frame::FrameConfig;
use crate::types::{SessionId, Timestamp};

/// Default inter-frame delay when the client does not provide one.
pub const DEFAULT_FRAME_DELAY_MS: u32 = 500;

/// Fixed slack added to duration estimates for browser startup and encoding.
pub const ESTIMATE_OVERHEAD_SECS: f64 = 10.0;

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Ready,
    Capturing,
    Encoding,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        Self::Ready,
        Self::Capturing,
        Self::Encoding,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Capturing => "capturing",
            Self::Encoding => "encoding",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The single forward successor on the happy path, if any.
    pub fn next(self) -> Option<JobStatus> {
        match self {
            Self::Ready => Some(Self::Capturing),
            Self::Capturing => Some(Self::Encoding),
            Self::Encoding => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    /// Whether a job in `self` may move to `target`.
    ///
    /// Staying in the same non-terminal state is allowed so progress updates
    /// can be recorded without a transition.
    pub fn can_transition_to(self, target: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == self || target == Self::Failed || self.next() == Some(target)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which capture mechanism feeds the job's frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// A server-controlled browser session captures each frame.
    #[default]
    Server,
    /// The user's browser runs the generated capture script and posts frames back.
    Client,
    /// An external recorder process produces the artifact.
    Recorder,
}

/// Encoded artifact container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Gif,
    Mp4,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Mp4 => "mp4",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Gif => "image/gif",
            Self::Mp4 => "video/mp4",
        }
    }

    /// Guess the format from a filename's extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "gif" => Some(Self::Gif),
            "mp4" => Some(Self::Mp4),
            _ => None,
        }
    }
}

/// Timing and container parameters handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSettings {
    #[serde(default = "default_frame_delay")]
    pub frame_delay_ms: u32,
    #[serde(default)]
    pub format: OutputFormat,
    /// Looping is always infinite; kept explicit for clients.
    #[serde(default = "default_loop")]
    pub loop_forever: bool,
}

fn default_frame_delay() -> u32 {
    DEFAULT_FRAME_DELAY_MS
}

fn default_loop() -> bool {
    true
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            frame_delay_ms: DEFAULT_FRAME_DELAY_MS,
            format: OutputFormat::Gif,
            loop_forever: true,
        }
    }
}

impl EncoderSettings {
    /// Video frame rate implied by the frame delay, as a rational `num/den`.
    pub fn frame_rate(&self) -> (u32, u32) {
        (1000, self.frame_delay_ms.max(1))
    }
}

/// The encoded output of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationArtifact {
    pub filename: String,
    pub path: String,
    pub byte_size: u64,
    pub frame_count: usize,
    pub format: OutputFormat,
}

/// One requested animation run and its progress.
#[derive(Debug, Clone, Serialize)]
pub struct AnimationJob {
    pub session_id: SessionId,
    pub mode: CaptureMode,
    pub frames: Vec<FrameConfig>,
    pub filename: String,
    pub settings: EncoderSettings,
    pub status: JobStatus,
    /// Frames attempted so far.
    pub progress: usize,
    pub total_frames: usize,
    pub captured_frames: usize,
    pub message: String,
    pub error: Option<String>,
    pub artifact: Option<AnimationArtifact>,
    pub cleanup_eligible: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(skip)]
    pub capture_script: Option<String>,
}

impl AnimationJob {
    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }

    /// Progress as a whole percentage of requested frames.
    pub fn percent(&self) -> u8 {
        if self.total_frames == 0 {
            return if self.status.is_terminal() { 100 } else { 0 };
        }
        ((self.progress.min(self.total_frames) * 100) / self.total_frames) as u8
    }
}

/// Rough wall-clock estimate for capturing `frame_count` frames.
pub fn estimate_duration_secs(frame_count: usize, frame_delay_ms: u32) -> f64 {
    frame_count as f64 * (f64::from(frame_delay_ms) / 1000.0) + ESTIMATE_OVERHEAD_SECS
}

/// Estimate for a recorder run lasting `recording_secs` in total.
pub fn estimate_recording_secs(recording_secs: u32) -> f64 {
    f64::from(recording_secs) + ESTIMATE_OVERHEAD_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_linear() {
        assert_eq!(JobStatus::Ready.next(), Some(JobStatus::Capturing));
        assert_eq!(JobStatus::Capturing.next(), Some(JobStatus::Encoding));
        assert_eq!(JobStatus::Encoding.next(), Some(JobStatus::Completed));
        assert_eq!(JobStatus::Completed.next(), None);
    }

    #[test]
    fn no_transition_skips_forward() {
        assert!(!JobStatus::Ready.can_transition_to(JobStatus::Encoding));
        assert!(!JobStatus::Ready.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Capturing.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn no_transition_goes_backward() {
        assert!(!JobStatus::Encoding.can_transition_to(JobStatus::Capturing));
        assert!(!JobStatus::Capturing.can_transition_to(JobStatus::Ready));
    }

    #[test]
    fn failed_reachable_from_every_non_terminal_state() {
        for status in [JobStatus::Ready, JobStatus::Capturing, JobStatus::Encoding] {
            assert!(status.can_transition_to(JobStatus::Failed), "{status}");
        }
    }

    #[test]
    fn terminal_states_are_final() {
        for target in JobStatus::ALL {
            assert!(!JobStatus::Completed.can_transition_to(target));
            assert!(!JobStatus::Failed.can_transition_to(target));
        }
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(JobStatus::Capturing).unwrap(),
            serde_json::json!("capturing")
        );
    }

    #[test]
    fn format_from_filename() {
        assert_eq!(OutputFormat::from_filename("a.GIF"), Some(OutputFormat::Gif));
        assert_eq!(OutputFormat::from_filename("a.mp4"), Some(OutputFormat::Mp4));
        assert_eq!(OutputFormat::from_filename("a.webm"), None);
        assert_eq!(OutputFormat::from_filename("noext"), None);
    }

    #[test]
    fn frame_rate_from_delay() {
        let settings = EncoderSettings {
            frame_delay_ms: 200,
            ..EncoderSettings::default()
        };
        assert_eq!(settings.frame_rate(), (1000, 200));
    }

    #[test]
    fn settings_defaults_when_fields_missing() {
        let settings: EncoderSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, EncoderSettings::default());
    }

    #[test]
    fn estimate_matches_formula() {
        assert!((estimate_duration_secs(4, 500) - 12.0).abs() < 1e-9);
    }
}
