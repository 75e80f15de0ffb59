//! In-memory job registry.
//!
//! Holds every [`AnimationJob`] keyed by session ID behind a single
//! `RwLock`. All mutations take the write lock and validate the lifecycle
//! transition first; readers get cloned snapshots. Each job owns a
//! [`CancellationToken`] that the runner polls between frames.

use std::collections::HashMap;

use chartcast_core::frame::{validate_frames, FrameConfig};
use chartcast_core::job::{
    AnimationArtifact, AnimationJob, CaptureMode, EncoderSettings, JobStatus,
};
use chartcast_core::naming;
use chartcast_core::types::{SessionId, Timestamp};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Recording session {0} not found")]
    NotFound(SessionId),

    #[error("Session {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: SessionId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Session {id} progress cannot go back from {current} to {requested}")]
    ProgressRegression {
        id: SessionId,
        current: usize,
        requested: usize,
    },

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Conflict(String),
}

/// Parameters for a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub mode: CaptureMode,
    pub frames: Vec<FrameConfig>,
    pub filename: Option<String>,
    pub settings: EncoderSettings,
}

struct Entry {
    job: AnimationJob,
    cancel: CancellationToken,
}

pub struct JobRegistry {
    jobs: RwLock<HashMap<SessionId, Entry>>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Register a job in `ready` and return its snapshot.
    ///
    /// Recorder jobs may carry no frames: the recorder then captures the
    /// page as it is.
    pub async fn create(&self, new: NewJob) -> Result<AnimationJob, RegistryError> {
        if new.mode != CaptureMode::Recorder || !new.frames.is_empty() {
            validate_frames(&new.frames).map_err(|e| RegistryError::Invalid(e.to_string()))?;
        }
        if new.settings.frame_delay_ms == 0 {
            return Err(RegistryError::Invalid(
                "frame_delay_ms must be greater than zero".into(),
            ));
        }

        let now = chrono::Utc::now();
        let session_id = naming::new_session_id(now);
        let filename =
            naming::artifact_filename(new.filename.as_deref(), &session_id, new.settings.format)
                .map_err(|e| RegistryError::Invalid(e.to_string()))?;

        let job = AnimationJob {
            session_id: session_id.clone(),
            mode: new.mode,
            total_frames: new.frames.len(),
            frames: new.frames,
            filename,
            settings: new.settings,
            status: JobStatus::Ready,
            progress: 0,
            captured_frames: 0,
            message: ready_message(new.mode).to_string(),
            error: None,
            artifact: None,
            cleanup_eligible: false,
            created_at: now,
            updated_at: now,
            capture_script: None,
        };

        self.jobs.write().await.insert(
            session_id.clone(),
            Entry {
                job: job.clone(),
                cancel: CancellationToken::new(),
            },
        );
        tracing::info!(session_id = %session_id, mode = ?new.mode, frames = job.total_frames, "Job created");
        Ok(job)
    }

    pub async fn get(&self, id: &str) -> Result<AnimationJob, RegistryError> {
        self.jobs
            .read()
            .await
            .get(id)
            .map(|e| e.job.clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub async fn cancel_token(&self, id: &str) -> Result<CancellationToken, RegistryError> {
        self.jobs
            .read()
            .await
            .get(id)
            .map(|e| e.cancel.clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Claim a `ready` job of the given mode and move it to `capturing`.
    ///
    /// Only one caller can win; a job that already left `ready` is a
    /// conflict.
    pub async fn begin_capture(
        &self,
        id: &str,
        mode: CaptureMode,
    ) -> Result<AnimationJob, RegistryError> {
        self.mutate(id, |job| {
            if job.mode != mode {
                return Err(RegistryError::Invalid(format!(
                    "Session {id} was created for {:?} capture",
                    job.mode
                )));
            }
            if job.status != JobStatus::Ready {
                return Err(RegistryError::Conflict(format!(
                    "Session {id} is already {}",
                    job.status
                )));
            }
            transition(job, JobStatus::Capturing)?;
            job.message = format!("Capturing {} frames", job.total_frames);
            Ok(())
        })
        .await
    }

    /// Record progress, optionally advancing the status.
    pub async fn update_progress(
        &self,
        id: &str,
        status: JobStatus,
        progress: usize,
        captured: usize,
    ) -> Result<AnimationJob, RegistryError> {
        self.mutate(id, |job| {
            if progress < job.progress {
                return Err(RegistryError::ProgressRegression {
                    id: job.session_id.clone(),
                    current: job.progress,
                    requested: progress,
                });
            }
            transition(job, status)?;
            job.progress = progress.min(job.total_frames);
            job.captured_frames = captured.max(job.captured_frames);
            job.message = match status {
                JobStatus::Capturing => format!(
                    "Captured {} of {} frames ({} attempted)",
                    job.captured_frames, job.total_frames, job.progress
                ),
                JobStatus::Encoding => format!("Encoding {} frames", job.captured_frames),
                _ => job.message.clone(),
            };
            Ok(())
        })
        .await
    }

    /// Attach the finished artifact and move to `completed`.
    pub async fn complete(
        &self,
        id: &str,
        artifact: AnimationArtifact,
    ) -> Result<AnimationJob, RegistryError> {
        self.mutate(id, |job| {
            transition(job, JobStatus::Completed)?;
            job.progress = job.total_frames;
            job.captured_frames = artifact.frame_count;
            job.message = format!(
                "Animation created with {} frames: {}",
                artifact.frame_count, artifact.filename
            );
            job.artifact = Some(artifact);
            Ok(())
        })
        .await
    }

    /// Move to `failed` with a human-readable reason.
    pub async fn fail(&self, id: &str, error: String) -> Result<AnimationJob, RegistryError> {
        let job = self
            .mutate(id, |job| {
                transition(job, JobStatus::Failed)?;
                job.message = "Recording failed".into();
                job.error = Some(error);
                Ok(())
            })
            .await?;
        tracing::warn!(session_id = %id, error = job.error.as_deref().unwrap_or_default(), "Job failed");
        Ok(job)
    }

    /// Fire the job's cancellation token and mark it failed.
    pub async fn cancel(&self, id: &str) -> Result<AnimationJob, RegistryError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        transition(&mut entry.job, JobStatus::Failed)?;
        entry.job.message = "Recording cancelled".into();
        entry.job.error = Some("Cancelled by request".into());
        entry.job.updated_at = chrono::Utc::now();
        entry.cancel.cancel();
        tracing::info!(session_id = %id, "Job cancelled");
        Ok(entry.job.clone())
    }

    /// Store the generated client capture script. Write-once.
    pub async fn attach_capture_script(
        &self,
        id: &str,
        script: String,
    ) -> Result<(), RegistryError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if entry.job.capture_script.is_some() {
            return Err(RegistryError::Conflict(format!(
                "Session {id} already has a capture script"
            )));
        }
        entry.job.capture_script = Some(script);
        Ok(())
    }

    /// The stored capture script, if the job has one.
    pub async fn capture_script(&self, id: &str) -> Result<Option<String>, RegistryError> {
        self.jobs
            .read()
            .await
            .get(id)
            .map(|e| e.job.capture_script.clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Flag terminal jobs last touched more than `retention` before `now`.
    /// Returns how many jobs were newly flagged.
    pub async fn mark_stale(&self, retention: chrono::Duration, now: Timestamp) -> usize {
        let mut jobs = self.jobs.write().await;
        let mut marked = 0;
        for entry in jobs.values_mut() {
            let job = &mut entry.job;
            if job.status.is_terminal() && !job.cleanup_eligible && now - job.updated_at > retention
            {
                job.cleanup_eligible = true;
                marked += 1;
            }
        }
        marked
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    async fn mutate<F>(&self, id: &str, f: F) -> Result<AnimationJob, RegistryError>
    where
        F: FnOnce(&mut AnimationJob) -> Result<(), RegistryError>,
    {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        f(&mut entry.job)?;
        entry.job.updated_at = chrono::Utc::now();
        Ok(entry.job.clone())
    }
}

fn transition(job: &mut AnimationJob, to: JobStatus) -> Result<(), RegistryError> {
    if !job.status.can_transition_to(to) {
        return Err(RegistryError::InvalidTransition {
            id: job.session_id.clone(),
            from: job.status,
            to,
        });
    }
    job.status = to;
    Ok(())
}

fn ready_message(mode: CaptureMode) -> &'static str {
    match mode {
        CaptureMode::Server => "Queued for server-side capture",
        CaptureMode::Client => "Ready to capture frames in current browser",
        CaptureMode::Recorder => "Queued for recorder",
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chartcast_core::job::OutputFormat;
    use proptest::prelude::*;

    use super::*;

    fn new_job(frames: usize) -> NewJob {
        NewJob {
            mode: CaptureMode::Client,
            frames: (0..frames).map(|i| FrameConfig::new(format!("x{i}"), "y")).collect(),
            filename: None,
            settings: EncoderSettings::default(),
        }
    }

    fn artifact(frames: usize) -> AnimationArtifact {
        AnimationArtifact {
            filename: "a.gif".into(),
            path: "/tmp/a.gif".into(),
            byte_size: 10,
            frame_count: frames,
            format: OutputFormat::Gif,
        }
    }

    #[tokio::test]
    async fn create_starts_ready_with_default_filename() {
        let registry = JobRegistry::new();
        let job = registry.create(new_job(3)).await.unwrap();
        assert_eq!(job.status, JobStatus::Ready);
        assert_eq!(job.total_frames, 3);
        assert!(job.session_id.starts_with("recording-"));
        assert_eq!(job.filename, format!("chart_animation_{}.gif", job.session_id));
        assert_eq!(registry.get(&job.session_id).await.unwrap().status, JobStatus::Ready);
    }

    #[tokio::test]
    async fn create_rejects_empty_frames() {
        let registry = JobRegistry::new();
        assert_matches!(registry.create(new_job(0)).await, Err(RegistryError::Invalid(_)));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn recorder_job_may_have_no_frames() {
        let registry = JobRegistry::new();
        let job = registry
            .create(NewJob {
                mode: CaptureMode::Recorder,
                ..new_job(0)
            })
            .await
            .unwrap();
        assert_eq!(job.total_frames, 0);
        assert_eq!(job.percent(), 0);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let registry = JobRegistry::new();
        assert_matches!(
            registry.get("recording-missing").await,
            Err(RegistryError::NotFound(id)) if id == "recording-missing"
        );
    }

    #[tokio::test]
    async fn happy_path_lifecycle() {
        let registry = JobRegistry::new();
        let id = registry.create(new_job(2)).await.unwrap().session_id;
        registry
            .update_progress(&id, JobStatus::Capturing, 1, 1)
            .await
            .unwrap();
        registry
            .update_progress(&id, JobStatus::Encoding, 2, 2)
            .await
            .unwrap();
        let job = registry.complete(&id, artifact(2)).await.unwrap();
        assert!(job.is_completed());
        assert_eq!(job.percent(), 100);
        assert_eq!(job.artifact.unwrap().frame_count, 2);
    }

    #[tokio::test]
    async fn cannot_complete_from_ready() {
        let registry = JobRegistry::new();
        let id = registry.create(new_job(1)).await.unwrap().session_id;
        assert_matches!(
            registry.complete(&id, artifact(1)).await,
            Err(RegistryError::InvalidTransition {
                from: JobStatus::Ready,
                to: JobStatus::Completed,
                ..
            })
        );
    }

    #[tokio::test]
    async fn progress_cannot_decrease() {
        let registry = JobRegistry::new();
        let id = registry.create(new_job(3)).await.unwrap().session_id;
        registry
            .update_progress(&id, JobStatus::Capturing, 2, 2)
            .await
            .unwrap();
        assert_matches!(
            registry.update_progress(&id, JobStatus::Capturing, 1, 1).await,
            Err(RegistryError::ProgressRegression { current: 2, requested: 1, .. })
        );
    }

    #[tokio::test]
    async fn cancel_fires_token_and_fails_job() {
        let registry = JobRegistry::new();
        let id = registry.create(new_job(1)).await.unwrap().session_id;
        let token = registry.cancel_token(&id).await.unwrap();
        let job = registry.cancel(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(token.is_cancelled());
        assert_matches!(
            registry.cancel(&id).await,
            Err(RegistryError::InvalidTransition { .. })
        );
    }

    #[tokio::test]
    async fn begin_capture_is_claimed_once() {
        let registry = JobRegistry::new();
        let id = registry.create(new_job(2)).await.unwrap().session_id;

        let job = registry.begin_capture(&id, CaptureMode::Client).await.unwrap();
        assert_eq!(job.status, JobStatus::Capturing);
        assert_matches!(
            registry.begin_capture(&id, CaptureMode::Client).await,
            Err(RegistryError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn begin_capture_checks_mode() {
        let registry = JobRegistry::new();
        let id = registry.create(new_job(1)).await.unwrap().session_id;
        assert_matches!(
            registry.begin_capture(&id, CaptureMode::Server).await,
            Err(RegistryError::Invalid(_))
        );
        assert_eq!(registry.get(&id).await.unwrap().status, JobStatus::Ready);
    }

    #[tokio::test]
    async fn capture_script_is_write_once() {
        let registry = JobRegistry::new();
        let id = registry.create(new_job(1)).await.unwrap().session_id;
        assert_eq!(registry.capture_script(&id).await.unwrap(), None);
        registry
            .attach_capture_script(&id, "script".into())
            .await
            .unwrap();
        assert_matches!(
            registry.attach_capture_script(&id, "other".into()).await,
            Err(RegistryError::Conflict(_))
        );
        assert_eq!(registry.capture_script(&id).await.unwrap().as_deref(), Some("script"));
    }

    #[tokio::test]
    async fn mark_stale_only_flags_old_terminal_jobs() {
        let registry = JobRegistry::new();
        let done = registry.create(new_job(1)).await.unwrap().session_id;
        let running = registry.create(new_job(1)).await.unwrap().session_id;
        registry.fail(&done, "boom".into()).await.unwrap();
        registry
            .update_progress(&running, JobStatus::Capturing, 0, 0)
            .await
            .unwrap();

        let retention = chrono::Duration::seconds(300);
        let now = chrono::Utc::now();
        assert_eq!(registry.mark_stale(retention, now).await, 0);

        let later = now + chrono::Duration::seconds(301);
        assert_eq!(registry.mark_stale(retention, later).await, 1);
        assert!(registry.get(&done).await.unwrap().cleanup_eligible);
        assert!(!registry.get(&running).await.unwrap().cleanup_eligible);
        assert_eq!(registry.mark_stale(retention, later).await, 0);
    }

    // -----------------------------------------------------------------------
    // State-machine fuzzing
    // -----------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Op {
        Progress(JobStatus, usize),
        Complete,
        Fail,
        Cancel,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let status = prop::sample::select(JobStatus::ALL.to_vec());
        prop_oneof![
            4 => (status, 0usize..6).prop_map(|(s, p)| Op::Progress(s, p)),
            1 => Just(Op::Complete),
            1 => Just(Op::Fail),
            1 => Just(Op::Cancel),
        ]
    }

    fn rank(status: JobStatus) -> u8 {
        match status {
            JobStatus::Ready => 0,
            JobStatus::Capturing => 1,
            JobStatus::Encoding => 2,
            JobStatus::Completed | JobStatus::Failed => 3,
        }
    }

    proptest! {
        #[test]
        fn lifecycle_invariants_hold(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let registry = JobRegistry::new();
                let id = registry.create(new_job(5)).await.unwrap().session_id;
                let mut prev = registry.get(&id).await.unwrap();

                for op in ops {
                    let result = match op {
                        Op::Progress(status, p) => registry.update_progress(&id, status, p, p).await,
                        Op::Complete => registry.complete(&id, artifact(1)).await,
                        Op::Fail => registry.fail(&id, "x".into()).await,
                        Op::Cancel => registry.cancel(&id).await,
                    };
                    let now = registry.get(&id).await.unwrap();

                    if result.is_err() {
                        prop_assert_eq!(now.status, prev.status);
                        prop_assert_eq!(now.progress, prev.progress);
                    }
                    if prev.status.is_terminal() {
                        prop_assert_eq!(now.status, prev.status);
                    }
                    prop_assert!(rank(now.status) >= rank(prev.status));
                    prop_assert!(now.progress >= prev.progress);
                    prop_assert!(now.progress <= now.total_frames);
                    prev = now;
                }
                Ok(())
            })?;
        }
    }
}
