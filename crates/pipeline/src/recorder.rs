//! External recorder subprocess driver.
//!
//! The recorder is a standalone program that opens the chart page itself and
//! writes `<output>.<ext>` into its working directory. We only build its
//! command line, enforce a timeout and interpret the exit code: `0` means
//! success, anything else surfaces stderr verbatim.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use chartcast_core::job::OutputFormat;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Output container requested from the recorder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderFormat {
    #[default]
    Gif,
    Mp4,
    /// The recorder writes both; the GIF is the one we track.
    Both,
}

impl RecorderFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Mp4 => "mp4",
            Self::Both => "both",
        }
    }

    /// The artifact format this request resolves to.
    pub fn artifact_format(self) -> OutputFormat {
        match self {
            Self::Mp4 => OutputFormat::Mp4,
            Self::Gif | Self::Both => OutputFormat::Gif,
        }
    }
}

/// One recorder invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderRequest {
    pub url: String,
    /// Output basename, without extension.
    pub output: String,
    #[serde(default)]
    pub format: RecorderFormat,
    /// Total recording length in seconds.
    pub duration: u32,
    /// Recorder frames per second.
    pub fps: u32,
    #[serde(default)]
    pub x_columns: Vec<String>,
    #[serde(default)]
    pub y_columns: Vec<String>,
    pub speed: f64,
}

impl RecorderRequest {
    /// Filename the recorder produces on success.
    pub fn output_filename(&self) -> String {
        format!("{}.{}", self.output, self.format.artifact_format().extension())
    }
}

/// How to launch the recorder.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub program: String,
    /// Script passed as the first argument; `None` when `program` is the
    /// recorder itself.
    pub script: Option<PathBuf>,
    pub working_dir: PathBuf,
    pub timeout: Duration,
    pub headless: bool,
}

/// Captured output of a successful run.
#[derive(Debug, Clone)]
pub struct RecorderOutput {
    pub filename: String,
    pub path: PathBuf,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("failed to launch recorder: {0}")]
    Spawn(std::io::Error),

    #[error("recorder timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Non-zero exit; the message is the recorder's stderr.
    #[error("{stderr}")]
    Failed { exit_code: i32, stderr: String },

    #[error("recorder reported success but {0} was not written")]
    MissingOutput(String),

    #[error("I/O error while running recorder: {0}")]
    Io(std::io::Error),
}

/// Command-line arguments for `request`.
pub fn build_args(request: &RecorderRequest, headless: bool) -> Vec<String> {
    let mut args = vec![
        "--url".to_string(),
        request.url.clone(),
        "--output".to_string(),
        request.output.clone(),
        "--format".to_string(),
        request.format.as_str().to_string(),
        "--duration".to_string(),
        request.duration.to_string(),
        "--fps".to_string(),
        request.fps.to_string(),
        "--speed".to_string(),
        request.speed.to_string(),
    ];
    if headless {
        args.push("--headless".to_string());
    }
    args.push("--debug".to_string());
    if !request.x_columns.is_empty() {
        args.push("--x-columns".to_string());
        args.extend(request.x_columns.iter().cloned());
    }
    if !request.y_columns.is_empty() {
        args.push("--y-columns".to_string());
        args.extend(request.y_columns.iter().cloned());
    }
    args
}

/// Run the recorder to completion.
pub async fn run_recorder(
    config: &RecorderConfig,
    request: &RecorderRequest,
) -> Result<RecorderOutput, RecorderError> {
    let mut cmd = Command::new(&config.program);
    if let Some(script) = &config.script {
        cmd.arg(script);
    }
    cmd.args(build_args(request, config.headless))
        .current_dir(&config.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::info!(
        program = %config.program,
        output = %request.output,
        format = request.format.as_str(),
        "Starting recorder"
    );

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(RecorderError::Spawn)?;

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    // On timeout `child` is dropped and killed.
    let status = match tokio::time::timeout(config.timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return Err(RecorderError::Io(e)),
        Err(_elapsed) => {
            return Err(RecorderError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();

    if !status.success() {
        let exit_code = status.code().unwrap_or(-1);
        tracing::warn!(exit_code, duration_ms, "Recorder failed");
        let stderr = if stderr.trim().is_empty() {
            "Unknown error occurred".to_string()
        } else {
            stderr
        };
        return Err(RecorderError::Failed { exit_code, stderr });
    }

    let filename = request.output_filename();
    let path = config.working_dir.join(&filename);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(RecorderError::MissingOutput(filename));
    }

    tracing::info!(%filename, duration_ms, "Recorder finished");
    Ok(RecorderOutput {
        filename,
        path,
        stdout,
        stderr,
        duration_ms,
    })
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn request(format: RecorderFormat) -> RecorderRequest {
        RecorderRequest {
            url: "http://localhost:5173".into(),
            output: "demo".into(),
            format,
            duration: 3,
            fps: 10,
            x_columns: vec!["revenue".into(), "profit".into()],
            y_columns: vec![],
            speed: 1.5,
        }
    }

    #[test]
    fn args_follow_recorder_cli() {
        let args = build_args(&request(RecorderFormat::Mp4), true);
        assert_eq!(
            args,
            [
                "--url", "http://localhost:5173", "--output", "demo", "--format", "mp4",
                "--duration", "3", "--fps", "10", "--speed", "1.5", "--headless", "--debug",
                "--x-columns", "revenue", "profit",
            ]
        );
    }

    #[test]
    fn empty_column_lists_omit_flags() {
        let req = RecorderRequest {
            x_columns: vec![],
            y_columns: vec![],
            ..request(RecorderFormat::Gif)
        };
        let args = build_args(&req, false);
        assert_eq!(args.last().map(String::as_str), Some("--debug"));
        assert!(!args.iter().any(|a| a.ends_with("-columns")));
    }

    #[test]
    fn headless_flag_is_optional() {
        let args = build_args(&request(RecorderFormat::Gif), false);
        assert!(!args.iter().any(|a| a == "--headless"));
    }

    #[test]
    fn filename_derived_from_output_and_format() {
        assert_eq!(request(RecorderFormat::Gif).output_filename(), "demo.gif");
        assert_eq!(request(RecorderFormat::Mp4).output_filename(), "demo.mp4");
        assert_eq!(request(RecorderFormat::Both).output_filename(), "demo.gif");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig {
            program: "sh".into(),
            script: Some(dir.path().join("fail.sh")),
            working_dir: dir.path().to_path_buf(),
            timeout: Duration::from_secs(5),
            headless: true,
        };
        std::fs::write(dir.path().join("fail.sh"), "echo 'browser crashed' >&2\nexit 3\n").unwrap();
        assert_matches!(
            run_recorder(&config, &request(RecorderFormat::Gif)).await,
            Err(RecorderError::Failed { exit_code: 3, stderr }) if stderr == "browser crashed\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn success_requires_output_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.sh"), "exit 0\n").unwrap();
        let config = RecorderConfig {
            program: "sh".into(),
            script: Some(dir.path().join("ok.sh")),
            working_dir: dir.path().to_path_buf(),
            timeout: Duration::from_secs(5),
            headless: true,
        };
        assert_matches!(
            run_recorder(&config, &request(RecorderFormat::Gif)).await,
            Err(RecorderError::MissingOutput(name)) if name == "demo.gif"
        );

        std::fs::write(dir.path().join("demo.gif"), b"GIF89a").unwrap();
        let output = run_recorder(&config, &request(RecorderFormat::Gif))
            .await
            .unwrap();
        assert_eq!(output.filename, "demo.gif");
        assert_eq!(output.path, dir.path().join("demo.gif"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_recorder_times_out() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("slow.sh"), "sleep 5\n").unwrap();
        let config = RecorderConfig {
            program: "sh".into(),
            script: Some(dir.path().join("slow.sh")),
            working_dir: dir.path().to_path_buf(),
            timeout: Duration::from_millis(200),
            headless: true,
        };
        assert_matches!(
            run_recorder(&config, &request(RecorderFormat::Gif)).await,
            Err(RecorderError::Timeout { .. })
        );
    }
}
