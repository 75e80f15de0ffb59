use std::path::PathBuf;
use std::time::Duration;

use chartcast_pipeline::recorder::RecorderConfig;
use chartcast_pipeline::runner::{BrowserConfig, RunnerConfig};

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173,\
http://localhost:3000,http://localhost:5174,http://127.0.0.1:5174";

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Directory encoded artifacts are written to and served from.
    pub output_dir: PathBuf,
    /// Base URL the client capture script posts its frames back to.
    pub public_base_url: String,
    /// W3C WebDriver endpoint. Server-side capture is disabled when unset.
    pub webdriver_url: Option<String>,
    pub browser_headless: bool,
    /// Settle window after each configure, in milliseconds.
    pub settle_delay_ms: u64,
    /// Upper bound on a single configure or capture call.
    pub capture_call_timeout_secs: u64,
    /// Wall-clock budget of a job, measured from its creation.
    pub job_timeout_secs: u64,
    /// Extra attempts per failed frame (clamped by the sequencer).
    pub frame_retries: u8,
    /// Age after which finished jobs are flagged for cleanup.
    pub job_retention_secs: u64,
    pub recorder_program: String,
    /// `None` when `recorder_program` is the recorder itself.
    pub recorder_script: Option<PathBuf>,
    pub recorder_workdir: PathBuf,
    pub recorder_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                               |
    /// |-----------------------------|---------------------------------------|
    /// | `HOST`                      | `0.0.0.0`                             |
    /// | `PORT`                      | `8000`                                |
    /// | `CORS_ORIGINS`              | local Vite/React dev origins          |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                                  |
    /// | `OUTPUT_DIR`                | `generated_files`                     |
    /// | `PUBLIC_BASE_URL`           | `http://localhost:8000`               |
    /// | `WEBDRIVER_URL`             | unset                                 |
    /// | `BROWSER_HEADLESS`          | `true`                                |
    /// | `SETTLE_DELAY_MS`           | `800`                                 |
    /// | `CAPTURE_CALL_TIMEOUT_SECS` | `30`                                  |
    /// | `JOB_TIMEOUT_SECS`          | `600`                                 |
    /// | `FRAME_RETRIES`             | `0`                                   |
    /// | `JOB_RETENTION_SECS`        | `300`                                 |
    /// | `RECORDER_PROGRAM`          | `python3`                             |
    /// | `RECORDER_SCRIPT`           | `scripts/record_chart_animation.py`   |
    /// | `RECORDER_WORKDIR`          | `scripts`                             |
    /// | `RECORDER_TIMEOUT_SECS`     | `900`                                 |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let output_dir = PathBuf::from(
            std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "generated_files".into()),
        );

        let public_base_url =
            std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".into());

        let webdriver_url = std::env::var("WEBDRIVER_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let browser_headless: bool = std::env::var("BROWSER_HEADLESS")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("BROWSER_HEADLESS must be true or false");

        let settle_delay_ms: u64 = std::env::var("SETTLE_DELAY_MS")
            .unwrap_or_else(|_| "800".into())
            .parse()
            .expect("SETTLE_DELAY_MS must be a valid u64");

        let capture_call_timeout_secs: u64 = std::env::var("CAPTURE_CALL_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("CAPTURE_CALL_TIMEOUT_SECS must be a valid u64");

        let job_timeout_secs: u64 = std::env::var("JOB_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("JOB_TIMEOUT_SECS must be a valid u64");

        let frame_retries: u8 = std::env::var("FRAME_RETRIES")
            .unwrap_or_else(|_| "0".into())
            .parse()
            .expect("FRAME_RETRIES must be a valid u8");

        let job_retention_secs: u64 = std::env::var("JOB_RETENTION_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("JOB_RETENTION_SECS must be a valid u64");

        let recorder_program =
            std::env::var("RECORDER_PROGRAM").unwrap_or_else(|_| "python3".into());

        let recorder_script = std::env::var("RECORDER_SCRIPT")
            .unwrap_or_else(|_| "scripts/record_chart_animation.py".into());
        // The recorder runs inside its working directory, so pin the script
        // path to where the server was started.
        let recorder_script = (!recorder_script.trim().is_empty()).then(|| {
            let path = PathBuf::from(recorder_script);
            std::env::current_dir()
                .map(|cwd| cwd.join(&path))
                .unwrap_or(path)
        });

        let recorder_workdir =
            PathBuf::from(std::env::var("RECORDER_WORKDIR").unwrap_or_else(|_| "scripts".into()));

        let recorder_timeout_secs: u64 = std::env::var("RECORDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "900".into())
            .parse()
            .expect("RECORDER_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            output_dir,
            public_base_url,
            webdriver_url,
            browser_headless,
            settle_delay_ms,
            capture_call_timeout_secs,
            job_timeout_secs,
            frame_retries,
            job_retention_secs,
            recorder_program,
            recorder_script,
            recorder_workdir,
            recorder_timeout_secs,
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            output_dir: self.output_dir.clone(),
            retries: self.frame_retries,
            call_timeout: Duration::from_secs(self.capture_call_timeout_secs),
            job_timeout: Duration::from_secs(self.job_timeout_secs),
        }
    }

    /// Browser settings for server-side capture, if a WebDriver endpoint is configured.
    pub fn browser_config(&self) -> Option<BrowserConfig> {
        let webdriver_url = self.webdriver_url.clone()?;
        Some(BrowserConfig {
            webdriver_url,
            headless: self.browser_headless,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            page_load_timeout: Duration::from_secs(self.capture_call_timeout_secs),
        })
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            program: self.recorder_program.clone(),
            script: self.recorder_script.clone(),
            working_dir: self.recorder_workdir.clone(),
            timeout: Duration::from_secs(self.recorder_timeout_secs),
            headless: self.browser_headless,
        }
    }
}
