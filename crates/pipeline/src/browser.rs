//! Frame source backed by a scriptable browser session.
//!
//! [`ScriptedFrameSource`] only needs two things from a browser: run a
//! script in the page and screenshot an element. Anything implementing
//! [`BrowserSession`] (the WebDriver client, or a fake in tests) can drive it.

use std::future::Future;
use std::time::Duration;

use chartcast_core::capture_script::CHART_SELECTORS;
use chartcast_core::frame::FrameConfig;
use serde_json::Value;

use crate::source::{
    CaptureError, ConfigError, ConfigureOutcome, ConfigureStrategy, FrameSource, RasterImage,
};

/// Errors reported by a browser session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrowserError {
    /// The browser or driver could not be reached.
    #[error("browser transport error: {0}")]
    Transport(String),

    #[error("browser call timed out")]
    Timeout,

    /// The browser answered, but the command failed (script exception,
    /// stale element, ...).
    #[error("browser command failed: {0}")]
    Command(String),

    /// Screenshot data was not valid base64.
    #[error("invalid screenshot payload: {0}")]
    Decode(String),
}

/// Minimal browser control surface.
pub trait BrowserSession: Send {
    /// Run `script` synchronously in the page with `args` bound to `arguments`.
    fn execute(
        &mut self,
        script: &str,
        args: Vec<Value>,
    ) -> impl Future<Output = Result<Value, BrowserError>> + Send;

    /// PNG bytes of the first element matching `selector`, or `None` if no
    /// element matches.
    fn screenshot_element(
        &mut self,
        selector: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, BrowserError>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

const UPDATE_HOOK_SCRIPT: &str = r#"
if (typeof window.updateChartConfig === 'function') {
  window.updateChartConfig(arguments[0]);
  return true;
}
return false;
"#;

const DOM_EVENT_SCRIPT: &str = r#"
const event = new CustomEvent('chartConfigUpdate', { detail: arguments[0], cancelable: true });
document.dispatchEvent(event);
return event.defaultPrevented;
"#;

const FORM_CONTROLS_SCRIPT: &str = r#"
const frame = arguments[0];
let touched = false;
for (const [axis, value] of [['x', frame.x_column], ['y', frame.y_column]]) {
  const select = document.querySelector(`select[name*="${axis}"], select[id*="${axis}"]`);
  if (select && value) {
    select.value = value;
    select.dispatchEvent(new Event('change', { bubbles: true }));
    touched = true;
  }
}
return touched;
"#;

fn strategy_script(strategy: ConfigureStrategy) -> &'static str {
    match strategy {
        ConfigureStrategy::UpdateHook => UPDATE_HOOK_SCRIPT,
        ConfigureStrategy::DomEvent => DOM_EVENT_SCRIPT,
        ConfigureStrategy::FormControls => FORM_CONTROLS_SCRIPT,
    }
}

/// Drives a [`BrowserSession`] through the configure fallback chain and
/// element screenshots.
pub struct ScriptedFrameSource<S> {
    session: S,
    settle_delay: Duration,
}

impl<S: BrowserSession> ScriptedFrameSource<S> {
    pub fn new(session: S, settle_delay: Duration) -> Self {
        Self {
            session,
            settle_delay,
        }
    }

    #[cfg(test)]
    pub(crate) fn into_session(self) -> S {
        self.session
    }
}

impl<S: BrowserSession> FrameSource for ScriptedFrameSource<S> {
    async fn configure(&mut self, frame: &FrameConfig) -> Result<ConfigureOutcome, ConfigError> {
        let payload = serde_json::to_value(frame)
            .map_err(|e| ConfigError::Transport(format!("unserialisable frame: {e}")))?;

        let mut outcome = ConfigureOutcome::Unacknowledged;
        for strategy in ConfigureStrategy::ORDER {
            match self
                .session
                .execute(strategy_script(strategy), vec![payload.clone()])
                .await
            {
                Ok(Value::Bool(true)) => {
                    outcome = ConfigureOutcome::Applied(strategy);
                    break;
                }
                Ok(_) => {}
                Err(BrowserError::Transport(msg)) => return Err(ConfigError::Transport(msg)),
                Err(BrowserError::Timeout) => return Err(ConfigError::Timeout),
                Err(e) => {
                    tracing::debug!(strategy = strategy.as_str(), error = %e, "Configure strategy failed");
                }
            }
        }

        tokio::time::sleep(self.settle_delay).await;
        Ok(outcome)
    }

    async fn capture(&mut self) -> Result<RasterImage, CaptureError> {
        for selector in CHART_SELECTORS {
            let bytes = match self.session.screenshot_element(selector).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(BrowserError::Transport(msg)) => return Err(CaptureError::Transport(msg)),
                Err(BrowserError::Timeout) => return Err(CaptureError::Timeout),
                Err(BrowserError::Decode(msg)) => return Err(CaptureError::EncodingError(msg)),
                Err(BrowserError::Command(msg)) => {
                    tracing::debug!(selector, error = %msg, "Element screenshot failed");
                    continue;
                }
            };
            return image::load_from_memory(&bytes)
                .map_err(|e| CaptureError::EncodingError(e.to_string()));
        }
        Err(CaptureError::ElementNotFound)
    }

    async fn finish(&mut self) {
        self.session.close().await;
    }
}
