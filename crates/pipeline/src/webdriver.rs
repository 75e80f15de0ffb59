//! W3C WebDriver client.
//!
//! Talks to a chromedriver/geckodriver-compatible endpoint over HTTP using
//! [`reqwest`]. Only the handful of commands frame capture needs are
//! implemented.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::browser::{BrowserError, BrowserSession};

/// Browser window size used for every capture session.
pub const WINDOW_SIZE: (u32, u32) = (1200, 800);

/// W3C web element reference key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Poll interval while waiting for `document.readyState`.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Every WebDriver response wraps its payload in `{"value": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct NewSessionValue {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// An open WebDriver session.
pub struct WebDriverSession {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
    closed: bool,
}

impl WebDriverSession {
    /// Start a new browser session with a fixed window size.
    pub async fn start(
        client: reqwest::Client,
        base_url: &str,
        headless: bool,
    ) -> Result<Self, BrowserError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let (width, height) = WINDOW_SIZE;
        let mut args = vec![
            format!("--window-size={width},{height}"),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
        ];
        let mut firefox_args: Vec<&str> = Vec::new();
        if headless {
            args.push("--headless=new".to_string());
            firefox_args.push("-headless");
        }
        let body = json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": { "args": args },
                    "moz:firefoxOptions": { "args": firefox_args },
                }
            }
        });

        let response = client
            .post(format!("{base_url}/session"))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let value = Self::parse_value(response).await?;
        let created: NewSessionValue = serde_json::from_value(value)
            .map_err(|e| BrowserError::Command(format!("unexpected new-session reply: {e}")))?;

        tracing::info!(session = %created.session_id, %base_url, "WebDriver session started");

        let mut session = Self {
            client,
            base_url,
            session_id: created.session_id,
            closed: false,
        };
        session
            .command(
                reqwest::Method::POST,
                "window/rect",
                Some(json!({ "width": width, "height": height })),
            )
            .await?;
        Ok(session)
    }

    /// Navigate to `url`.
    pub async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.command(reqwest::Method::POST, "url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    /// Poll until `document.readyState == "complete"` or `timeout` elapses.
    pub async fn wait_until_ready(&mut self, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state = self
                .execute("return document.readyState;", Vec::new())
                .await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout);
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn find_element(&mut self, selector: &str) -> Result<Option<String>, BrowserError> {
        let result = self
            .command(
                reqwest::Method::POST,
                "element",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await;
        match result {
            Ok(value) => value
                .get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| Some(id.to_string()))
                .ok_or_else(|| BrowserError::Command("element reference missing".into())),
            Err(BrowserError::Command(msg)) if msg.starts_with("no such element") => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ---- private helpers ----

    async fn command(
        &mut self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, BrowserError> {
        let url = format!("{}/session/{}/{path}", self.base_url, self.session_id);
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(transport)?;
        Self::parse_value(response).await
    }

    /// Unwrap `{"value": ...}`, turning W3C error payloads into
    /// [`BrowserError::Command`] with `"<error>: <message>"`.
    async fn parse_value(response: reqwest::Response) -> Result<Value, BrowserError> {
        let status = response.status();
        let envelope: Envelope = response.json().await.map_err(transport)?;
        if status.is_success() {
            return Ok(envelope.value);
        }
        let error = envelope
            .value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let message = envelope
            .value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("");
        Err(BrowserError::Command(format!("{error}: {message}")))
    }
}

fn transport(err: reqwest::Error) -> BrowserError {
    if err.is_timeout() {
        BrowserError::Timeout
    } else {
        BrowserError::Transport(err.to_string())
    }
}

/// Decode a base64 screenshot payload.
fn decode_screenshot(value: &Value) -> Result<Vec<u8>, BrowserError> {
    let encoded = value
        .as_str()
        .ok_or_else(|| BrowserError::Decode("screenshot value is not a string".into()))?;
    BASE64
        .decode(encoded)
        .map_err(|e| BrowserError::Decode(e.to_string()))
}

impl BrowserSession for WebDriverSession {
    async fn execute(&mut self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
        self.command(
            reqwest::Method::POST,
            "execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn screenshot_element(
        &mut self,
        selector: &str,
    ) -> Result<Option<Vec<u8>>, BrowserError> {
        let Some(element) = self.find_element(selector).await? else {
            return Ok(None);
        };
        let value = self
            .command(
                reqwest::Method::GET,
                &format!("element/{element}/screenshot"),
                None,
            )
            .await?;
        decode_screenshot(&value).map(Some)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        match self.client.delete(url).send().await {
            Ok(_) => tracing::debug!(session = %self.session_id, "WebDriver session closed"),
            Err(e) => tracing::warn!(session = %self.session_id, error = %e, "Failed to close WebDriver session"),
        }
    }
}
