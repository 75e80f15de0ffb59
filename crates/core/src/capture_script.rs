//! Browser-side capture script for client-driven jobs.
//!
//! The generated script runs inside the user's own browser tab. It applies
//! each frame configuration, waits for the chart to settle, rasterises the
//! chart container with `html2canvas` and posts the ordered frames back to
//! the session's frame upload endpoint. A frame that fails to capture is
//! posted as `null` so positions stay aligned with the requested sequence.

use serde::Serialize;

use crate::frame::FrameConfig;

/// Chart container selectors, tried in order.
pub const CHART_SELECTORS: [&str; 4] = [
    ".recharts-wrapper",
    "[data-testid=\"chart-container\"]",
    ".chart-container",
    ".recharts-responsive-container",
];

/// Parameters baked into a generated script.
#[derive(Debug, Clone)]
pub struct CaptureScriptParams<'a> {
    pub session_id: &'a str,
    pub frames: &'a [FrameConfig],
    pub frame_delay_ms: u32,
    pub settle_delay_ms: u64,
    /// Absolute URL the frames are posted to.
    pub upload_url: String,
}

#[derive(Serialize)]
struct ScriptConfig<'a> {
    session_id: &'a str,
    frames: &'a [FrameConfig],
    frame_delay_ms: u32,
    settle_delay_ms: u64,
    upload_url: &'a str,
    selectors: [&'static str; 4],
}

const TEMPLATE: &str = r#"
// chartcast capture script (generated)
window.captureFrames = async function () {
  const config = __CONFIG__;
  const frames = [];

  let html2canvas = window.html2canvas;
  if (!html2canvas) {
    const module = await import('html2canvas');
    html2canvas = module.default || module;
  }

  const findChart = () => {
    for (const selector of config.selectors) {
      const el = document.querySelector(selector);
      if (el) return el;
    }
    return null;
  };

  const applyFrame = (frame) => {
    if (typeof window.updateChartConfig === 'function') {
      window.updateChartConfig(frame);
      return 'update_hook';
    }
    const event = new CustomEvent('chartConfigUpdate', { detail: frame, cancelable: true });
    document.dispatchEvent(event);
    if (event.defaultPrevented) return 'dom_event';
    let touched = false;
    for (const [axis, value] of [['x', frame.x_column], ['y', frame.y_column]]) {
      const select = document.querySelector(`select[name*="${axis}"], select[id*="${axis}"]`);
      if (select && value) {
        select.value = value;
        select.dispatchEvent(new Event('change', { bubbles: true }));
        touched = true;
      }
    }
    return touched ? 'form_controls' : 'unacknowledged';
  };

  const sleep = (ms) => new Promise((resolve) => setTimeout(resolve, ms));

  for (let i = 0; i < config.frames.length; i++) {
    try {
      const outcome = applyFrame(config.frames[i]);
      console.debug(`chartcast frame ${i + 1}/${config.frames.length}: ${outcome}`);
      await sleep(config.settle_delay_ms);
      const chart = findChart();
      if (!chart) throw new Error('Chart container not found');
      const canvas = await html2canvas(chart, {
        backgroundColor: '#ffffff',
        scale: 1,
        useCORS: true,
        logging: false,
        width: chart.offsetWidth,
        height: chart.offsetHeight,
      });
      frames.push(canvas.toDataURL('image/png'));
    } catch (error) {
      console.error(`chartcast frame ${i + 1} failed:`, error);
      frames.push(null);
    }
  }

  const response = await fetch(config.upload_url, {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify({ frames }),
  });
  if (!response.ok) throw new Error(`Frame upload failed: ${response.status}`);
  return response.json();
};
console.log('chartcast capture script loaded; call window.captureFrames() to start.');
"#;

/// Render the capture script for one session.
pub fn generate(params: &CaptureScriptParams<'_>) -> Result<String, serde_json::Error> {
    let config = ScriptConfig {
        session_id: params.session_id,
        frames: params.frames,
        frame_delay_ms: params.frame_delay_ms,
        settle_delay_ms: params.settle_delay_ms,
        upload_url: &params.upload_url,
        selectors: CHART_SELECTORS,
    };
    let json = serde_json::to_string(&config)?;
    Ok(TEMPLATE.replace("__CONFIG__", &json))
}

/// Build the absolute frame upload URL for a session.
pub fn upload_url(public_base_url: &str, session_id: &str) -> String {
    format!(
        "{}/api/v1/animations/{session_id}/frames",
        public_base_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(frames: &[FrameConfig]) -> String {
        generate(&CaptureScriptParams {
            session_id: "recording-1",
            frames,
            frame_delay_ms: 250,
            settle_delay_ms: 800,
            upload_url: upload_url("http://localhost:8000/", "recording-1"),
        })
        .unwrap()
    }

    #[test]
    fn embeds_frames_and_upload_url() {
        let script = render(&[FrameConfig::new("revenue", "profit")]);
        assert!(script.contains("\"x_column\":\"revenue\""));
        assert!(script.contains("http://localhost:8000/api/v1/animations/recording-1/frames"));
        assert!(script.contains("\"settle_delay_ms\":800"));
        assert!(!script.contains("__CONFIG__"));
    }

    #[test]
    fn quotes_in_column_names_stay_escaped() {
        let script = render(&[FrameConfig::new("a\"b", "c")]);
        assert!(script.contains(r#""x_column":"a\"b""#));
    }

    #[test]
    fn defines_entry_point() {
        let script = render(&[FrameConfig::new("a", "b")]);
        assert!(script.contains("window.captureFrames"));
        assert!(script.contains(".recharts-wrapper"));
    }
}
