//! The frame source abstraction.
//!
//! A [`FrameSource`] can put a chart into the state described by a
//! [`FrameConfig`] and then rasterise it. The sequencer drives any source the
//! same way, whether it is a server-controlled browser or a set of frames
//! uploaded by the user's own browser.

use std::future::Future;

use chartcast_core::frame::FrameConfig;

/// A captured raster frame.
pub type RasterImage = image::DynamicImage;

/// Ways of pushing a configuration into the chart page, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureStrategy {
    /// Call the page's `window.updateChartConfig` hook directly.
    UpdateHook,
    /// Dispatch a `chartConfigUpdate` custom event; the page acknowledges by
    /// calling `preventDefault()`.
    DomEvent,
    /// Set the x/y `<select>` controls and fire `change` events.
    FormControls,
}

impl ConfigureStrategy {
    /// Strategies are tried in this order; the first acknowledged one wins.
    pub const ORDER: [ConfigureStrategy; 3] =
        [Self::UpdateHook, Self::DomEvent, Self::FormControls];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpdateHook => "update_hook",
            Self::DomEvent => "dom_event",
            Self::FormControls => "form_controls",
        }
    }
}

/// Result of a configure call that reached the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// A strategy acknowledged the new configuration.
    Applied(ConfigureStrategy),
    /// The surface was reachable but nothing acknowledged the update. The
    /// frame is still captured as-is.
    Unacknowledged,
    /// The source has nothing to configure (frames were produced elsewhere).
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("chart surface unreachable: {0}")]
    Transport(String),

    #[error("configure call timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("chart element not found")]
    ElementNotFound,

    #[error("frame could not be decoded: {0}")]
    EncodingError(String),

    #[error("no frame was supplied for position {index}")]
    Missing { index: usize },

    #[error("chart surface unreachable: {0}")]
    Transport(String),

    #[error("capture call timed out")]
    Timeout,
}

/// Something that can render a chart configuration and snapshot it.
pub trait FrameSource: Send {
    /// Called once per attempt before `configure`, with the 0-based position
    /// in the requested sequence.
    fn begin_frame(&mut self, _index: usize) {}

    fn configure(
        &mut self,
        frame: &FrameConfig,
    ) -> impl Future<Output = Result<ConfigureOutcome, ConfigError>> + Send;

    fn capture(&mut self) -> impl Future<Output = Result<RasterImage, CaptureError>> + Send;

    /// Release any resources held by the source. Called once after the last
    /// frame, whatever the outcome.
    fn finish(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_order_is_hook_then_event_then_controls() {
        assert_eq!(
            ConfigureStrategy::ORDER,
            [
                ConfigureStrategy::UpdateHook,
                ConfigureStrategy::DomEvent,
                ConfigureStrategy::FormControls,
            ]
        );
    }

    #[test]
    fn missing_error_names_position() {
        let err = CaptureError::Missing { index: 3 };
        assert_eq!(err.to_string(), "no frame was supplied for position 3");
    }
}
