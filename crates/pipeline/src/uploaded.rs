//! Frame source for frames captured in the user's browser.
//!
//! The generated capture script posts one entry per requested frame: a PNG
//! as plain base64 or a `data:image/...;base64,` URL, or `null` when the
//! browser could not capture that position.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chartcast_core::frame::FrameConfig;

use crate::source::{CaptureError, ConfigError, ConfigureOutcome, FrameSource, RasterImage};

/// Replays uploaded payloads by position.
pub struct UploadedFrameSource {
    payloads: Vec<Option<String>>,
    position: usize,
}

impl UploadedFrameSource {
    /// Payloads beyond the requested frame count are never read.
    pub fn new(payloads: Vec<Option<String>>) -> Self {
        Self {
            payloads,
            position: 0,
        }
    }
}

impl FrameSource for UploadedFrameSource {
    fn begin_frame(&mut self, index: usize) {
        self.position = index;
    }

    async fn configure(&mut self, _frame: &FrameConfig) -> Result<ConfigureOutcome, ConfigError> {
        Ok(ConfigureOutcome::NotApplicable)
    }

    /// PNG decoding runs on the blocking pool.
    async fn capture(&mut self) -> Result<RasterImage, CaptureError> {
        let payload = match self.payloads.get(self.position) {
            Some(Some(payload)) => payload.clone(),
            _ => {
                return Err(CaptureError::Missing {
                    index: self.position,
                })
            }
        };
        tokio::task::spawn_blocking(move || decode_frame_payload(&payload))
            .await
            .map_err(|e| CaptureError::EncodingError(format!("decode task failed: {e}")))?
    }
}

/// Strip an optional data-URL prefix and decode the base64 image.
pub fn decode_frame_payload(payload: &str) -> Result<RasterImage, CaptureError> {
    let payload = payload.trim();
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((meta, data)) if meta.ends_with(";base64") => data,
            _ => {
                return Err(CaptureError::EncodingError(
                    "data URL is not base64 encoded".into(),
                ))
            }
        },
        None => payload,
    };
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| CaptureError::EncodingError(format!("invalid base64: {e}")))?;
    image::load_from_memory(&bytes).map_err(|e| CaptureError::EncodingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::browser::tests::png_bytes;

    fn data_url(width: u32, height: u32) -> String {
        format!("data:image/png;base64,{}", BASE64.encode(png_bytes(width, height)))
    }

    #[test]
    fn decodes_data_url() {
        let img = decode_frame_payload(&data_url(5, 2)).unwrap();
        assert_eq!((img.width(), img.height()), (5, 2));
    }

    #[test]
    fn decodes_bare_base64() {
        let bare = BASE64.encode(png_bytes(3, 3));
        assert!(decode_frame_payload(&bare).is_ok());
    }

    #[test]
    fn rejects_non_base64_data_url() {
        assert_matches!(
            decode_frame_payload("data:image/svg+xml,<svg/>"),
            Err(CaptureError::EncodingError(_))
        );
    }

    #[test]
    fn rejects_non_image_bytes() {
        let payload = BASE64.encode(b"hello");
        assert_matches!(
            decode_frame_payload(&payload),
            Err(CaptureError::EncodingError(_))
        );
    }

    #[tokio::test]
    async fn captures_by_position() {
        let mut source = UploadedFrameSource::new(vec![Some(data_url(2, 2)), None]);
        assert_eq!(
            source.configure(&FrameConfig::new("a", "b")).await,
            Ok(ConfigureOutcome::NotApplicable)
        );

        source.begin_frame(0);
        assert!(source.capture().await.is_ok());

        source.begin_frame(1);
        assert_matches!(source.capture().await, Err(CaptureError::Missing { index: 1 }));

        source.begin_frame(5);
        assert_matches!(source.capture().await, Err(CaptureError::Missing { index: 5 }));
    }

    #[tokio::test]
    async fn capture_surfaces_decode_errors() {
        let mut source = UploadedFrameSource::new(vec![Some(BASE64.encode(b"not a png"))]);
        source.begin_frame(0);
        assert_matches!(source.capture().await, Err(CaptureError::EncodingError(_)));
    }
}
