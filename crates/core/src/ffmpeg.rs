//! FFmpeg/FFprobe command helpers.
//!
//! MP4 artifacts are produced by piping raw RGBA frames into `ffmpeg`; the
//! argument list is built here so it can be checked without spawning
//! anything. `ffprobe` is used to count frames in recorder output.

use std::path::Path;

use serde::Deserialize;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("video file not found: {0}")]
    VideoNotFound(String),
}

/// Input geometry and timing for a raw-frame MP4 encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawVideoInput {
    pub width: u32,
    pub height: u32,
    /// Frame rate as `num/den`.
    pub fps: (u32, u32),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    /// e.g. "2/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    pub duration: Option<String>,
    pub nb_frames: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Command construction
// ---------------------------------------------------------------------------

/// Arguments for encoding raw RGBA frames from stdin into an H.264 MP4.
///
/// Odd dimensions are padded up to the next even number since `yuv420p`
/// requires them.
pub fn mp4_encode_args(input: RawVideoInput, output: &Path) -> Vec<String> {
    let (num, den) = input.fps;
    let mut args: Vec<String> = [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(format!("{}x{}", input.width, input.height));
    args.push("-r".into());
    args.push(format!("{num}/{den}"));
    args.extend(
        [
            "-i",
            "-",
            "-an",
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(output.to_string_lossy().into_owned());
    args
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Video duration in seconds, preferring the container-level value.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    probe
        .format
        .duration
        .as_deref()
        .or_else(|| first_video_stream(probe).and_then(|s| s.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Frame rate of the first video stream.
pub fn parse_framerate(probe: &FfprobeOutput) -> f64 {
    first_video_stream(probe)
        .and_then(|s| s.r_frame_rate.as_deref())
        .map(parse_fraction)
        .unwrap_or(0.0)
}

/// Parse a fraction string like `"30/1"` into a float.
pub fn parse_fraction(s: &str) -> f64 {
    match s.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().unwrap_or(0.0);
            let den = den.parse::<f64>().unwrap_or(1.0);
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        }
        None => s.parse::<f64>().unwrap_or(0.0),
    }
}

/// Total frame count, from `nb_frames` or estimated as duration * fps.
pub fn parse_total_frames(probe: &FfprobeOutput) -> u64 {
    if let Some(n) = first_video_stream(probe)
        .and_then(|s| s.nb_frames.as_deref())
        .and_then(|nb| nb.parse::<u64>().ok())
    {
        return n;
    }
    let duration = parse_duration(probe);
    let fps = parse_framerate(probe);
    if duration > 0.0 && fps > 0.0 {
        return (duration * fps).round() as u64;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(r_frame_rate: &str, nb_frames: Option<&str>, duration: Option<&str>) -> FfprobeOutput {
        FfprobeOutput {
            streams: vec![FfprobeStream {
                codec_type: Some("video".into()),
                r_frame_rate: Some(r_frame_rate.into()),
                duration: None,
                nb_frames: nb_frames.map(Into::into),
            }],
            format: FfprobeFormat {
                duration: duration.map(Into::into),
            },
        }
    }

    #[test]
    fn test_parse_fraction_standard() {
        assert!((parse_fraction("30/1") - 30.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_fraction_millisecond_rate() {
        assert!((parse_fraction("1000/500") - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_fraction_plain_number() {
        assert!((parse_fraction("25") - 25.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_fraction_zero_denominator() {
        assert!((parse_fraction("30/0") - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_total_frames_from_nb_frames() {
        assert_eq!(parse_total_frames(&video("2/1", Some("12"), Some("6.0"))), 12);
    }

    #[test]
    fn test_parse_total_frames_estimated() {
        assert_eq!(parse_total_frames(&video("2/1", None, Some("4.0"))), 8);
    }

    #[test]
    fn test_parse_total_frames_unknown() {
        assert_eq!(parse_total_frames(&video("0/0", None, None)), 0);
    }

    #[test]
    fn test_parse_probe_json() {
        let json = r#"{
            "streams": [{"index": 0, "codec_type": "video", "width": 640,
                         "height": 480, "r_frame_rate": "2/1", "nb_frames": "5"}],
            "format": {"duration": "2.5", "size": "1234"}
        }"#;
        let probe: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parse_total_frames(&probe), 5);
        assert!((parse_duration(&probe) - 2.5).abs() < 0.001);
    }

    #[test]
    fn test_mp4_args_carry_geometry_and_rate() {
        let args = mp4_encode_args(
            RawVideoInput {
                width: 641,
                height: 480,
                fps: (1000, 250),
            },
            Path::new("/tmp/out.mp4"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-s 641x480"));
        assert!(joined.contains("-r 1000/250"));
        assert!(joined.contains("-i -"));
        assert!(joined.contains("yuv420p"));
        assert!(joined.contains("+faststart"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    }
}
