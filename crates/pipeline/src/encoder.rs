//! Animation encoder.
//!
//! GIFs are encoded in-process with the `image` crate. MP4s are produced by
//! piping raw RGBA frames into the system `ffmpeg`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::process::Stdio;

use chartcast_core::ffmpeg::{self, RawVideoInput};
use chartcast_core::job::{AnimationArtifact, EncoderSettings, OutputFormat};
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::imageops::FilterType;
use image::{AnimationDecoder, Delay, Frame, RgbaImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::sequencer::CapturedFrame;

/// Background used when an MP4 frame carries transparency.
const MP4_BACKGROUND: [u8; 3] = [255, 255, 255];

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("no frames to encode")]
    EmptyInput,

    #[error("frame {index} is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("failed to write animation: {0}")]
    WriteFailed(String),

    #[error("failed to read artifact: {0}")]
    Unreadable(String),
}

/// Encode `frames` in order into `out_path` using `settings.format`.
///
/// Artifacts are write-once: an existing `out_path` is never replaced.
pub async fn encode(
    frames: Vec<CapturedFrame>,
    settings: &EncoderSettings,
    out_path: &Path,
) -> Result<AnimationArtifact, EncodeError> {
    if frames.is_empty() {
        return Err(EncodeError::EmptyInput);
    }
    let frame_count = frames.len();

    if settings.format == OutputFormat::Mp4 {
        check_uniform_dimensions(&frames)?;
    }

    if let Some(parent) = out_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| EncodeError::WriteFailed(format!("{}: {e}", parent.display())))?;
    }

    let file = reserve_output(out_path).await?;
    let written = match settings.format {
        OutputFormat::Gif => {
            let file = file.into_std().await;
            let delay_ms = settings.frame_delay_ms.max(1);
            tokio::task::spawn_blocking(move || write_gif(frames, delay_ms, file))
                .await
                .map_err(|e| EncodeError::WriteFailed(format!("encoder task failed: {e}")))
                .and_then(|r| r)
        }
        OutputFormat::Mp4 => {
            // ffmpeg overwrites the empty placeholder we just created.
            drop(file);
            write_mp4(frames, settings, out_path).await
        }
    };
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(out_path).await;
        return Err(e);
    }

    let byte_size = tokio::fs::metadata(out_path)
        .await
        .map_err(|e| EncodeError::WriteFailed(e.to_string()))?
        .len();

    tracing::info!(
        path = %out_path.display(),
        frames = frame_count,
        bytes = byte_size,
        format = settings.format.extension(),
        "Animation encoded"
    );

    Ok(artifact(out_path, settings.format, frame_count, byte_size))
}

/// Create `path` for writing, failing if anything is already there.
pub async fn reserve_output(path: &Path) -> Result<tokio::fs::File, EncodeError> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => EncodeError::AlreadyExists(file_name(path)),
            _ => EncodeError::WriteFailed(format!("{}: {e}", path.display())),
        })
}

/// Frame count and size of an artifact written by another process.
pub async fn inspect_artifact(
    path: &Path,
    format: OutputFormat,
) -> Result<AnimationArtifact, EncodeError> {
    let byte_size = tokio::fs::metadata(path)
        .await
        .map_err(|e| EncodeError::Unreadable(format!("{}: {e}", path.display())))?
        .len();

    let frame_count = match format {
        OutputFormat::Gif => {
            let owned = path.to_path_buf();
            tokio::task::spawn_blocking(move || count_gif_frames(&owned))
                .await
                .map_err(|e| EncodeError::Unreadable(format!("inspect task failed: {e}")))??
        }
        OutputFormat::Mp4 => {
            let probe = ffmpeg::probe_video(path)
                .await
                .map_err(|e| EncodeError::Unreadable(e.to_string()))?;
            ffmpeg::parse_total_frames(&probe) as usize
        }
    };

    Ok(artifact(path, format, frame_count, byte_size))
}

fn artifact(
    path: &Path,
    format: OutputFormat,
    frame_count: usize,
    byte_size: u64,
) -> AnimationArtifact {
    AnimationArtifact {
        filename: file_name(path),
        path: path.to_string_lossy().into_owned(),
        byte_size,
        frame_count,
        format,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn check_uniform_dimensions(frames: &[CapturedFrame]) -> Result<(), EncodeError> {
    let expected = (frames[0].image.width(), frames[0].image.height());
    for frame in &frames[1..] {
        let actual = (frame.image.width(), frame.image.height());
        if actual != expected {
            return Err(EncodeError::DimensionMismatch {
                index: frame.index,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GIF
// ---------------------------------------------------------------------------

/// Bring every frame to one colour model and the first frame's size.
///
/// If any frame has an alpha channel all frames keep theirs; otherwise each
/// frame is flattened to opaque RGB before conversion.
fn normalize_frames(frames: Vec<CapturedFrame>) -> Vec<RgbaImage> {
    let keep_alpha = frames.iter().any(|f| f.image.color().has_alpha());
    let (width, height) = (frames[0].image.width(), frames[0].image.height());

    frames
        .into_iter()
        .map(|frame| {
            let rgba = if keep_alpha {
                frame.image.to_rgba8()
            } else {
                image::DynamicImage::ImageRgb8(frame.image.to_rgb8()).to_rgba8()
            };
            if rgba.dimensions() == (width, height) {
                rgba
            } else {
                tracing::debug!(
                    index = frame.index,
                    from = ?rgba.dimensions(),
                    to = ?(width, height),
                    "Resizing frame to first frame's canvas"
                );
                image::imageops::resize(&rgba, width, height, FilterType::Triangle)
            }
        })
        .collect()
}

fn write_gif(frames: Vec<CapturedFrame>, delay_ms: u32, file: File) -> Result<(), EncodeError> {
    let images = normalize_frames(frames);
    let mut encoder = GifEncoder::new(BufWriter::new(file));
    encoder
        .set_repeat(Repeat::Infinite)
        .map_err(|e| EncodeError::WriteFailed(e.to_string()))?;

    let delay = Delay::from_numer_denom_ms(delay_ms, 1);
    encoder
        .encode_frames(
            images
                .into_iter()
                .map(|img| Frame::from_parts(img, 0, 0, delay)),
        )
        .map_err(|e| EncodeError::WriteFailed(e.to_string()))
}

fn count_gif_frames(path: &Path) -> Result<usize, EncodeError> {
    let file = File::open(path).map_err(|e| EncodeError::Unreadable(e.to_string()))?;
    let decoder =
        GifDecoder::new(BufReader::new(file)).map_err(|e| EncodeError::Unreadable(e.to_string()))?;
    decoder.into_frames().try_fold(0usize, |count, frame| {
        frame
            .map(|_| count + 1)
            .map_err(|e| EncodeError::Unreadable(e.to_string()))
    })
}

// ---------------------------------------------------------------------------
// MP4
// ---------------------------------------------------------------------------

/// Flatten onto an opaque background; the video has no alpha plane.
fn opaque_rgba_bytes(frame: &CapturedFrame) -> Vec<u8> {
    let mut rgba = frame.image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let alpha = u32::from(pixel[3]);
        if alpha == 255 {
            continue;
        }
        for c in 0..3 {
            let fg = u32::from(pixel[c]);
            let bg = u32::from(MP4_BACKGROUND[c]);
            pixel[c] = ((fg * alpha + bg * (255 - alpha) + 127) / 255) as u8;
        }
        pixel[3] = 255;
    }
    rgba.into_raw()
}

async fn write_mp4(
    frames: Vec<CapturedFrame>,
    settings: &EncoderSettings,
    out_path: &Path,
) -> Result<(), EncodeError> {
    let input = RawVideoInput {
        width: frames[0].image.width(),
        height: frames[0].image.height(),
        fps: settings.frame_rate(),
    };

    let mut child = tokio::process::Command::new("ffmpeg")
        .args(ffmpeg::mp4_encode_args(input, out_path))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| EncodeError::WriteFailed(format!("failed to spawn ffmpeg: {e}")))?;

    let mut stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(s) = stderr.as_mut() {
            let _ = s.read_to_end(&mut buf).await;
        }
        buf
    });

    if let Some(mut stdin) = child.stdin.take() {
        for frame in &frames {
            if let Err(e) = stdin.write_all(&opaque_rgba_bytes(frame)).await {
                tracing::warn!(index = frame.index, error = %e, "ffmpeg closed its input early");
                break;
            }
        }
        drop(stdin);
    }

    let status = child
        .wait()
        .await
        .map_err(|e| EncodeError::WriteFailed(format!("ffmpeg did not finish: {e}")))?;
    let stderr = stderr_task.await.unwrap_or_default();

    if !status.success() {
        return Err(EncodeError::WriteFailed(format!(
            "ffmpeg exited with {:?}: {}",
            status.code(),
            String::from_utf8_lossy(&stderr).trim()
        )));
    }
    Ok(())
}
