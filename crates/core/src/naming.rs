//! Session identifiers and artifact filenames.
//!
//! Session IDs look like `recording-20250101_120000-1a2b3c4d`; artifact
//! filenames are forced to a safe basename carrying the job's format
//! extension.

use crate::error::CoreError;
use crate::job::OutputFormat;
use crate::types::{SessionId, Timestamp};

/// Prefix shared by all generated session identifiers.
pub const SESSION_PREFIX: &str = "recording";

/// Prefix for filenames generated when the client does not supply one.
pub const DEFAULT_FILENAME_PREFIX: &str = "chart_animation";

/// Generate a fresh session identifier stamped with `now`.
pub fn new_session_id(now: Timestamp) -> SessionId {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{SESSION_PREFIX}-{}-{}",
        now.format("%Y%m%d_%H%M%S"),
        &random[..8]
    )
}

/// Resolve the artifact filename for a job.
///
/// A missing name becomes `chart_animation_{session_id}`; the extension is
/// forced to match `format`.
pub fn artifact_filename(
    requested: Option<&str>,
    session_id: &str,
    format: OutputFormat,
) -> Result<String, CoreError> {
    let base = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => {
            validate_filename(name)?;
            strip_known_extension(name).to_string()
        }
        None => format!("{DEFAULT_FILENAME_PREFIX}_{session_id}"),
    };
    Ok(format!("{base}.{}", format.extension()))
}

/// Reject names that could escape the output directory.
pub fn validate_filename(name: &str) -> Result<(), CoreError> {
    let bad = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
        || name.chars().any(char::is_control);
    if bad {
        return Err(CoreError::Validation(format!("Invalid filename '{name}'")));
    }
    Ok(())
}

fn strip_known_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if OutputFormat::from_filename(&format!("x.{ext}")).is_some() => stem,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn session_id_shape() {
        let now = chrono::Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let id = new_session_id(now);
        assert!(id.starts_with("recording-20250304_050607-"), "{id}");
        assert_eq!(id.len(), "recording-20250304_050607-".len() + 8);
    }

    #[test]
    fn session_ids_are_unique() {
        let now = chrono::Utc::now();
        assert_ne!(new_session_id(now), new_session_id(now));
    }

    #[test]
    fn default_filename_uses_session() {
        let name = artifact_filename(None, "recording-x", OutputFormat::Gif).unwrap();
        assert_eq!(name, "chart_animation_recording-x.gif");
    }

    #[test]
    fn extension_forced_to_format() {
        assert_eq!(
            artifact_filename(Some("demo"), "s", OutputFormat::Gif).unwrap(),
            "demo.gif"
        );
        assert_eq!(
            artifact_filename(Some("demo.gif"), "s", OutputFormat::Mp4).unwrap(),
            "demo.mp4"
        );
        assert_eq!(
            artifact_filename(Some("v1.2"), "s", OutputFormat::Gif).unwrap(),
            "v1.2.gif"
        );
    }

    #[test]
    fn blank_name_falls_back_to_default() {
        let name = artifact_filename(Some("   "), "s", OutputFormat::Mp4).unwrap();
        assert_eq!(name, "chart_animation_s.mp4");
    }

    #[test]
    fn traversal_rejected() {
        assert_matches!(validate_filename("../etc/passwd"), Err(CoreError::Validation(_)));
        assert_matches!(validate_filename("a/b.gif"), Err(CoreError::Validation(_)));
        assert_matches!(validate_filename(".hidden"), Err(CoreError::Validation(_)));
        assert!(validate_filename("chart.gif").is_ok());
    }
}
