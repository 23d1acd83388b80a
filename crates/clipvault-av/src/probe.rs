//! Media metadata probing via ffprobe.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format
//! -show_streams` and maps the JSON output into [`MediaInfo`]. Duration
//! comes from the container format section and is mandatory; the
//! stream-level fields (resolution, frame rate, codec) are taken from the
//! first video stream and are absent for audio-only files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use clipvault_core::{Error, Result};

use crate::command::ToolCommand;

/// Hard wall-clock bound for a single ffprobe invocation.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata extracted from a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Container-level duration in seconds.
    pub duration: f64,
    /// Width of the first video stream, if any.
    pub width: Option<u32>,
    /// Height of the first video stream, if any.
    pub height: Option<u32>,
    /// Frame rate of the first video stream, if any.
    pub fps: Option<f64>,
    /// Codec name of the first video stream, if any.
    pub codec: Option<String>,
}

/// Interface for probing media files.
///
/// The trait seam lets the archive layer run against a stub in tests
/// instead of a real ffprobe binary.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Probe a media file for duration and video stream metadata.
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    /// Path to the ffprobe binary.
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }
}

#[async_trait]
impl Probe for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());
        cmd.timeout(PROBE_TIMEOUT);

        let output = cmd.execute().await.map_err(|e| match e {
            Error::Tool { message, .. } => Error::Probe(message),
            other => other,
        })?;

        parse_probe_output(&output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse raw ffprobe JSON into [`MediaInfo`].
///
/// Fails when the JSON is malformed or the format section carries no
/// parsable duration. A file without a video stream is valid: the
/// stream-level fields are all `None`.
pub fn parse_probe_output(raw: &str) -> Result<MediaInfo> {
    let ff: FfprobeOutput = serde_json::from_str(raw)
        .map_err(|e| Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let duration = ff
        .format
        .duration
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| Error::Probe("container reports no duration".into()))?;

    let video = ff
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    let fps = match video.and_then(|s| s.r_frame_rate.as_deref()) {
        Some(rate) => Some(parse_frame_rate(rate)?),
        None => None,
    };

    Ok(MediaInfo {
        duration,
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
        fps,
        codec: video.and_then(|s| s.codec_name.clone()),
    })
}

/// Evaluate a frame-rate expression ("30000/1001" or a plain number).
///
/// A zero or malformed denominator is an error, never a silent
/// infinity/NaN.
pub fn parse_frame_rate(rate_str: &str) -> Result<f64> {
    if let Some((num_str, den_str)) = rate_str.split_once('/') {
        let num: f64 = num_str
            .parse()
            .map_err(|_| Error::Probe(format!("malformed frame rate '{rate_str}'")))?;
        let den: f64 = den_str
            .parse()
            .map_err(|_| Error::Probe(format!("malformed frame rate '{rate_str}'")))?;
        if den == 0.0 {
            return Err(Error::Probe(format!(
                "frame rate '{rate_str}' has zero denominator"
            )));
        }
        return Ok(num / den);
    }

    rate_str
        .parse()
        .map_err(|_| Error::Probe(format!("malformed frame rate '{rate_str}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_OUTPUT: &str = r#"{
        "format": {"duration": "120.500000"},
        "streams": [
            {"codec_type": "audio", "codec_name": "aac"},
            {"codec_type": "video", "codec_name": "h264",
             "width": 1920, "height": 1080, "r_frame_rate": "30000/1001"}
        ]
    }"#;

    #[test]
    fn parse_full_output() {
        let info = parse_probe_output(FULL_OUTPUT).unwrap();
        assert!((info.duration - 120.5).abs() < 1e-9);
        assert_eq!(info.width, Some(1920));
        assert_eq!(info.height, Some(1080));
        assert_eq!(info.codec.as_deref(), Some("h264"));
        assert!((info.fps.unwrap() - 29.97).abs() < 0.01);
    }

    #[test]
    fn audio_only_has_null_video_fields() {
        let raw = r#"{
            "format": {"duration": "12.0"},
            "streams": [{"codec_type": "audio", "codec_name": "mp3"}]
        }"#;
        let info = parse_probe_output(raw).unwrap();
        assert_eq!(info.duration, 12.0);
        assert_eq!(info.width, None);
        assert_eq!(info.height, None);
        assert_eq!(info.fps, None);
        assert_eq!(info.codec, None);
    }

    #[test]
    fn missing_duration_is_error() {
        let raw = r#"{"format": {}, "streams": []}"#;
        let err = parse_probe_output(raw).unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
        assert!(err.to_string().contains("duration"));
    }

    #[test]
    fn malformed_json_is_error() {
        let err = parse_probe_output("not json").unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
    }

    #[test]
    fn frame_rate_fraction() {
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("30/1").unwrap(), 30.0);
        assert_eq!(parse_frame_rate("25").unwrap(), 25.0);
    }

    #[test]
    fn frame_rate_zero_denominator_is_error() {
        let err = parse_frame_rate("30/0").unwrap_err();
        assert!(err.to_string().contains("zero denominator"));
    }

    #[test]
    fn frame_rate_malformed_is_error() {
        assert!(parse_frame_rate("abc/def").unwrap_err().to_string().contains("malformed"));
        assert!(parse_frame_rate("30/").is_err());
        assert!(parse_frame_rate("invalid").is_err());
    }

    #[test]
    fn malformed_video_frame_rate_fails_probe() {
        let raw = r#"{
            "format": {"duration": "10.0"},
            "streams": [{"codec_type": "video", "codec_name": "h264",
                         "width": 640, "height": 480, "r_frame_rate": "0/0"}]
        }"#;
        assert!(parse_probe_output(raw).is_err());
    }
}
