//! Cutting time ranges and rendering thumbnails via ffmpeg.
//!
//! `extract_range` stream-copies (no re-encode) a `[start, end)` range out
//! of a source file into a new standalone file, with negative-timestamp
//! correction so the output seeks from zero. `generate_thumbnail` renders a
//! single scaled still frame. Both run as child processes with hard
//! wall-clock bounds so a wedged transcoder never ties up a request.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use clipvault_core::{Error, Result};

use crate::command::ToolCommand;

/// Hard wall-clock bound for a range extraction.
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(300);

/// Hard wall-clock bound for a thumbnail render.
const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(60);

/// Options for a thumbnail render.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailOptions {
    /// Timestamp (seconds) of the frame to capture. The tool clamps
    /// timestamps past the end of the file; that is tolerated, not fatal.
    pub timestamp: f64,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            timestamp: 1.0,
            width: 320,
            height: 180,
        }
    }
}

/// Interface for deriving new media files from a source file.
///
/// The archive layer depends on this trait rather than on ffmpeg directly,
/// so its rollback handling can be exercised with stubs that fail at
/// chosen points.
#[async_trait]
pub trait Extract: Send + Sync {
    /// Cut `[start, end)` out of `source` into `dest`.
    ///
    /// Returns the written path and its size in bytes. On failure any
    /// partially-written file is left in place for the caller to clean up.
    async fn extract_range(
        &self,
        source: &Path,
        dest: &Path,
        start: f64,
        end: f64,
    ) -> Result<(PathBuf, u64)>;

    /// Render a single still frame of `source` at the given timestamp.
    async fn generate_thumbnail(
        &self,
        source: &Path,
        dest: &Path,
        opts: ThumbnailOptions,
    ) -> Result<PathBuf>;
}

/// An extractor backed by the `ffmpeg` CLI.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    /// Path to the ffmpeg binary.
    ffmpeg_path: PathBuf,
}

impl FfmpegExtractor {
    /// Create a new extractor using the given ffmpeg path.
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self { ffmpeg_path }
    }
}

#[async_trait]
impl Extract for FfmpegExtractor {
    async fn extract_range(
        &self,
        source: &Path,
        dest: &Path,
        start: f64,
        end: f64,
    ) -> Result<(PathBuf, u64)> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(extract_args(source, dest, start, end));
        cmd.timeout(EXTRACT_TIMEOUT);

        cmd.execute().await.map_err(|e| match e {
            Error::Tool { message, .. } => Error::Extraction(message),
            other => other,
        })?;

        let size = verify_output(dest)?;
        Ok((dest.to_path_buf(), size))
    }

    async fn generate_thumbnail(
        &self,
        source: &Path,
        dest: &Path,
        opts: ThumbnailOptions,
    ) -> Result<PathBuf> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(thumbnail_args(source, dest, opts));
        cmd.timeout(THUMBNAIL_TIMEOUT);
        cmd.execute().await?;

        Ok(dest.to_path_buf())
    }
}

/// ffmpeg argument list for a stream-copy range extraction.
///
/// `-ss` before `-i` seeks on the input side; `-c copy` avoids re-encoding;
/// `-avoid_negative_ts 1` shifts timestamps so the output starts at zero.
fn extract_args(source: &Path, dest: &Path, start: f64, end: f64) -> Vec<String> {
    let duration = end - start;
    vec![
        "-y".into(),
        "-ss".into(),
        start.to_string(),
        "-i".into(),
        source.to_string_lossy().into_owned(),
        "-t".into(),
        duration.to_string(),
        "-c".into(),
        "copy".into(),
        "-avoid_negative_ts".into(),
        "1".into(),
        dest.to_string_lossy().into_owned(),
    ]
}

/// ffmpeg argument list for a single-frame thumbnail render.
fn thumbnail_args(source: &Path, dest: &Path, opts: ThumbnailOptions) -> Vec<String> {
    vec![
        "-y".into(),
        "-ss".into(),
        opts.timestamp.to_string(),
        "-i".into(),
        source.to_string_lossy().into_owned(),
        "-vframes".into(),
        "1".into(),
        "-vf".into(),
        format!("scale={}:{}", opts.width, opts.height),
        "-update".into(),
        "1".into(),
        dest.to_string_lossy().into_owned(),
    ]
}

/// Check that an extraction actually produced a non-empty file.
///
/// ffmpeg occasionally reports success while writing nothing (e.g. a range
/// past the last keyframe), so a zero-length output is a failure here.
fn verify_output(dest: &Path) -> Result<u64> {
    let meta = std::fs::metadata(dest).map_err(|_| {
        Error::Extraction(format!(
            "output file {} is missing after extraction",
            dest.display()
        ))
    })?;

    if meta.len() == 0 {
        return Err(Error::Extraction(format!(
            "output file {} is empty",
            dest.display()
        )));
    }

    Ok(meta.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_args_shape() {
        let args = extract_args(Path::new("/in.mp4"), Path::new("/out.mp4"), 10.0, 30.0);
        assert_eq!(args[0], "-y");
        assert_eq!(args[1], "-ss");
        assert_eq!(args[2], "10");
        assert_eq!(args[4], "/in.mp4");
        assert_eq!(args[6], "20"); // -t is the span, not the end point
        assert!(args.contains(&"copy".to_string()));
        assert!(args.contains(&"-avoid_negative_ts".to_string()));
        assert_eq!(args.last().unwrap(), "/out.mp4");
    }

    #[test]
    fn thumbnail_args_shape() {
        let opts = ThumbnailOptions::default();
        let args = thumbnail_args(Path::new("/in.mp4"), Path::new("/thumb.jpg"), opts);
        assert_eq!(args[2], "1");
        assert!(args.contains(&"-vframes".to_string()));
        assert!(args.contains(&"scale=320:180".to_string()));
        assert_eq!(args.last().unwrap(), "/thumb.jpg");
    }

    #[test]
    fn verify_output_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify_output(&dir.path().join("nope.mp4")).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn verify_output_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mp4");
        std::fs::write(&path, b"").unwrap();
        let err = verify_output(&path).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn verify_output_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        std::fs::write(&path, b"0123456789").unwrap();
        assert_eq!(verify_output(&path).unwrap(), 10);
    }
}
