//! Mapping between stored media paths and filesystem locations.
//!
//! The database stores media paths relative to the configured upload root,
//! as forward-slash segments (`fragments/<filename>`, `thumbnails/<id>.jpg`).
//! Source video rows created by older installations may hold absolute paths;
//! resolution tolerates both forms. Derived artifacts are always persisted
//! relative — never absolute.

use std::path::{Path, PathBuf};

use crate::ids::{FragmentId, VideoId};

/// Relative directory (under the upload root) holding derived fragment files.
pub const FRAGMENTS_DIR: &str = "fragments";

/// Relative directory (under the upload root) holding video thumbnails.
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// List of accepted video file extensions for uploads.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "webm"];

/// Resolve a stored media path to an absolute filesystem location.
///
/// Absolute stored paths pass through unchanged; relative ones are joined
/// onto `upload_root`.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use clipvault_core::paths::resolve_media_path;
///
/// let root = Path::new("/srv/media");
/// assert_eq!(
///     resolve_media_path(root, "fragments/clip.mp4"),
///     PathBuf::from("/srv/media/fragments/clip.mp4")
/// );
/// assert_eq!(
///     resolve_media_path(root, "/legacy/uploads/a.mp4"),
///     PathBuf::from("/legacy/uploads/a.mp4")
/// );
/// ```
pub fn resolve_media_path(upload_root: &Path, stored: &str) -> PathBuf {
    let stored_path = Path::new(stored);
    if stored_path.is_absolute() {
        stored_path.to_path_buf()
    } else {
        upload_root.join(stored)
    }
}

/// Relative path for a fragment's derived video file.
///
/// The name embeds the fragment id so concurrent extractions never collide
/// and orphaned files remain traceable to a fragment even after its row is
/// gone.
pub fn fragment_relpath(fragment_id: FragmentId, video_filename: &str) -> String {
    format!("{FRAGMENTS_DIR}/fragment_{fragment_id}_{video_filename}")
}

/// Relative path for a video's generated thumbnail.
pub fn thumbnail_relpath(video_id: VideoId) -> String {
    format!("{THUMBNAILS_DIR}/{video_id}.jpg")
}

/// Relative path for a fragment's preview still.
pub fn fragment_preview_relpath(fragment_id: FragmentId) -> String {
    format!("{THUMBNAILS_DIR}/fragment_{fragment_id}.jpg")
}

/// Check if a path has an accepted video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use clipvault_core::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("movie.mp4")));
/// assert!(is_video_file(Path::new("/path/to/clip.MKV")));
/// assert!(!is_video_file(Path::new("notes.txt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_relative_joins_root() {
        let p = resolve_media_path(Path::new("/srv/media"), "fragments/a.mp4");
        assert_eq!(p, PathBuf::from("/srv/media/fragments/a.mp4"));
    }

    #[test]
    fn resolve_absolute_passes_through() {
        let p = resolve_media_path(Path::new("/srv/media"), "/old/uploads/a.mp4");
        assert_eq!(p, PathBuf::from("/old/uploads/a.mp4"));
    }

    #[test]
    fn fragment_relpath_embeds_id_and_filename() {
        let id = FragmentId::new();
        let rel = fragment_relpath(id, "abc_video.mp4");
        assert_eq!(rel, format!("fragments/fragment_{id}_abc_video.mp4"));
        assert!(!Path::new(&rel).is_absolute());
    }

    #[test]
    fn thumbnail_relpath_uses_video_id() {
        let id = VideoId::new();
        assert_eq!(thumbnail_relpath(id), format!("thumbnails/{id}.jpg"));
    }

    #[test]
    fn fragment_preview_relpath_uses_fragment_id() {
        let id = FragmentId::new();
        assert_eq!(
            fragment_preview_relpath(id),
            format!("thumbnails/fragment_{id}.jpg")
        );
    }

    #[test]
    fn video_extension_detection() {
        assert!(is_video_file(Path::new("a.mp4")));
        assert!(is_video_file(Path::new("a.avi")));
        assert!(is_video_file(Path::new("a.mov")));
        assert!(is_video_file(Path::new("a.mkv")));
        assert!(is_video_file(Path::new("a.wmv")));
        assert!(is_video_file(Path::new("a.webm")));
        assert!(is_video_file(Path::new("a.MP4")));
        assert!(!is_video_file(Path::new("a.srt")));
        assert!(!is_video_file(Path::new("no_extension")));
        assert!(!is_video_file(Path::new("")));
    }
}
