//! Artifact lifecycle management.
//!
//! [`ArchiveManager`] owns every transition that couples database rows to
//! media files on disk: fragment creation (extract-then-commit with
//! rollback), fragment and video deletion, source file removal, and video
//! ingest. Nothing else in the application writes
//! `fragments.video_filepath` or deletes row+file pairs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use clipvault_av::{Extract, Probe, ThumbnailOptions};
use clipvault_core::paths::{
    fragment_preview_relpath, fragment_relpath, resolve_media_path, thumbnail_relpath,
};
use clipvault_core::{Error, FragmentId, Result, StorageConfig, UserId, VideoId};
use clipvault_db::queries::{fragments, tags, videos};
use clipvault_db::{get_conn, DbPool, Fragment, Video};

/// Retry behavior for forced source deletion.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total removal attempts before falling back to a rename.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Request payload for creating a fragment.
#[derive(Debug, Clone)]
pub struct CreateFragmentRequest {
    pub name: String,
    pub description: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub tags: Vec<String>,
}

/// Metadata accompanying an uploaded video file.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub title: String,
    pub original_filename: Option<String>,
    pub mime_type: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub tags: Vec<String>,
    pub owner_id: Option<UserId>,
}

/// Report of a fragment deletion. The row is always gone; `warnings`
/// lists any files that could not be removed.
#[derive(Debug, Serialize)]
pub struct FragmentDeletion {
    pub fragment_id: FragmentId,
    pub warnings: Vec<String>,
}

/// Report of a cascading video deletion.
#[derive(Debug, Serialize)]
pub struct VideoDeletion {
    pub video_id: VideoId,
    pub fragments_deleted: i64,
    pub warnings: Vec<String>,
}

/// Report of a source file deletion.
#[derive(Debug, Serialize)]
pub struct SourceDeletion {
    pub message: String,
    pub file_deleted: bool,
}

/// Orchestrates coupled row/file lifecycles.
pub struct ArchiveManager {
    db: DbPool,
    storage: StorageConfig,
    prober: Arc<dyn Probe>,
    extractor: Arc<dyn Extract>,
    retry: RetryPolicy,
}

impl ArchiveManager {
    pub fn new(
        db: DbPool,
        storage: StorageConfig,
        prober: Arc<dyn Probe>,
        extractor: Arc<dyn Extract>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db,
            storage,
            prober,
            extractor,
            retry,
        }
    }

    // -----------------------------------------------------------------
    // ingest
    // -----------------------------------------------------------------

    /// Register an uploaded file already saved under the upload root.
    ///
    /// Probing is mandatory: a file the transcoder cannot read is removed
    /// from disk and the upload fails with [`Error::Probe`]. Thumbnail
    /// rendering is best-effort and never aborts the upload.
    pub async fn ingest_video(&self, saved_path: &Path, req: IngestRequest) -> Result<Video> {
        let info = match self.prober.probe(saved_path).await {
            Ok(info) => info,
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(saved_path) {
                    warn!("Failed to remove unreadable upload {}: {rm}", saved_path.display());
                }
                return Err(e);
            }
        };

        let filename = saved_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Validation("upload has no valid filename".into()))?;
        let file_size = std::fs::metadata(saved_path)?.len() as i64;

        let conn = get_conn(&self.db)?;
        let video = videos::create_video(
            &conn,
            req.owner_id,
            filename,
            req.original_filename.as_deref(),
            &req.title,
            Some(info.duration),
            Some(filename),
            file_size,
            req.mime_type.as_deref(),
            req.category.as_deref(),
            req.subcategory.as_deref(),
        )?;
        if !req.tags.is_empty() {
            tags::set_video_tags(&conn, video.id, &req.tags)?;
        }
        drop(conn);

        let thumb = resolve_media_path(&self.storage.upload_root, &thumbnail_relpath(video.id));
        if let Err(e) = self
            .extractor
            .generate_thumbnail(saved_path, &thumb, ThumbnailOptions::default())
            .await
        {
            warn!("Thumbnail generation failed for video {}: {e}", video.id);
        }

        Ok(video)
    }

    // -----------------------------------------------------------------
    // fragment creation saga
    // -----------------------------------------------------------------

    /// Create a fragment by cutting `[start, end)` out of a video's source.
    ///
    /// The row is inserted before extraction so the derived filename can
    /// embed the fragment id; if any later step fails, the partial output
    /// file and the pending row are both removed before the error is
    /// surfaced. Callers never observe a pending fragment.
    pub async fn create_fragment(
        &self,
        video_id: VideoId,
        req: CreateFragmentRequest,
    ) -> Result<Fragment> {
        let conn = get_conn(&self.db)?;
        let video =
            videos::get_video(&conn, video_id)?.ok_or_else(|| Error::not_found("video", video_id))?;

        validate_range(req.start_time, req.end_time, video.duration)?;
        if req.name.trim().is_empty() {
            return Err(Error::Validation("fragment name must not be empty".into()));
        }

        let fragment = fragments::create_pending(
            &conn,
            video_id,
            req.name.trim(),
            req.description.as_deref(),
            req.start_time,
            req.end_time,
        )?;
        if !req.tags.is_empty() {
            if let Err(e) = tags::set_fragment_tags(&conn, fragment.id, &req.tags) {
                fragments::delete_fragment(&conn, fragment.id)?;
                return Err(e);
            }
        }
        drop(conn);

        let rel = fragment_relpath(fragment.id, &video.filename);
        let dest = resolve_media_path(&self.storage.upload_root, &rel);

        let outcome = self.extract_and_commit(&video, &fragment, &rel, &dest, &req).await;
        match outcome {
            Ok(committed) => Ok(committed),
            Err(e) => {
                self.rollback_fragment(fragment.id, &dest);
                Err(e)
            }
        }
    }

    /// Steps 3-5 of the saga: source check, extraction, commit. Split out
    /// so `create_fragment` has a single compensation path.
    async fn extract_and_commit(
        &self,
        video: &Video,
        fragment: &Fragment,
        rel: &str,
        dest: &Path,
        req: &CreateFragmentRequest,
    ) -> Result<Fragment> {
        let stored = video
            .filepath
            .as_deref()
            .ok_or_else(|| Error::SourceMissing(format!("video {} has no source file", video.id)))?;
        let source = resolve_media_path(&self.storage.upload_root, stored);
        if !source.is_file() {
            return Err(Error::SourceMissing(source.display().to_string()));
        }

        let (_, size) = self
            .extractor
            .extract_range(&source, dest, req.start_time, req.end_time)
            .await?;

        {
            let conn = get_conn(&self.db)?;
            fragments::set_output(&conn, fragment.id, rel, size as i64)?;
        }

        // The fragment is committed at this point; the preview still is
        // best-effort and must not trigger a rollback.
        let preview_rel = fragment_preview_relpath(fragment.id);
        let preview = resolve_media_path(&self.storage.upload_root, &preview_rel);
        let opts = ThumbnailOptions {
            timestamp: req.start_time,
            ..Default::default()
        };
        match self.extractor.generate_thumbnail(&source, &preview, opts).await {
            Ok(_) => {
                let preview_size = std::fs::metadata(&preview).map(|m| m.len() as i64).unwrap_or(0);
                let recorded = get_conn(&self.db).and_then(|conn| {
                    fragments::set_preview(&conn, fragment.id, &preview_rel, preview_size)
                });
                if let Err(e) = recorded {
                    warn!("Could not record preview for fragment {}: {e}", fragment.id);
                }
            }
            Err(e) => warn!("Preview render failed for fragment {}: {e}", fragment.id),
        }

        let conn = get_conn(&self.db)?;
        fragments::get_fragment(&conn, video.id, fragment.id)?
            .ok_or_else(|| Error::not_found("fragment", fragment.id))
    }

    /// Remove the pending row and any partial output file.
    fn rollback_fragment(&self, fragment_id: FragmentId, dest: &Path) {
        if dest.exists() {
            if let Err(e) = std::fs::remove_file(dest) {
                warn!("Rollback could not remove partial output {}: {e}", dest.display());
            }
        }
        match get_conn(&self.db).and_then(|conn| fragments::delete_fragment(&conn, fragment_id)) {
            Ok(_) => {}
            Err(e) => warn!("Rollback could not delete fragment row {fragment_id}: {e}"),
        }
    }

    // -----------------------------------------------------------------
    // deletion
    // -----------------------------------------------------------------

    /// Delete a fragment and its derived files.
    ///
    /// File removals are best-effort; the row is deleted regardless and
    /// failures are reported as warnings.
    pub async fn delete_fragment(
        &self,
        video_id: VideoId,
        fragment_id: FragmentId,
    ) -> Result<FragmentDeletion> {
        let conn = get_conn(&self.db)?;
        let fragment = fragments::get_fragment(&conn, video_id, fragment_id)?
            .ok_or_else(|| Error::not_found("fragment", fragment_id))?;

        let mut warnings = Vec::new();
        self.remove_stored_file(fragment.video_filepath.as_deref(), &mut warnings);
        self.remove_stored_file(fragment.preview_path.as_deref(), &mut warnings);

        fragments::delete_fragment(&conn, fragment_id)?;
        Ok(FragmentDeletion {
            fragment_id,
            warnings,
        })
    }

    /// Delete a video, its source file, its thumbnail, and every
    /// fragment's derived files.
    ///
    /// Each file removal is independently best-effort; the operation
    /// succeeds and deletes all rows even when some files cannot be
    /// removed. Skipped files are reported in `warnings`.
    pub async fn delete_video(&self, video_id: VideoId) -> Result<VideoDeletion> {
        let conn = get_conn(&self.db)?;
        let video = videos::get_video(&conn, video_id)?
            .ok_or_else(|| Error::not_found("video", video_id))?;
        let frags = fragments::list_by_video(&conn, video_id, None)?;

        let mut warnings = Vec::new();
        self.remove_stored_file(video.filepath.as_deref(), &mut warnings);

        let thumb = thumbnail_relpath(video_id);
        let thumb_path = resolve_media_path(&self.storage.upload_root, &thumb);
        if thumb_path.exists() {
            self.remove_stored_file(Some(&thumb), &mut warnings);
        }

        let fragments_deleted = frags.len() as i64;
        for frag in &frags {
            self.remove_stored_file(frag.video_filepath.as_deref(), &mut warnings);
            self.remove_stored_file(frag.preview_path.as_deref(), &mut warnings);
        }

        // Fragment rows and tag links go with the video row via FK cascade.
        videos::delete_video(&conn, video_id)?;

        Ok(VideoDeletion {
            video_id,
            fragments_deleted,
            warnings,
        })
    }

    /// Delete only a video's source file, keeping the record and its
    /// fragments.
    ///
    /// Idempotent: a video whose source is already gone reports success.
    /// In normal mode a removal blocked by another process surfaces
    /// [`Error::FileConflict`] with the row untouched. In force mode the
    /// removal is retried per [`RetryPolicy`], then the file is renamed to
    /// `<path>.deleted` as a last resort, and the row's filepath and size
    /// are cleared no matter what happened on disk.
    pub async fn delete_source(&self, video_id: VideoId, force: bool) -> Result<SourceDeletion> {
        let conn = get_conn(&self.db)?;
        let video = videos::get_video(&conn, video_id)?
            .ok_or_else(|| Error::not_found("video", video_id))?;

        let Some(stored) = video.filepath.as_deref() else {
            return Ok(SourceDeletion {
                message: "source file already removed".into(),
                file_deleted: false,
            });
        };
        let path = resolve_media_path(&self.storage.upload_root, stored);

        if !path.exists() {
            videos::clear_source(&conn, video_id)?;
            return Ok(SourceDeletion {
                message: "source file was already gone; record cleared".into(),
                file_deleted: false,
            });
        }

        if !force {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    videos::clear_source(&conn, video_id)?;
                    return Ok(SourceDeletion {
                        message: "source file deleted".into(),
                        file_deleted: true,
                    });
                }
                Err(e) if is_file_conflict(&e) => {
                    return Err(Error::FileConflict(format!(
                        "source file {} is in use; retry with force",
                        path.display()
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }

        drop(conn);
        let report = self.force_remove(&path).await;
        let conn = get_conn(&self.db)?;
        videos::clear_source(&conn, video_id)?;
        Ok(report)
    }

    /// Bounded retry loop for a stubborn source file, ending in a rename
    /// fallback. Never fails: the caller clears the row either way.
    async fn force_remove(&self, path: &Path) -> SourceDeletion {
        let mut last_err = None;
        for attempt in 1..=self.retry.max_attempts {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    return SourceDeletion {
                        message: format!("source file deleted on attempt {attempt}"),
                        file_deleted: true,
                    };
                }
                Err(e) => {
                    warn!(
                        "Force delete attempt {attempt}/{} failed for {}: {e}",
                        self.retry.max_attempts,
                        path.display()
                    );
                    last_err = Some(e);
                }
            }
            if attempt < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay).await;
            }
        }

        let renamed = rename_deleted(path);
        match std::fs::rename(path, &renamed) {
            Ok(()) => SourceDeletion {
                message: format!(
                    "source file could not be deleted; renamed to {}",
                    renamed.display()
                ),
                file_deleted: false,
            },
            Err(e) => SourceDeletion {
                message: format!(
                    "source file could not be deleted or renamed ({}); record cleared anyway",
                    last_err.map(|l| l.to_string()).unwrap_or_else(|| e.to_string())
                ),
                file_deleted: false,
            },
        }
    }

    /// Remove a stored media path if present, pushing a warning on failure.
    fn remove_stored_file(&self, stored: Option<&str>, warnings: &mut Vec<String>) {
        let Some(stored) = stored else { return };
        let path = resolve_media_path(&self.storage.upload_root, stored);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warnings.push(format!("{stored}: already gone"));
            }
            Err(e) => {
                warn!("Could not remove {}: {e}", path.display());
                warnings.push(format!("{stored}: {e}"));
            }
        }
    }
}

/// Validate a fragment time range against the video's known duration.
fn validate_range(start: f64, end: f64, duration: Option<f64>) -> Result<()> {
    let duration = duration
        .ok_or_else(|| Error::Validation("video duration is unknown; re-probe before cutting".into()))?;

    if !start.is_finite() || !end.is_finite() {
        return Err(Error::InvalidRange("start and end must be finite".into()));
    }
    if start < 0.0 {
        return Err(Error::InvalidRange(format!("start must be >= 0, got {start}")));
    }
    if start >= end {
        return Err(Error::InvalidRange(format!(
            "start ({start}) must be less than end ({end})"
        )));
    }
    if end > duration {
        return Err(Error::InvalidRange(format!(
            "end ({end}) exceeds video duration ({duration})"
        )));
    }
    Ok(())
}

/// Whether an I/O error indicates another process holding the file.
fn is_file_conflict(e: &std::io::Error) -> bool {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        return true;
    }
    #[cfg(windows)]
    {
        // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
        if matches!(e.raw_os_error(), Some(32) | Some(33)) {
            return true;
        }
    }
    false
}

/// Sibling path used when a stubborn source file can only be renamed.
fn rename_deleted(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".deleted");
    path.with_file_name(name)
}
