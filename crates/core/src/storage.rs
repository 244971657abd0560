//! Local filesystem storage for generated video artifacts.
//!
//! Each completed video job owns exactly one file, `{root}/{job_id}.mp4`.
//! The path is what gets recorded as the job's `result`.
//!
//! Uploads are first written to a staged file unique to the upload,
//! `{root}/{job_id}.{nonce}.part`, and only moved onto the artifact path
//! once the upload has won the job. Concurrent uploads for one job never
//! touch each other's bytes.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::types::is_valid_job_id;

/// File extension of stored artifacts.
pub const VIDEO_EXTENSION: &str = "mp4";

/// Content type of stored artifacts.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// File extension of uploads not yet committed.
const STAGED_EXTENSION: &str = "part";

/// An upload written to disk but not yet published as the job's artifact.
#[derive(Debug)]
pub struct StagedVideo {
    job_id: String,
    path: PathBuf,
}

impl StagedVideo {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Directory-backed artifact store.
#[derive(Debug, Clone)]
pub struct VideoStorage {
    root: PathBuf,
}

impl VideoStorage {
    /// Use `root` as the artifact directory. Call [`init`](Self::init)
    /// before the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the artifact directory if it does not exist yet.
    pub async fn init(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an upload for `job_id` under a name no other upload shares.
    pub async fn stage(&self, job_id: &str, data: &[u8]) -> io::Result<StagedVideo> {
        let final_path = self.file_path(job_id)?;
        let path = final_path.with_extension(format!(
            "{}.{STAGED_EXTENSION}",
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::write(&path, data).await?;
        tracing::debug!(job_id, bytes = data.len(), path = %path.display(), "Staged video upload");
        Ok(StagedVideo {
            job_id: job_id.to_string(),
            path,
        })
    }

    /// Path the artifact of `job_id` is published at by [`commit`](Self::commit).
    pub fn artifact_path(&self, job_id: &str) -> io::Result<PathBuf> {
        self.file_path(job_id)
    }

    /// Publish a staged upload as the job's artifact.
    pub async fn commit(&self, staged: StagedVideo) -> io::Result<PathBuf> {
        let path = self.file_path(&staged.job_id)?;
        tokio::fs::rename(&staged.path, &path).await?;
        tracing::debug!(job_id = %staged.job_id, path = %path.display(), "Stored video artifact");
        Ok(path)
    }

    /// Drop a staged upload without publishing it.
    pub async fn discard(&self, staged: StagedVideo) {
        if let Err(e) = tokio::fs::remove_file(&staged.path).await {
            tracing::warn!(
                job_id = %staged.job_id,
                path = %staged.path.display(),
                error = %e,
                "Failed to remove staged upload",
            );
        }
    }

    /// Path of the stored artifact, if one exists.
    pub async fn path_for(&self, job_id: &str) -> io::Result<Option<PathBuf>> {
        let Ok(path) = self.file_path(job_id) else {
            return Ok(None);
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// File names of every stored artifact.
    pub async fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_artifact(&path) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete artifacts whose modification time is older than `max_age`.
    ///
    /// Staged uploads left behind by an interrupted request age out the
    /// same way.
    ///
    /// Individual delete failures are logged and skipped. Returns the
    /// number of files removed.
    pub async fn remove_older_than(&self, max_age: Duration) -> io::Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_artifact(&path) && !is_staged(&path) {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot read artifact mtime");
                    continue;
                }
            };
            if modified >= cutoff {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    removed += 1;
                    tracing::info!(path = %path.display(), "Deleted expired video artifact");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete video artifact");
                }
            }
        }
        Ok(removed)
    }

    fn file_path(&self, job_id: &str) -> io::Result<PathBuf> {
        if !is_valid_job_id(job_id) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid job id '{job_id}'"),
            ));
        }
        Ok(self.root.join(format!("{job_id}.{VIDEO_EXTENSION}")))
    }
}

fn is_artifact(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(VIDEO_EXTENSION)
}

fn is_staged(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(STAGED_EXTENSION)
}
