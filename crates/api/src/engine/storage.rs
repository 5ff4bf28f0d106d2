//! Artifact bytes on the local filesystem.
//!
//! Files live at `<root>/<job_id>/<uuid>_<file name>`; the database keeps
//! the path relative to the root.

use std::io;
use std::path::{Component, Path, PathBuf};

use jobhub_core::model::JobArtifact;
use jobhub_core::types::DbId;
use sha2::{Digest, Sha256};

/// Longest file-name suffix kept in a storage path.
const MAX_STORED_NAME_LEN: usize = 120;

/// Where and how an uploaded artifact was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the artifact root.
    pub storage_path: String,
    pub file_size: i64,
    pub checksum_sha256: String,
}

/// Filesystem store for artifact payloads.
#[derive(Debug, Clone)]
pub struct ArtifactStorage {
    root: PathBuf,
}

impl ArtifactStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` for `job_id` and return the stored location and digest.
    pub async fn write(&self, job_id: DbId, file_name: &str, bytes: &[u8]) -> io::Result<StoredFile> {
        let dir = self.root.join(job_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let stored_name = format!("{}_{}", uuid::Uuid::new_v4(), sanitize_file_name(file_name));
        tokio::fs::write(dir.join(&stored_name), bytes).await?;

        Ok(StoredFile {
            storage_path: format!("{job_id}/{stored_name}"),
            file_size: bytes.len() as i64,
            checksum_sha256: sha256_hex(bytes),
        })
    }

    /// Open a stored artifact for reading.
    pub async fn open(&self, storage_path: &str) -> io::Result<tokio::fs::File> {
        let path = self.resolve(storage_path)?;
        tokio::fs::File::open(path).await
    }

    /// Remove the files of deleted artifacts. Failures are logged, not
    /// returned: the rows are already gone.
    pub async fn remove_all(&self, artifacts: &[JobArtifact]) {
        for artifact in artifacts {
            self.remove(&artifact.storage_path).await;
        }
    }

    /// Remove one stored file, ignoring files that are already gone.
    pub async fn remove(&self, storage_path: &str) {
        let path = match self.resolve(storage_path) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(storage_path, error = %e, "Refusing to remove artifact");
                return;
            }
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                // Drop the per-job directory once it is empty; fails harmlessly otherwise.
                if let Some(dir) = path.parent() {
                    let _ = tokio::fs::remove_dir(dir).await;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(storage_path, error = %e, "Failed to remove artifact file");
            }
        }
    }

    /// Join a stored relative path onto the root, rejecting anything that
    /// could escape it.
    fn resolve(&self, storage_path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(storage_path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage path '{storage_path}'"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

/// Lowercase hex SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Reduce a client-supplied file name to a safe single path segment.
fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STORED_NAME_LEN)
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "artifact".to_string()
    } else {
        trimmed.to_string()
    }
}
