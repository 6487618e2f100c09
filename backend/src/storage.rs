use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on an uploaded file (100 MiB).
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// MIME types accepted by the document upload.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "audio/aac",
    "video/x-msvideo",
    "text/csv",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/epub+zip",
    "image/gif",
    "image/x-icon",
    "image/jpeg",
    "audio/midi",
    "video/mpeg",
    "application/vnd.oasis.opendocument.presentation",
    "application/vnd.oasis.opendocument.spreadsheet",
    "application/vnd.oasis.opendocument.text",
    "audio/ogg",
    "video/ogg",
    "application/ogg",
    "image/png",
    "application/pdf",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/x-rar-compressed",
    "application/rtf",
    "application/x-tar",
    "image/tiff",
    "application/vnd.visio",
    "audio/x-wav",
    "audio/webm",
    "video/webm",
    "image/webp",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/zip",
    "application/x-7z-compressed",
];

pub fn is_allowed_mime(mime: &str) -> bool {
    // Parameters such as "; charset=utf-8" are ignored.
    let essence = mime.split(';').next().unwrap_or_default().trim();
    ALLOWED_MIME_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(essence))
}

/// stored_file_name
///
/// Name under which an upload is written: the upload timestamp, a random
/// suffix and the original extension, so client-chosen names never reach the
/// filesystem and concurrent uploads never collide.
pub fn stored_file_name(original: &str) -> String {
    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ");
    let suffix = Uuid::new_v4().simple().to_string();
    let extension = Path::new(&sanitize_file_name(original))
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{timestamp}-{}{extension}", &suffix[..8])
}

/// sanitize_file_name
///
/// Reduces a client-supplied name to its last path segment, dropping directory
/// navigation (`..`, `.`) and separators.
pub fn sanitize_file_name(name: &str) -> String {
    name.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .last()
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid file name '{0}'")]
    InvalidName(String),

    #[error("i/o failure on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("simulated storage failure")]
    Simulated,
}

/// StorageService
///
/// Contract for where uploaded document files live. Handlers only see this
/// trait; the disk-backed implementation runs in every environment and the mock
/// stands in during tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the backing location if needed. Called once at startup.
    async fn ensure_ready(&self) -> Result<(), StorageError>;

    /// Writes a file under `name` (already produced by `stored_file_name`).
    async fn store(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Deletes a stored file. A missing file is `Ok(false)`, not an error.
    async fn remove(&self, name: &str) -> Result<bool, StorageError>;
}

/// LocalDiskStorage
///
/// Stores uploads as plain files in a single directory (`UPLOAD_DIR`).
#[derive(Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        let clean = sanitize_file_name(name);
        if clean.is_empty() || clean != name {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(clean))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error(&self.root, e))?;
        tracing::info!(path = %self.root.display(), "upload directory ready");
        Ok(())
    }

    async fn store(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| io_error(&path, e))?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "stored upload");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "stored file already gone");
                Ok(false)
            }
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

/// MockStorageService
///
/// In-memory stand-in for tests. Keeps the size of every stored file so tests
/// can assert on what a handler wrote or removed.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every operation returns `StorageError::Simulated`.
    pub should_fail: bool,
    files: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(name))
            .unwrap_or(false)
    }

    pub fn stored_names(&self) -> Vec<String> {
        self.files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Simulated);
        }
        Ok(())
    }

    async fn store(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Simulated);
        }
        let mut files = self.files.lock().map_err(|_| StorageError::Simulated)?;
        files.insert(sanitize_file_name(name), bytes.len());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool, StorageError> {
        if self.should_fail {
            return Err(StorageError::Simulated);
        }
        let mut files = self.files.lock().map_err(|_| StorageError::Simulated)?;
        Ok(files.remove(name).is_some())
    }
}

/// StorageState
///
/// The shared handle to the file store held in `AppState`.
pub type StorageState = Arc<dyn StorageService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_allowlist_ignores_parameters_and_case() {
        assert!(is_allowed_mime("application/pdf"));
        assert!(is_allowed_mime("Text/CSV; charset=utf-8"));
        assert!(!is_allowed_mime("application/x-msdownload"));
        assert!(!is_allowed_mime(""));
    }

    #[test]
    fn sanitize_keeps_only_the_last_segment() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\notes.pdf"), "notes.pdf");
        assert_eq!(sanitize_file_name(".."), "");
    }

    #[test]
    fn stored_name_keeps_a_clean_extension() {
        let name = stored_file_name("Lecture Notes.PDF");
        assert!(name.ends_with(".pdf"));
        assert!(!name.contains('/'));

        let bare = stored_file_name("README");
        assert!(!bare.contains('/'));
        assert_ne!(bare, stored_file_name("README"));
    }
}
