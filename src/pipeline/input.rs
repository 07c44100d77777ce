//! Upload staging: hold one request's PDF on disk, then remove it.
//!
//! Each upload gets its own `<uuid>.pdf` in the upload directory so
//! concurrent requests never collide. The file lives inside a
//! [`tempfile::NamedTempFile`], so it is unlinked when the [`StagedUpload`] is
//! dropped on every exit path: success, extraction error, early return, panic
//! or a cancelled request future. [`StagedUpload::discard`] does the same
//! eagerly and logs the outcome.

use crate::error::RelayError;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Uuid;

/// A PDF written to the upload directory for the duration of one request.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    /// Write `bytes` to a fresh, uniquely named file under `dir`.
    pub async fn write(dir: &Path, bytes: Vec<u8>) -> Result<Self, RelayError> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || Self::write_blocking(&dir, &bytes))
            .await
            .map_err(|e| RelayError::Internal(format!("staging task aborted: {}", e)))?
    }

    fn write_blocking(dir: &Path, bytes: &[u8]) -> Result<Self, RelayError> {
        std::fs::create_dir_all(dir).map_err(RelayError::Staging)?;
        let mut file = tempfile::Builder::new()
            .prefix(&Uuid::new_v4().to_string())
            .suffix(".pdf")
            .rand_bytes(0)
            .tempfile_in(dir)
            .map_err(RelayError::Staging)?;
        file.write_all(bytes).map_err(RelayError::Staging)?;
        file.flush().map_err(RelayError::Staging)?;
        debug!("Staged {} byte upload at {}", bytes.len(), file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the staged file now.
    pub fn discard(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!("Deleted staged upload {}", path.display()),
            Err(e) => warn!("Failed to delete staged upload {}: {}", path.display(), e),
        }
    }
}

/// True when `filename` ends in `.pdf` (any case).
pub fn has_pdf_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_has_pdf_extension() {
        assert!(has_pdf_extension("lease.pdf"));
        assert!(has_pdf_extension("LEASE.PDF"));
        assert!(has_pdf_extension("my.lease.v2.pdf"));
        assert!(!has_pdf_extension("lease.docx"));
        assert!(!has_pdf_extension("pdf"));
        assert!(!has_pdf_extension("lease.pdf.exe"));
        assert!(!has_pdf_extension(""));
    }

    #[tokio::test]
    async fn staged_file_exists_until_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedUpload::write(dir.path(), b"%PDF-1.5".to_vec())
            .await
            .unwrap();
        assert!(staged.path().exists());
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"%PDF-1.5");
        assert_eq!(
            staged.path().extension().and_then(|e| e.to_str()),
            Some("pdf")
        );

        staged.discard();
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn dropping_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let staged = StagedUpload::write(dir.path(), vec![1, 2, 3]).await.unwrap();
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn concurrent_uploads_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let a = StagedUpload::write(dir.path(), vec![0]).await.unwrap();
        let b = StagedUpload::write(dir.path(), vec![0]).await.unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(entries(dir.path()), 2);
    }

    #[tokio::test]
    async fn creates_missing_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/uploads");
        let staged = StagedUpload::write(&nested, vec![0]).await.unwrap();
        assert!(staged.path().starts_with(&nested));
    }
}
