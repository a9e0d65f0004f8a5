//! File Text Source - 从上传目录读取已提取的纯文本

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::{TextSourceError, TextSourcePort};

/// 上传目录文本源
pub struct FileTextSource {
    uploads_dir: PathBuf,
}

impl FileTextSource {
    pub fn new(uploads_dir: impl AsRef<Path>) -> Self {
        Self {
            uploads_dir: uploads_dir.as_ref().to_path_buf(),
        }
    }

    /// 只接受单个文件名，拒绝路径分隔符与 `..`
    fn resolve(&self, upload_ref: &str) -> Result<PathBuf, TextSourceError> {
        let trimmed = upload_ref.trim();
        if trimmed.is_empty()
            || trimmed.contains('/')
            || trimmed.contains('\\')
            || trimmed.contains("..")
        {
            return Err(TextSourceError::InvalidReference(upload_ref.to_string()));
        }
        Ok(self.uploads_dir.join(trimmed))
    }
}

#[async_trait]
impl TextSourcePort for FileTextSource {
    async fn raw_text(&self, upload_ref: &str) -> Result<String, TextSourceError> {
        let path = self.resolve(upload_ref)?;

        match fs::read_to_string(&path).await {
            Ok(text) => {
                tracing::debug!(path = %path.display(), chars = text.len(), "Loaded upload text");
                Ok(text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TextSourceError::NotFound(upload_ref.to_string()))
            }
            Err(e) => Err(TextSourceError::IoError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reads_upload() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("book.txt"), "Chapter 1\nHello.")
            .await
            .unwrap();

        let source = FileTextSource::new(dir.path());
        assert_eq!(source.raw_text("book.txt").await.unwrap(), "Chapter 1\nHello.");
    }

    #[tokio::test]
    async fn test_missing_upload() {
        let dir = tempdir().unwrap();
        let source = FileTextSource::new(dir.path());
        assert!(matches!(
            source.raw_text("nope.txt").await,
            Err(TextSourceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = tempdir().unwrap();
        let source = FileTextSource::new(dir.path());
        for bad in ["../secret", "a/b.txt", "a\\b.txt", ""] {
            assert!(matches!(
                source.raw_text(bad).await,
                Err(TextSourceError::InvalidReference(_))
            ));
        }
    }
}
