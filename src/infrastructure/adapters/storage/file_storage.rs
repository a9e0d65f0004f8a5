//! File Storage - 文件系统章节音频存储
//!
//! 实现 ArtifactStoragePort: `<audio_dir>/<hash>.<ext>`，公开地址为 `<public_base_url>/audio/<hash>.<ext>`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::{ArtifactStoragePort, StorageError};

/// 文件系统音频存储
pub struct FileArtifactStorage {
    /// 存储根目录
    base_dir: PathBuf,
    /// 对外访问的基础 URL
    public_base_url: String,
    /// 文件扩展名
    extension: String,
}

impl FileArtifactStorage {
    /// 创建新的文件存储（目录不存在时创建）
    pub async fn new(
        base_dir: impl AsRef<Path>,
        public_base_url: impl Into<String>,
        extension: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let base_dir = base_dir.as_ref().to_path_buf();

        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;

        Ok(Self {
            base_dir,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            extension: extension.into(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_name(&self, content_hash: &str) -> String {
        format!("{}.{}", content_hash, self.extension)
    }

    pub fn audio_path(&self, content_hash: &str) -> PathBuf {
        self.base_dir.join(self.file_name(content_hash))
    }

    pub fn public_url(&self, content_hash: &str) -> String {
        format!("{}/audio/{}", self.public_base_url, self.file_name(content_hash))
    }
}

#[async_trait]
impl ArtifactStoragePort for FileArtifactStorage {
    async fn store_audio(&self, bytes: &[u8], content_hash: &str) -> Result<String, StorageError> {
        if content_hash.is_empty() || !content_hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidHash(content_hash.to_string()));
        }

        let audio_path = self.audio_path(content_hash);

        // 内容寻址：同名文件内容必然相同
        if fs::try_exists(&audio_path).await.unwrap_or(false) {
            tracing::debug!(path = %audio_path.display(), "Artifact already stored");
            return Ok(self.public_url(content_hash));
        }

        // 先写临时文件再重命名，避免读者看到写了一半的文件
        let tmp_path = audio_path.with_extension(format!("{}.tmp", self.extension));
        fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        fs::rename(&tmp_path, &audio_path)
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;

        tracing::debug!(
            path = %audio_path.display(),
            size = bytes.len(),
            "Stored chapter audio"
        );

        Ok(self.public_url(content_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_store_audio_returns_public_url() {
        let temp_dir = tempdir().unwrap();
        let storage = FileArtifactStorage::new(temp_dir.path(), "http://localhost:5060/", "mp3")
            .await
            .unwrap();

        let url = storage.store_audio(b"audio bytes", "abc123").await.unwrap();
        assert_eq!(url, "http://localhost:5060/audio/abc123.mp3");

        let stored = tokio::fs::read(storage.audio_path("abc123")).await.unwrap();
        assert_eq!(stored, b"audio bytes");
    }

    #[tokio::test]
    async fn test_store_audio_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let storage = FileArtifactStorage::new(temp_dir.path(), "http://h", "mp3")
            .await
            .unwrap();

        let first = storage.store_audio(b"data", "ff00").await.unwrap();
        let second = storage.store_audio(b"data", "ff00").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_rejects_non_hex_hash() {
        let temp_dir = tempdir().unwrap();
        let storage = FileArtifactStorage::new(temp_dir.path(), "http://h", "mp3")
            .await
            .unwrap();

        let err = storage.store_audio(b"data", "../etc/passwd").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidHash(_)));
    }
}
