//! Artifact Storage Port - 章节音频存储
//!
//! 按内容哈希存储章节音频，返回可公开访问的 URL

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid content hash: {0}")]
    InvalidHash(String),
}

#[async_trait]
pub trait ArtifactStoragePort: Send + Sync {
    /// 存储音频，返回公开 URL
    ///
    /// 相同 content_hash 重复写入是幂等的
    async fn store_audio(&self, bytes: &[u8], content_hash: &str) -> Result<String, StorageError>;
}
