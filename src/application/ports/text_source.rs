//! Text Source Port - 原始文本来源
//!
//! 上传 / 格式解析在系统之外完成，这里只负责按引用取回纯文本

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextSourceError {
    #[error("Upload not found: {0}")]
    NotFound(String),

    #[error("Invalid upload reference: {0}")]
    InvalidReference(String),

    #[error("IO error: {0}")]
    IoError(String),
}

#[async_trait]
pub trait TextSourcePort: Send + Sync {
    async fn raw_text(&self, upload_ref: &str) -> Result<String, TextSourceError>;
}
