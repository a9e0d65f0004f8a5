//! Book Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("无效的分块大小: {0}（必须大于 0）")]
    InvalidChunkSize(usize),

    #[error("无效的音色 ID: {0}")]
    InvalidVoiceId(String),

    #[error("文本内容为空")]
    EmptyText,
}
