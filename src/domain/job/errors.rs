//! Job Context - Errors

use thiserror::Error;

use super::{JobId, JobStatus};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("任务已结束: {id} ({status})")]
    AlreadyTerminal { id: JobId, status: JobStatus },

    #[error("无效的状态转换: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("仍有未完成的章节: {processed}/{total}")]
    ChaptersRemaining { processed: usize, total: usize },

    #[error("任务没有任何章节")]
    NoChapters,
}
