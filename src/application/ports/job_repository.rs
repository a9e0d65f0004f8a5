//! Job Repository Port - 任务持久化
//!
//! 具体实现在 infrastructure/persistence/sqlite

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::job::{Job, JobId, JobProgress};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[async_trait]
pub trait JobRepositoryPort: Send + Sync {
    /// 创建任务记录（含章节）
    async fn create(&self, job: &Job) -> Result<(), RepositoryError>;

    /// 保存进度快照
    ///
    /// 已处于终态的记录不会被改写
    async fn save_progress(&self, job_id: &JobId, progress: &JobProgress)
        -> Result<(), RepositoryError>;

    async fn load(&self, job_id: &JobId) -> Result<Option<Job>, RepositoryError>;

    /// 按创建时间倒序
    async fn list(&self, limit: u32) -> Result<Vec<Job>, RepositoryError>;
}
