//! Job Registry Port - 运行中任务的内存登记表
//!
//! 保存实时快照与取消令牌，并把新任务投递给 worker 队列。
//! 快照整体替换，读者不会看到撕裂的进度。

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::job::{Job, JobId};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Job already registered: {0}")]
    AlreadyExists(JobId),

    #[error("Job queue closed")]
    QueueClosed,

    #[error("Job queue full")]
    QueueFull,
}

/// 取消请求的结果
#[derive(Debug)]
pub enum CancelOutcome {
    /// 任务尚未开始，已直接置为 Cancelled（返回新快照）
    CancelledPending(Job),
    /// 任务运行中，已发出取消信号
    Signalled,
    /// 任务已结束
    AlreadyTerminal(Job),
    NotFound,
}

pub trait JobRegistryPort: Send + Sync {
    /// 登记任务并投递到队列
    fn submit(&self, job: Job) -> Result<(), RegistryError>;

    /// 领取任务: Pending -> Processing（原子），返回快照与取消令牌
    ///
    /// 任务不存在或已不是 Pending 时返回 None
    fn claim(&self, job_id: &JobId) -> Option<(Job, CancellationToken)>;

    /// 整体替换快照
    fn publish(&self, job: &Job);

    fn snapshot(&self, job_id: &JobId) -> Option<Job>;

    fn request_cancel(&self, job_id: &JobId) -> CancelOutcome;

    /// 所有登记中的任务（按创建时间倒序）
    fn list(&self) -> Vec<Job>;
}
