//! Job Queries

use crate::domain::job::JobId;

/// 获取任务快照
#[derive(Debug, Clone)]
pub struct GetJob {
    pub job_id: JobId,
}

/// 列出最近的任务
#[derive(Debug, Clone)]
pub struct ListJobs {
    pub limit: u32,
}

impl Default for ListJobs {
    fn default() -> Self {
        Self { limit: 50 }
    }
}
