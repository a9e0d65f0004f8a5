//! In-Memory Job Registry Implementation

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{CancelOutcome, JobRegistryPort, RegistryError};
use crate::domain::job::{Job, JobId, JobStatus};

struct Entry {
    job: Job,
    cancel: CancellationToken,
}

/// 内存任务登记表
pub struct InMemoryJobRegistry {
    /// job_id -> 实时快照 + 取消令牌
    entries: DashMap<JobId, Entry>,
    /// 任务队列发送端
    queue_sender: mpsc::Sender<JobId>,
}

impl InMemoryJobRegistry {
    pub fn new(queue_sender: mpsc::Sender<JobId>) -> Self {
        Self {
            entries: DashMap::new(),
            queue_sender,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl JobRegistryPort for InMemoryJobRegistry {
    fn submit(&self, job: Job) -> Result<(), RegistryError> {
        let job_id = *job.id();
        if self.entries.contains_key(&job_id) {
            return Err(RegistryError::AlreadyExists(job_id));
        }

        self.entries.insert(
            job_id,
            Entry {
                job,
                cancel: CancellationToken::new(),
            },
        );

        // 投递失败时撤销登记，调用方会收到错误
        if let Err(e) = self.queue_sender.try_send(job_id) {
            self.entries.remove(&job_id);
            tracing::warn!(job_id = %job_id, error = %e, "Failed to enqueue job");
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => RegistryError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => RegistryError::QueueClosed,
            });
        }

        tracing::debug!(job_id = %job_id, "Job submitted");
        Ok(())
    }

    fn claim(&self, job_id: &JobId) -> Option<(Job, CancellationToken)> {
        let mut entry = self.entries.get_mut(job_id)?;
        if entry.job.status() != JobStatus::Pending {
            return None;
        }

        entry.job.start().ok()?;
        tracing::debug!(job_id = %job_id, "Job claimed");
        Some((entry.job.clone(), entry.cancel.clone()))
    }

    fn publish(&self, job: &Job) {
        let Some(mut entry) = self.entries.get_mut(job.id()) else {
            tracing::warn!(job_id = %job.id(), "Publishing snapshot for unknown job");
            return;
        };

        // 终态快照不可再被覆盖
        if entry.job.status().is_terminal() {
            tracing::debug!(
                job_id = %job.id(),
                current = %entry.job.status(),
                incoming = %job.status(),
                "Ignoring snapshot for terminal job"
            );
            return;
        }

        entry.job = job.clone();
    }

    fn snapshot(&self, job_id: &JobId) -> Option<Job> {
        self.entries.get(job_id).map(|e| e.job.clone())
    }

    fn request_cancel(&self, job_id: &JobId) -> CancelOutcome {
        let Some(mut entry) = self.entries.get_mut(job_id) else {
            return CancelOutcome::NotFound;
        };

        match entry.job.status() {
            JobStatus::Pending => {
                entry.cancel.cancel();
                match entry.job.cancel() {
                    Ok(()) => CancelOutcome::CancelledPending(entry.job.clone()),
                    Err(_) => CancelOutcome::AlreadyTerminal(entry.job.clone()),
                }
            }
            JobStatus::Processing => {
                entry.cancel.cancel();
                tracing::debug!(job_id = %job_id, "Cancellation signalled");
                CancelOutcome::Signalled
            }
            _ => CancelOutcome::AlreadyTerminal(entry.job.clone()),
        }
    }

    fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.entries.iter().map(|e| e.job.clone()).collect();
        jobs.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        jobs
    }
}
