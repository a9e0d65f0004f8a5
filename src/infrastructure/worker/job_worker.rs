//! Job Worker - Background Audiobook Job Processor

use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::application::JobCoordinator;
use crate::domain::job::JobId;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    /// 同时处理的任务数
    pub max_concurrent_jobs: usize,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
        }
    }
}

/// 任务 Worker
///
/// 从队列消费 job_id，交给 JobCoordinator 处理直到终态
pub struct JobWorker {
    config: JobWorkerConfig,
    queue_receiver: mpsc::Receiver<JobId>,
    coordinator: Arc<JobCoordinator>,
}

impl JobWorker {
    pub fn new(
        config: JobWorkerConfig,
        queue_receiver: mpsc::Receiver<JobId>,
        coordinator: Arc<JobCoordinator>,
    ) -> Self {
        Self {
            config,
            queue_receiver,
            coordinator,
        }
    }

    /// 启动 Worker
    ///
    /// 队列关闭或收到 shutdown 后停止领取新任务，并等待进行中的任务结束
    pub async fn run(mut self, shutdown: CancellationToken) {
        let max_concurrent = self.config.max_concurrent_jobs.max(1);
        tracing::info!(max_concurrent, "JobWorker started");

        // 使用 semaphore 控制并发
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        loop {
            let job_id = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.queue_receiver.recv() => match received {
                    Some(job_id) => job_id,
                    None => break,
                },
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to acquire semaphore permit");
                    break;
                }
            };

            let coordinator = self.coordinator.clone();
            tokio::spawn(async move {
                let _permit = permit; // 持有 permit 直到任务结束

                if let Some(job) = coordinator.process(job_id).await {
                    tracing::debug!(
                        job_id = %job_id,
                        status = %job.status(),
                        "Job finished"
                    );
                }
            });
        }

        tracing::info!("JobWorker draining in-flight jobs");
        // 全部 permit 归还即所有任务已结束
        let _ = semaphore.acquire_many(max_concurrent as u32).await;
        tracing::info!("JobWorker stopped");
    }
}
