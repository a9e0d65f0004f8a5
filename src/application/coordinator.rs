//! JobCoordinator - 任务状态机驱动
//!
//! Pending -> Processing -> {Completed | Failed | Cancelled}
//!
//! 章节按顺序处理；每完成一章持久化一次进度。
//! 某章失败则任务失败，已完成章节的 URL 保留，后续章节不再处理。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::assembler::{ChapterAssembler, ChapterError};
use super::ports::{ArtifactStoragePort, JobRegistryPort, JobRepositoryPort};
use crate::domain::job::{Job, JobId};

/// 单个章节的处理结果
enum ChapterOutcome {
    Stored(String),
    Failed(String),
    Cancelled,
}

/// 任务协调器
pub struct JobCoordinator {
    assembler: Arc<ChapterAssembler>,
    storage: Arc<dyn ArtifactStoragePort>,
    registry: Arc<dyn JobRegistryPort>,
    repository: Arc<dyn JobRepositoryPort>,
}

impl JobCoordinator {
    pub fn new(
        assembler: Arc<ChapterAssembler>,
        storage: Arc<dyn ArtifactStoragePort>,
        registry: Arc<dyn JobRegistryPort>,
        repository: Arc<dyn JobRepositoryPort>,
    ) -> Self {
        Self {
            assembler,
            storage,
            registry,
            repository,
        }
    }

    /// 处理一个任务直到终态，返回终态快照
    ///
    /// 任务不存在或已被领取 / 取消时返回 None
    pub async fn process(&self, job_id: JobId) -> Option<Job> {
        let Some((mut job, cancel)) = self.registry.claim(&job_id) else {
            tracing::debug!(job_id = %job_id, "Job not claimable, skipping");
            return None;
        };

        tracing::info!(
            job_id = %job_id,
            title = %job.title(),
            chapters = job.total_chapters(),
            "Job started"
        );
        self.persist(&job).await;

        let total = job.total_chapters();
        for chapter_index in 0..total {
            if cancel.is_cancelled() {
                self.finish_cancelled(&mut job).await;
                return Some(job);
            }

            match self.run_chapter(&job, chapter_index, &cancel).await {
                ChapterOutcome::Stored(url) => {
                    if let Err(e) = job.record_chapter(url) {
                        tracing::error!(job_id = %job_id, error = %e, "Failed to record chapter");
                        self.finish_failed(&mut job, e.to_string()).await;
                        return Some(job);
                    }
                    tracing::info!(
                        job_id = %job_id,
                        chapter_index,
                        processed = job.processed_chapters(),
                        total,
                        progress = job.progress_percent(),
                        "Chapter completed"
                    );
                    self.registry.publish(&job);
                    self.persist(&job).await;
                }
                ChapterOutcome::Failed(message) => {
                    self.finish_failed(&mut job, message).await;
                    return Some(job);
                }
                ChapterOutcome::Cancelled => {
                    self.finish_cancelled(&mut job).await;
                    return Some(job);
                }
            }
        }

        if cancel.is_cancelled() {
            self.finish_cancelled(&mut job).await;
            return Some(job);
        }

        match job.complete() {
            Ok(()) => {
                tracing::info!(job_id = %job_id, chapters = total, "Job completed");
                self.registry.publish(&job);
                self.persist(&job).await;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to complete job");
                self.finish_failed(&mut job, e.to_string()).await;
            }
        }

        Some(job)
    }

    async fn run_chapter(
        &self,
        job: &Job,
        chapter_index: usize,
        cancel: &CancellationToken,
    ) -> ChapterOutcome {
        let chapter = &job.chapters()[chapter_index];

        let artifact = match self
            .assembler
            .assemble(chapter_index, chapter, job.voice_id(), cancel)
            .await
        {
            Ok(artifact) => artifact,
            Err(ChapterError::Cancelled) => return ChapterOutcome::Cancelled,
            Err(e) => {
                tracing::error!(
                    job_id = %job.id(),
                    chapter_index,
                    error = %e,
                    "Chapter failed"
                );
                return ChapterOutcome::Failed(e.to_string());
            }
        };

        match self
            .storage
            .store_audio(&artifact.bytes, &artifact.content_hash())
            .await
        {
            Ok(url) => ChapterOutcome::Stored(url),
            Err(e) => {
                tracing::error!(
                    job_id = %job.id(),
                    chapter_index,
                    error = %e,
                    "Failed to store chapter audio"
                );
                ChapterOutcome::Failed(format!(
                    "Chapter {} ({}) failed: {}",
                    chapter_index + 1,
                    chapter.title(),
                    e
                ))
            }
        }
    }

    async fn finish_failed(&self, job: &mut Job, message: String) {
        if let Err(e) = job.fail(message) {
            tracing::warn!(job_id = %job.id(), error = %e, "Job already terminal, ignoring failure");
            return;
        }
        tracing::warn!(
            job_id = %job.id(),
            processed = job.processed_chapters(),
            error = ?job.error(),
            "Job failed"
        );
        self.registry.publish(job);
        self.persist(job).await;
    }

    async fn finish_cancelled(&self, job: &mut Job) {
        if let Err(e) = job.cancel() {
            tracing::warn!(job_id = %job.id(), error = %e, "Job already terminal, ignoring cancel");
            return;
        }
        tracing::info!(
            job_id = %job.id(),
            processed = job.processed_chapters(),
            "Job cancelled"
        );
        self.registry.publish(job);
        self.persist(job).await;
    }

    /// 持久化失败只记录日志，任务继续
    async fn persist(&self, job: &Job) {
        if let Err(e) = self.repository.save_progress(job.id(), &job.progress()).await {
            tracing::error!(
                job_id = %job.id(),
                status = %job.status(),
                error = %e,
                "Failed to persist job progress"
            );
        }
    }
}
