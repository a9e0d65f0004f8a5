//! Job Query Handlers

use std::collections::HashSet;
use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{JobRegistryPort, JobRepositoryPort};
use crate::application::queries::{GetJob, ListJobs};
use crate::domain::job::Job;

/// GetJob Handler - 实时快照优先，仓储兜底
pub struct GetJobHandler {
    registry: Arc<dyn JobRegistryPort>,
    repository: Arc<dyn JobRepositoryPort>,
}

impl GetJobHandler {
    pub fn new(registry: Arc<dyn JobRegistryPort>, repository: Arc<dyn JobRepositoryPort>) -> Self {
        Self {
            registry,
            repository,
        }
    }

    pub async fn handle(&self, query: GetJob) -> Result<Job, ApplicationError> {
        if let Some(job) = self.registry.snapshot(&query.job_id) {
            return Ok(job);
        }

        self.repository
            .load(&query.job_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Job", *query.job_id.as_uuid()))
    }
}

/// ListJobs Handler
pub struct ListJobsHandler {
    registry: Arc<dyn JobRegistryPort>,
    repository: Arc<dyn JobRepositoryPort>,
}

impl ListJobsHandler {
    pub fn new(registry: Arc<dyn JobRegistryPort>, repository: Arc<dyn JobRepositoryPort>) -> Self {
        Self {
            registry,
            repository,
        }
    }

    /// 合并登记表与仓储，同一任务以实时快照为准，按创建时间倒序
    pub async fn handle(&self, query: ListJobs) -> Result<Vec<Job>, ApplicationError> {
        let limit = query.limit.max(1);

        let mut jobs = self.registry.list();
        let mut seen: HashSet<_> = jobs.iter().map(|job| *job.id()).collect();

        for job in self.repository.list(limit).await? {
            if seen.insert(*job.id()) {
                jobs.push(job);
            }
        }

        jobs.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        jobs.truncate(limit as usize);
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::domain::book::{Chapter, VoiceId};
    use crate::domain::job::{JobId, JobStatus};
    use crate::infrastructure::memory::InMemoryJobRegistry;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteJobRepository,
    };

    fn job(title: &str) -> Job {
        Job::new(
            title,
            VoiceId::new("voice-a").unwrap(),
            vec![Chapter::new("Chapter 1", "Text.")],
        )
        .unwrap()
    }

    async fn setup() -> (
        Arc<InMemoryJobRegistry>,
        Arc<SqliteJobRepository>,
        mpsc::Receiver<JobId>,
    ) {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let (tx, rx) = mpsc::channel(16);
        (
            InMemoryJobRegistry::new(tx).arc(),
            Arc::new(SqliteJobRepository::new(pool)),
            rx,
        )
    }

    #[tokio::test]
    async fn test_get_prefers_live_snapshot() {
        let (registry, repository, _queue) = setup().await;
        let job = job("Live");
        repository.create(&job).await.unwrap();
        registry.submit(job.clone()).unwrap();
        registry.claim(job.id()).unwrap();

        let handler = GetJobHandler::new(registry, repository);
        let found = handler.handle(GetJob { job_id: *job.id() }).await.unwrap();
        // 仓储中仍是 Pending，实时快照已是 Processing
        assert_eq!(found.status(), JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_get_falls_back_to_repository() {
        let (registry, repository, _queue) = setup().await;
        let job = job("Stored");
        repository.create(&job).await.unwrap();

        let handler = GetJobHandler::new(registry, repository);
        let found = handler.handle(GetJob { job_id: *job.id() }).await.unwrap();
        assert_eq!(found.id(), job.id());

        assert!(matches!(
            handler.handle(GetJob { job_id: JobId::new() }).await,
            Err(ApplicationError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_merges_and_dedupes() {
        let (registry, repository, _queue) = setup().await;
        let stored = job("Stored");
        repository.create(&stored).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let live = job("Live");
        repository.create(&live).await.unwrap();
        registry.submit(live.clone()).unwrap();

        let handler = ListJobsHandler::new(registry, repository);
        let jobs = handler.handle(ListJobs::default()).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id(), live.id());
        assert_eq!(jobs[1].id(), stored.id());

        let jobs = handler.handle(ListJobs { limit: 1 }).await.unwrap();
        assert_eq!(jobs.len(), 1);
    }
}
