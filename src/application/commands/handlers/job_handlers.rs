//! Job Command Handlers

use std::sync::Arc;

use crate::application::commands::{CancelJob, ResumeJob, SubmitJob, TextInput};
use crate::application::error::ApplicationError;
use crate::application::ports::{
    CancelOutcome, JobRegistryPort, JobRepositoryPort, RegistryError, TextSourcePort,
};
use crate::domain::book::VoiceId;
use crate::domain::job::Job;
use crate::domain::ChapterDetector;

// ============================================================================
// SubmitJob
// ============================================================================

/// SubmitJob Handler - 检测章节、落库并投递到队列
pub struct SubmitJobHandler {
    detector: ChapterDetector,
    text_source: Arc<dyn TextSourcePort>,
    registry: Arc<dyn JobRegistryPort>,
    repository: Arc<dyn JobRepositoryPort>,
}

impl SubmitJobHandler {
    pub fn new(
        text_source: Arc<dyn TextSourcePort>,
        registry: Arc<dyn JobRegistryPort>,
        repository: Arc<dyn JobRepositoryPort>,
    ) -> Self {
        Self {
            detector: ChapterDetector::new(),
            text_source,
            registry,
            repository,
        }
    }

    pub async fn handle(&self, command: SubmitJob) -> Result<Job, ApplicationError> {
        let title = command.title.trim();
        if title.is_empty() {
            return Err(ApplicationError::validation("Title must not be empty"));
        }
        let voice_id = VoiceId::new(command.voice_id)?;

        let raw_text = match command.input {
            TextInput::Text(text) => text,
            TextInput::Upload(upload_ref) => self.text_source.raw_text(&upload_ref).await?,
        };
        if raw_text.trim().is_empty() {
            return Err(ApplicationError::validation("Text must not be empty"));
        }

        let chapters = self.detector.detect(&raw_text);
        let job = Job::new(title, voice_id, chapters)?;

        self.repository.create(&job).await?;
        enqueue_job(self.registry.as_ref(), self.repository.as_ref(), job).await
    }
}

/// 登记并投递；队列不可用时把已落库的记录置为 Failed
async fn enqueue_job(
    registry: &dyn JobRegistryPort,
    repository: &dyn JobRepositoryPort,
    job: Job,
) -> Result<Job, ApplicationError> {
    match registry.submit(job.clone()) {
        Ok(()) => {
            tracing::info!(
                job_id = %job.id(),
                title = %job.title(),
                voice_id = %job.voice_id(),
                chapters = job.total_chapters(),
                "Job submitted"
            );
            Ok(job)
        }
        Err(e) => {
            tracing::error!(job_id = %job.id(), error = %e, "Failed to enqueue job");
            let mut rejected = job;
            if rejected.fail(e.to_string()).is_ok() {
                if let Err(persist_err) = repository
                    .save_progress(rejected.id(), &rejected.progress())
                    .await
                {
                    tracing::error!(
                        job_id = %rejected.id(),
                        error = %persist_err,
                        "Failed to persist rejected job"
                    );
                }
            }
            match e {
                RegistryError::QueueFull => Err(ApplicationError::ExternalServiceError(
                    "Job queue is full, try again later".to_string(),
                )),
                other => Err(other.into()),
            }
        }
    }
}

// ============================================================================
// CancelJob
// ============================================================================

/// CancelJob Handler
///
/// 未开始的任务直接置为 Cancelled；运行中的任务只发信号，由 worker 在下一个
/// 检查点收尾。返回当前快照。
pub struct CancelJobHandler {
    registry: Arc<dyn JobRegistryPort>,
    repository: Arc<dyn JobRepositoryPort>,
}

impl CancelJobHandler {
    pub fn new(registry: Arc<dyn JobRegistryPort>, repository: Arc<dyn JobRepositoryPort>) -> Self {
        Self {
            registry,
            repository,
        }
    }

    pub async fn handle(&self, command: CancelJob) -> Result<Job, ApplicationError> {
        let job_id = command.job_id;

        match self.registry.request_cancel(&job_id) {
            CancelOutcome::CancelledPending(job) => {
                self.repository.save_progress(job.id(), &job.progress()).await?;
                tracing::info!(job_id = %job_id, "Pending job cancelled");
                Ok(job)
            }
            CancelOutcome::Signalled => {
                tracing::info!(job_id = %job_id, "Cancellation signalled to running job");
                self.registry
                    .snapshot(&job_id)
                    .ok_or_else(|| ApplicationError::not_found("Job", *job_id.as_uuid()))
            }
            CancelOutcome::AlreadyTerminal(job) => Err(ApplicationError::invalid_state(format!(
                "Job {} is already {}",
                job_id,
                job.status()
            ))),
            CancelOutcome::NotFound => self.cancel_orphaned(command).await,
        }
    }

    /// 仓储中存在但不在登记表中的任务（例如进程重启后遗留的 Processing 记录）
    async fn cancel_orphaned(&self, command: CancelJob) -> Result<Job, ApplicationError> {
        let job_id = command.job_id;
        let mut job = self
            .repository
            .load(&job_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Job", *job_id.as_uuid()))?;

        if job.status().is_terminal() {
            return Err(ApplicationError::invalid_state(format!(
                "Job {} is already {}",
                job_id,
                job.status()
            )));
        }

        job.cancel()?;
        self.repository.save_progress(job.id(), &job.progress()).await?;
        tracing::warn!(job_id = %job_id, "Orphaned job cancelled from repository");
        Ok(job)
    }
}

// ============================================================================
// ResumeJob
// ============================================================================

/// ResumeJob Handler - 以失败 / 取消的任务为模板创建新任务
///
/// 已合成的分块命中缓存，不会重复调用 provider
pub struct ResumeJobHandler {
    registry: Arc<dyn JobRegistryPort>,
    repository: Arc<dyn JobRepositoryPort>,
}

impl ResumeJobHandler {
    pub fn new(registry: Arc<dyn JobRegistryPort>, repository: Arc<dyn JobRepositoryPort>) -> Self {
        Self {
            registry,
            repository,
        }
    }

    pub async fn handle(&self, command: ResumeJob) -> Result<Job, ApplicationError> {
        let job_id = command.job_id;

        let previous = match self.registry.snapshot(&job_id) {
            Some(job) => job,
            None => self
                .repository
                .load(&job_id)
                .await?
                .ok_or_else(|| ApplicationError::not_found("Job", *job_id.as_uuid()))?,
        };

        let job = Job::resume(&previous).map_err(|_| {
            ApplicationError::validation(format!(
                "Only failed or cancelled jobs can be resumed, job {} is {}",
                job_id,
                previous.status()
            ))
        })?;

        self.repository.create(&job).await?;
        tracing::info!(job_id = %job.id(), resumed_from = %job_id, "Job resumed");
        enqueue_job(self.registry.as_ref(), self.repository.as_ref(), job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::application::ports::TextSourceError;
    use crate::domain::job::{JobId, JobStatus};
    use crate::infrastructure::memory::InMemoryJobRegistry;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteJobRepository,
    };

    struct StaticTextSource;

    #[async_trait]
    impl TextSourcePort for StaticTextSource {
        async fn raw_text(&self, upload_ref: &str) -> Result<String, TextSourceError> {
            match upload_ref {
                "book.txt" => Ok("Chapter 1\nHello world.\n\nChapter 2\nGoodbye.".to_string()),
                other => Err(TextSourceError::NotFound(other.to_string())),
            }
        }
    }

    struct Fixture {
        registry: Arc<InMemoryJobRegistry>,
        repository: Arc<SqliteJobRepository>,
        queue: mpsc::Receiver<JobId>,
    }

    async fn fixture(queue_size: usize) -> Fixture {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let (tx, rx) = mpsc::channel(queue_size);
        Fixture {
            registry: InMemoryJobRegistry::new(tx).arc(),
            repository: Arc::new(SqliteJobRepository::new(pool)),
            queue: rx,
        }
    }

    impl Fixture {
        fn submit_handler(&self) -> SubmitJobHandler {
            SubmitJobHandler::new(
                Arc::new(StaticTextSource),
                self.registry.clone(),
                self.repository.clone(),
            )
        }

        fn cancel_handler(&self) -> CancelJobHandler {
            CancelJobHandler::new(self.registry.clone(), self.repository.clone())
        }

        fn resume_handler(&self) -> ResumeJobHandler {
            ResumeJobHandler::new(self.registry.clone(), self.repository.clone())
        }
    }

    fn submit_text(text: &str) -> SubmitJob {
        SubmitJob {
            title: "My Book".to_string(),
            voice_id: "voice-a".to_string(),
            input: TextInput::Text(text.to_string()),
        }
    }

    #[tokio::test]
    async fn test_submit_job() {
        let mut fx = fixture(8).await;
        let job = fx
            .submit_handler()
            .handle(submit_text("Chapter 1\nHello world. This is a test."))
            .await
            .unwrap();

        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.total_chapters(), 1);
        assert_eq!(job.chapters()[0].title(), "Chapter 1");
        assert_eq!(fx.queue.recv().await, Some(*job.id()));
        assert!(fx.repository.load(job.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_submit_from_upload() {
        let fx = fixture(8).await;
        let job = fx
            .submit_handler()
            .handle(SubmitJob {
                title: "Uploaded".to_string(),
                voice_id: "voice-a".to_string(),
                input: TextInput::Upload("book.txt".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(job.total_chapters(), 2);

        let missing = fx
            .submit_handler()
            .handle(SubmitJob {
                title: "Missing".to_string(),
                voice_id: "voice-a".to_string(),
                input: TextInput::Upload("nope.txt".to_string()),
            })
            .await;
        assert!(matches!(missing, Err(ApplicationError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_input() {
        let fx = fixture(8).await;
        let handler = fx.submit_handler();

        assert!(matches!(
            handler.handle(submit_text("   \n ")).await,
            Err(ApplicationError::ValidationError(_))
        ));

        let mut bad_voice = submit_text("Some text.");
        bad_voice.voice_id = " ".to_string();
        assert!(matches!(
            handler.handle(bad_voice).await,
            Err(ApplicationError::ValidationError(_))
        ));
        assert!(fx.registry.is_empty());
    }

    #[tokio::test]
    async fn test_submit_queue_full_marks_job_failed() {
        let fx = fixture(1).await;
        let handler = fx.submit_handler();
        handler.handle(submit_text("First.")).await.unwrap();

        let err = handler.handle(submit_text("Second.")).await.unwrap_err();
        assert!(matches!(err, ApplicationError::ExternalServiceError(_)));
        assert_eq!(fx.registry.len(), 1);

        let jobs = fx.repository.list(10).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(
            jobs.iter().filter(|j| j.status() == JobStatus::Failed).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_cancel_pending_job() {
        let fx = fixture(8).await;
        let job = fx.submit_handler().handle(submit_text("Text.")).await.unwrap();

        let cancelled = fx
            .cancel_handler()
            .handle(CancelJob { job_id: *job.id() })
            .await
            .unwrap();
        assert_eq!(cancelled.status(), JobStatus::Cancelled);

        let stored = fx.repository.load(job.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), JobStatus::Cancelled);

        // 重复取消
        assert!(matches!(
            fx.cancel_handler().handle(CancelJob { job_id: *job.id() }).await,
            Err(ApplicationError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_running_job_signals() {
        let fx = fixture(8).await;
        let job = fx.submit_handler().handle(submit_text("Text.")).await.unwrap();
        let (_, token) = fx.registry.claim(job.id()).unwrap();

        let snapshot = fx
            .cancel_handler()
            .handle(CancelJob { job_id: *job.id() })
            .await
            .unwrap();
        assert_eq!(snapshot.status(), JobStatus::Processing);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let fx = fixture(8).await;
        assert!(matches!(
            fx.cancel_handler().handle(CancelJob { job_id: JobId::new() }).await,
            Err(ApplicationError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_orphaned_job() {
        let fx = fixture(8).await;
        let mut job = Job::new(
            "Orphan",
            VoiceId::new("voice-a").unwrap(),
            vec![crate::domain::book::Chapter::new("C", "Text.")],
        )
        .unwrap();
        fx.repository.create(&job).await.unwrap();
        job.start().unwrap();
        fx.repository
            .save_progress(job.id(), &job.progress())
            .await
            .unwrap();

        let cancelled = fx
            .cancel_handler()
            .handle(CancelJob { job_id: *job.id() })
            .await
            .unwrap();
        assert_eq!(cancelled.status(), JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_resume_cancelled_job() {
        let mut fx = fixture(8).await;
        let job = fx.submit_handler().handle(submit_text("Text.")).await.unwrap();
        fx.cancel_handler()
            .handle(CancelJob { job_id: *job.id() })
            .await
            .unwrap();

        let resumed = fx
            .resume_handler()
            .handle(ResumeJob { job_id: *job.id() })
            .await
            .unwrap();
        assert_ne!(resumed.id(), job.id());
        assert_eq!(resumed.resumed_from(), Some(job.id()));
        assert_eq!(resumed.status(), JobStatus::Pending);
        assert_eq!(resumed.chapters(), job.chapters());

        assert_eq!(fx.queue.recv().await, Some(*job.id()));
        assert_eq!(fx.queue.recv().await, Some(*resumed.id()));
    }

    #[tokio::test]
    async fn test_resume_rejects_pending_job() {
        let fx = fixture(8).await;
        let job = fx.submit_handler().handle(submit_text("Text.")).await.unwrap();
        assert!(matches!(
            fx.resume_handler().handle(ResumeJob { job_id: *job.id() }).await,
            Err(ApplicationError::ValidationError(_))
        ));
    }
}
