//! SQLite Job Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;
use crate::application::ports::{JobRepositoryPort, RepositoryError};
use crate::domain::book::{Chapter, VoiceId};
use crate::domain::job::{Job, JobId, JobParts, JobProgress, JobStatus};

/// SQLite Job Repository
pub struct SqliteJobRepository {
    pool: DbPool,
}

impl SqliteJobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, title, voice_id, status, chapters, processed_chapters, \
     audio_urls, error, resumed_from, created_at, updated_at FROM jobs";

#[derive(FromRow)]
struct JobRow {
    id: String,
    title: String,
    voice_id: String,
    status: String,
    chapters: String,
    processed_chapters: i64,
    audio_urls: String,
    error: Option<String>,
    resumed_from: Option<String>,
    created_at: String,
    updated_at: String,
}

fn parse_id(value: &str) -> Result<JobId, RepositoryError> {
    Uuid::parse_str(value)
        .map(JobId::from_uuid)
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

impl TryFrom<JobRow> for Job {
    type Error = RepositoryError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let chapters: Vec<Chapter> = serde_json::from_str(&row.chapters)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let audio_urls: Vec<String> = serde_json::from_str(&row.audio_urls)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let status = JobStatus::from_str(&row.status).ok_or_else(|| {
            RepositoryError::SerializationError(format!("unknown job status: {}", row.status))
        })?;

        Ok(Job::restore(JobParts {
            id: parse_id(&row.id)?,
            title: row.title,
            voice_id: VoiceId::new(row.voice_id)
                .map_err(|e| RepositoryError::SerializationError(e.to_string()))?,
            status,
            chapters,
            processed_chapters: row.processed_chapters.max(0) as usize,
            audio_urls,
            error: row.error,
            resumed_from: row.resumed_from.as_deref().map(parse_id).transpose()?,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        }))
    }
}

#[async_trait]
impl JobRepositoryPort for SqliteJobRepository {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        let chapters = serde_json::to_string(job.chapters())
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let audio_urls = serde_json::to_string(job.audio_urls())
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO jobs (id, title, voice_id, status, chapters, total_chapters,
                processed_chapters, progress_percent, audio_urls, error, resumed_from,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id().to_string())
        .bind(job.title())
        .bind(job.voice_id().as_str())
        .bind(job.status().as_str())
        .bind(chapters)
        .bind(job.total_chapters() as i64)
        .bind(job.processed_chapters() as i64)
        .bind(job.progress_percent() as i64)
        .bind(audio_urls)
        .bind(job.error())
        .bind(job.resumed_from().map(|id| id.to_string()))
        .bind(job.created_at().to_rfc3339())
        .bind(job.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(RepositoryError::Duplicate(job.id().to_string()))
            }
            Err(e) => Err(RepositoryError::DatabaseError(e.to_string())),
        }
    }

    async fn save_progress(
        &self,
        job_id: &JobId,
        progress: &JobProgress,
    ) -> Result<(), RepositoryError> {
        let audio_urls = serde_json::to_string(&progress.audio_urls)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;

        // 终态记录不再更新
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                status = ?,
                processed_chapters = ?,
                progress_percent = ?,
                audio_urls = ?,
                error = ?,
                updated_at = ?
            WHERE id = ? AND status NOT IN ('completed', 'failed', 'cancelled')
            "#,
        )
        .bind(progress.status.as_str())
        .bind(progress.processed_chapters as i64)
        .bind(progress.progress_percent as i64)
        .bind(audio_urls)
        .bind(progress.error.as_deref())
        .bind(progress.updated_at.to_rfc3339())
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            let exists: Option<(String,)> = sqlx::query_as("SELECT status FROM jobs WHERE id = ?")
                .bind(job_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

            match exists {
                Some((status,)) => {
                    tracing::debug!(
                        job_id = %job_id,
                        stored = %status,
                        incoming = %progress.status,
                        "Ignoring progress for terminal job"
                    );
                }
                None => return Err(RepositoryError::NotFound(job_id.to_string())),
            }
        }

        Ok(())
    }

    async fn load(&self, job_id: &JobId) -> Result<Option<Job>, RepositoryError> {
        let row: Option<JobRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.map(Job::try_from).transpose()
    }

    async fn list(&self, limit: u32) -> Result<Vec<Job>, RepositoryError> {
        let rows: Vec<JobRow> =
            sqlx::query_as(&format!("{} ORDER BY created_at DESC LIMIT ?", SELECT_COLUMNS))
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(Job::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};

    async fn repo() -> SqliteJobRepository {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteJobRepository::new(pool)
    }

    fn job() -> Job {
        Job::new(
            "Test Book",
            VoiceId::new("voice-a").unwrap(),
            vec![
                Chapter::new("Chapter 1", "First."),
                Chapter::new("Chapter 2", "Second."),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_load() {
        let repo = repo().await;
        let job = job();
        repo.create(&job).await.unwrap();

        let loaded = repo.load(job.id()).await.unwrap().unwrap();
        assert_eq!(loaded.id(), job.id());
        assert_eq!(loaded.title(), "Test Book");
        assert_eq!(loaded.voice_id().as_str(), "voice-a");
        assert_eq!(loaded.chapters(), job.chapters());
        assert_eq!(loaded.status(), JobStatus::Pending);

        assert!(repo.load(&JobId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create() {
        let repo = repo().await;
        let job = job();
        repo.create(&job).await.unwrap();
        assert!(matches!(
            repo.create(&job).await,
            Err(RepositoryError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_save_progress() {
        let repo = repo().await;
        let mut job = job();
        repo.create(&job).await.unwrap();

        job.start().unwrap();
        job.record_chapter("http://h/audio/a.mp3").unwrap();
        repo.save_progress(job.id(), &job.progress()).await.unwrap();

        let loaded = repo.load(job.id()).await.unwrap().unwrap();
        assert_eq!(loaded.status(), JobStatus::Processing);
        assert_eq!(loaded.processed_chapters(), 1);
        assert_eq!(loaded.progress_percent(), 50);
        assert_eq!(loaded.audio_urls(), &["http://h/audio/a.mp3".to_string()]);
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let repo = repo().await;
        let mut job = job();
        repo.create(&job).await.unwrap();

        job.start().unwrap();
        let running = job.progress();
        job.fail("Chapter 1 failed").unwrap();
        repo.save_progress(job.id(), &job.progress()).await.unwrap();

        // 迟到的旧快照不会覆盖终态
        repo.save_progress(job.id(), &running).await.unwrap();

        let loaded = repo.load(job.id()).await.unwrap().unwrap();
        assert_eq!(loaded.status(), JobStatus::Failed);
        assert_eq!(loaded.error(), Some("Chapter 1 failed"));
    }

    #[tokio::test]
    async fn test_save_progress_unknown_job() {
        let repo = repo().await;
        let job = job();
        assert!(matches!(
            repo.save_progress(job.id(), &job.progress()).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let repo = repo().await;
        let first = job();
        repo.create(&first).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = job();
        repo.create(&second).await.unwrap();

        let jobs = repo.list(10).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id(), second.id());

        assert_eq!(repo.list(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resumed_from_roundtrip() {
        let repo = repo().await;
        let mut original = job();
        original.cancel().unwrap();
        let resumed = Job::resume(&original).unwrap();
        repo.create(&resumed).await.unwrap();

        let loaded = repo.load(resumed.id()).await.unwrap().unwrap();
        assert_eq!(loaded.resumed_from(), Some(original.id()));
    }
}
