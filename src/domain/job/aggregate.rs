//! Job Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobError, JobId, JobStatus};
use crate::domain::book::{Chapter, VoiceId};

/// Job 聚合根
///
/// 不变量:
/// - 只能通过状态机方法修改
/// - processed_chapters 单调不减，audio_urls 与已完成章节一一对应
/// - 终态（Completed / Failed / Cancelled）不可再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    title: String,
    voice_id: VoiceId,
    status: JobStatus,
    chapters: Vec<Chapter>,
    processed_chapters: usize,
    progress_percent: u8,
    audio_urls: Vec<String>,
    error: Option<String>,
    resumed_from: Option<JobId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 从持久化数据重建 Job 时使用
#[derive(Debug, Clone)]
pub struct JobParts {
    pub id: JobId,
    pub title: String,
    pub voice_id: VoiceId,
    pub status: JobStatus,
    pub chapters: Vec<Chapter>,
    pub processed_chapters: usize,
    pub audio_urls: Vec<String>,
    pub error: Option<String>,
    pub resumed_from: Option<JobId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 进度快照（每次状态转换 / 章节完成后持久化）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgress {
    pub status: JobStatus,
    pub processed_chapters: usize,
    pub progress_percent: u8,
    pub audio_urls: Vec<String>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// 创建新任务（Pending）
    pub fn new(title: impl Into<String>, voice_id: VoiceId, chapters: Vec<Chapter>) -> Result<Self, JobError> {
        if chapters.is_empty() {
            return Err(JobError::NoChapters);
        }

        let now = Utc::now();
        Ok(Self {
            id: JobId::new(),
            title: title.into(),
            voice_id,
            status: JobStatus::Pending,
            chapters,
            processed_chapters: 0,
            progress_percent: 0,
            audio_urls: Vec::new(),
            error: None,
            resumed_from: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// 基于已结束（失败 / 取消）的任务创建新任务
    ///
    /// 章节与音色不变，已合成的分块会命中缓存
    pub fn resume(previous: &Job) -> Result<Self, JobError> {
        if !matches!(previous.status, JobStatus::Failed | JobStatus::Cancelled) {
            return Err(JobError::InvalidTransition {
                from: previous.status,
                to: JobStatus::Pending,
            });
        }

        let mut job = Self::new(
            previous.title.clone(),
            previous.voice_id.clone(),
            previous.chapters.clone(),
        )?;
        job.resumed_from = Some(previous.id);
        Ok(job)
    }

    /// 从持久化数据重建
    pub fn restore(parts: JobParts) -> Self {
        let progress_percent = progress_of(parts.processed_chapters, parts.chapters.len());
        Self {
            id: parts.id,
            title: parts.title,
            voice_id: parts.voice_id,
            status: parts.status,
            chapters: parts.chapters,
            processed_chapters: parts.processed_chapters,
            progress_percent,
            audio_urls: parts.audio_urls,
            error: parts.error,
            resumed_from: parts.resumed_from,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    /// Pending -> Processing
    pub fn start(&mut self) -> Result<(), JobError> {
        self.ensure_not_terminal()?;
        if self.status != JobStatus::Pending {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Processing,
            });
        }

        self.status = JobStatus::Processing;
        self.processed_chapters = 0;
        self.progress_percent = 0;
        self.touch();
        Ok(())
    }

    /// 记录一个章节完成
    pub fn record_chapter(&mut self, audio_url: impl Into<String>) -> Result<(), JobError> {
        self.ensure_processing(JobStatus::Processing)?;
        if self.processed_chapters >= self.chapters.len() {
            return Err(JobError::ChaptersRemaining {
                processed: self.processed_chapters,
                total: self.chapters.len(),
            });
        }

        self.audio_urls.push(audio_url.into());
        self.processed_chapters += 1;
        self.progress_percent = progress_of(self.processed_chapters, self.chapters.len());
        self.touch();
        Ok(())
    }

    /// Processing -> Completed（所有章节必须已完成）
    pub fn complete(&mut self) -> Result<(), JobError> {
        self.ensure_processing(JobStatus::Completed)?;
        if self.processed_chapters != self.chapters.len() {
            return Err(JobError::ChaptersRemaining {
                processed: self.processed_chapters,
                total: self.chapters.len(),
            });
        }

        self.status = JobStatus::Completed;
        self.progress_percent = 100;
        self.touch();
        Ok(())
    }

    /// -> Failed，已完成章节的 URL 保留
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        self.ensure_not_terminal()?;
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.touch();
        Ok(())
    }

    /// -> Cancelled
    pub fn cancel(&mut self) -> Result<(), JobError> {
        self.ensure_not_terminal()?;
        self.status = JobStatus::Cancelled;
        self.touch();
        Ok(())
    }

    /// 当前进度快照
    pub fn progress(&self) -> JobProgress {
        JobProgress {
            status: self.status,
            processed_chapters: self.processed_chapters,
            progress_percent: self.progress_percent,
            audio_urls: self.audio_urls.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }

    fn ensure_not_terminal(&self) -> Result<(), JobError> {
        if self.status.is_terminal() {
            return Err(JobError::AlreadyTerminal {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    fn ensure_processing(&self, to: JobStatus) -> Result<(), JobError> {
        self.ensure_not_terminal()?;
        if self.status != JobStatus::Processing {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // Getters
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn voice_id(&self) -> &VoiceId {
        &self.voice_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn total_chapters(&self) -> usize {
        self.chapters.len()
    }

    pub fn processed_chapters(&self) -> usize {
        self.processed_chapters
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn audio_urls(&self) -> &[String] {
        &self.audio_urls
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn resumed_from(&self) -> Option<&JobId> {
        self.resumed_from.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// round(processed / total * 100)
fn progress_of(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (processed as f64 / total as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}
