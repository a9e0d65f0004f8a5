//! Data Transfer Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::ports::CacheStats;
use crate::application::SynthesisStats;
use crate::domain::job::Job;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

// ============================================================================
// Job DTOs
// ============================================================================

/// 提交任务请求，`text` 与 `upload_ref` 二选一
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub title: String,
    pub voice_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub upload_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobIdRequest {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ChapterSummary {
    pub index: usize,
    pub title: String,
    pub char_count: usize,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub title: String,
    pub voice_id: String,
    pub status: String,
    pub total_chapters: usize,
    pub processed_chapters: usize,
    pub progress_percent: u8,
    pub chapters: Vec<ChapterSummary>,
    pub audio_urls: Vec<String>,
    pub error: Option<String>,
    pub resumed_from: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Job> for JobResponse {
    fn from(job: &Job) -> Self {
        Self {
            id: *job.id().as_uuid(),
            title: job.title().to_string(),
            voice_id: job.voice_id().as_str().to_string(),
            status: job.status().as_str().to_string(),
            total_chapters: job.total_chapters(),
            processed_chapters: job.processed_chapters(),
            progress_percent: job.progress_percent(),
            chapters: job
                .chapters()
                .iter()
                .enumerate()
                .map(|(index, chapter)| ChapterSummary {
                    index,
                    title: chapter.title().to_string(),
                    char_count: chapter.text().chars().count(),
                })
                .collect(),
            audio_urls: job.audio_urls().to_vec(),
            error: job.error().map(str::to_string),
            resumed_from: job.resumed_from().map(|id| *id.as_uuid()),
            created_at: job.created_at().to_rfc3339(),
            updated_at: job.updated_at().to_rfc3339(),
        }
    }
}

// ============================================================================
// Stats DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub max_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            total_entries: stats.total_entries,
            total_size_bytes: stats.total_size_bytes,
            max_size_bytes: stats.max_size_bytes,
            hit_count: stats.hit_count,
            miss_count: stats.miss_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub synthesis: SynthesisStats,
    pub cache: CacheStatsResponse,
}
