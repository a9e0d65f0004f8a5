//! Job HTTP Handlers

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::application::{CancelJob, GetJob, ListJobs, ResumeJob, SubmitJob, TextInput};
use crate::domain::job::JobId;
use crate::infrastructure::http::dto::{
    ApiResponse, JobIdRequest, JobResponse, ListJobsParams, SubmitJobRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 提交有声书生成任务（立即返回，通过 /api/job/get 轮询进度）
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitJobRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let input = match (req.text, req.upload_ref) {
        (Some(text), None) => TextInput::Text(text),
        (None, Some(upload_ref)) => TextInput::Upload(upload_ref),
        _ => {
            return Err(ApiError::BadRequest(
                "Exactly one of text or upload_ref is required".to_string(),
            ))
        }
    };

    let job = state
        .submit_job_handler
        .handle(SubmitJob {
            title: req.title,
            voice_id: req.voice_id,
            input,
        })
        .await?;

    Ok(Json(ApiResponse::success(JobResponse::from(&job))))
}

/// 获取任务快照
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = state
        .get_job_handler
        .handle(GetJob {
            job_id: JobId::from_uuid(req.id),
        })
        .await?;

    Ok(Json(ApiResponse::success(JobResponse::from(&job))))
}

/// 获取任务列表（按创建时间倒序）
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ApiResponse<Vec<JobResponse>>>, ApiError> {
    let query = params
        .limit
        .map(|limit| ListJobs { limit })
        .unwrap_or_default();
    let jobs = state.list_jobs_handler.handle(query).await?;

    Ok(Json(ApiResponse::success(
        jobs.iter().map(JobResponse::from).collect(),
    )))
}

/// 取消任务
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = state
        .cancel_job_handler
        .handle(CancelJob {
            job_id: JobId::from_uuid(req.id),
        })
        .await?;

    Ok(Json(ApiResponse::success(JobResponse::from(&job))))
}

/// 基于失败 / 取消的任务重新生成
pub async fn resume_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    let job = state
        .resume_job_handler
        .handle(ResumeJob {
            job_id: JobId::from_uuid(req.id),
        })
        .await?;

    Ok(Json(ApiResponse::success(JobResponse::from(&job))))
}
