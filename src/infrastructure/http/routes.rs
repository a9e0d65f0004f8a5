//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping           GET   健康检查
//! - /api/stats          GET   合成客户端与缓存统计
//! - /api/job/submit     POST  提交任务（立即返回，后台生成）
//! - /api/job/get        POST  获取任务进度快照
//! - /api/job/list       GET   列出最近的任务
//! - /api/job/cancel     POST  取消任务
//! - /api/job/resume     POST  基于失败 / 取消的任务重新生成
//! - /audio/{file}       GET   章节音频文件

use axum::{
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes(audio_dir: &Path) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .nest_service("/audio", ServeDir::new(audio_dir))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/stats", get(handlers::get_stats))
        .nest("/job", job_routes())
}

/// Job 路由
fn job_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/submit", post(handlers::submit_job))
        .route("/get", post(handlers::get_job))
        .route("/list", get(handlers::list_jobs))
        .route("/cancel", post(handlers::cancel_job))
        .route("/resume", post(handlers::resume_job))
}
