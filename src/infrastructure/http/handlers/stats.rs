//! Stats Handler - 合成客户端与缓存计数

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::infrastructure::http::dto::{ApiResponse, StatsResponse};
use crate::infrastructure::http::state::AppState;

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsResponse>> {
    let cache = state.audio_cache.stats().await;

    Json(ApiResponse::success(StatsResponse {
        synthesis: state.synthesis_client.stats(),
        cache: cache.into(),
    }))
}
