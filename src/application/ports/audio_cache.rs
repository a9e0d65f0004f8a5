//! Audio Cache Port - 分块音频缓存
//!
//! 内容寻址: 相同 (文本, 音色) 只会调用一次语音合成服务。
//! 具体实现使用 Sled (持久化 LRU) 或内存 DashMap。

use async_trait::async_trait;
use thiserror::Error;

/// Audio Cache 错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// 缓存元数据
#[derive(Debug, Clone, PartialEq)]
pub struct CacheMetadata {
    pub voice_id: String,
    pub char_count: usize,
    /// 服务端报告的时长，估算值不缓存
    pub duration_ms: Option<u64>,
}

/// 缓存命中内容
#[derive(Debug, Clone)]
pub struct CachedAudio {
    pub audio_data: Vec<u8>,
    pub metadata: CacheMetadata,
}

/// Audio Cache Port
///
/// 条目不按时间过期，只在超过容量时按 LRU 淘汰
#[async_trait]
pub trait AudioCachePort: Send + Sync {
    /// 存储音频数据，同 key 后写覆盖先写
    async fn put(
        &self,
        cache_key: &str,
        audio_data: Vec<u8>,
        metadata: CacheMetadata,
    ) -> Result<(), CacheError>;

    /// 获取音频数据，同时刷新 last_accessed（LRU touch）
    async fn get(&self, cache_key: &str) -> Result<Option<CachedAudio>, CacheError>;

    async fn exists(&self, cache_key: &str) -> Result<bool, CacheError>;

    async fn remove(&self, cache_key: &str) -> Result<(), CacheError>;

    async fn stats(&self) -> CacheStats;

    /// 落盘（进程退出前调用）
    async fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub max_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// 生成缓存 key
///
/// md5(规范化文本 + 0x1F + voice_id)，规范化把连续空白折叠为单个空格
pub fn generate_cache_key(text: &str, voice_id: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut context = md5::Context::new();
    context.consume(normalized.as_bytes());
    context.consume(b"\x1f");
    context.consume(voice_id.as_bytes());
    format!("{:x}", context.compute())
}
