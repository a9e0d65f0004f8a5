//! Sled-based LRU Audio Cache Implementation
//!
//! key 布局: `chunk:<cache_key>` -> bincode(InternalCacheEntry)
//! 访问顺序用单调递增的逻辑时钟记录，淘汰时移除最久未访问的条目

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::application::ports::{
    AudioCachePort, CacheError, CacheMetadata, CacheStats, CachedAudio,
};

const KEY_PREFIX: &str = "chunk:";

/// Sled 缓存配置
#[derive(Debug, Clone)]
pub struct SledCacheConfig {
    /// 数据库路径
    pub db_path: String,
    /// 最大缓存大小（字节）
    pub max_size_bytes: u64,
}

impl Default for SledCacheConfig {
    fn default() -> Self {
        Self {
            db_path: "data/cache.sled".to_string(),
            max_size_bytes: 2 * 1024 * 1024 * 1024, // 2GB
        }
    }
}

/// 内部缓存条目
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InternalCacheEntry {
    audio_data: Vec<u8>,
    size_bytes: u64,
    voice_id: String,
    char_count: usize,
    duration_ms: Option<u64>,
    /// 逻辑访问时钟
    last_accessed: u64,
    created_at: i64,
}

impl InternalCacheEntry {
    fn into_cached(self) -> CachedAudio {
        CachedAudio {
            audio_data: self.audio_data,
            metadata: CacheMetadata {
                voice_id: self.voice_id,
                char_count: self.char_count,
                duration_ms: self.duration_ms,
            },
        }
    }
}

/// Sled 音频缓存
pub struct SledAudioCache {
    db: Db,
    max_size_bytes: u64,
    current_size: AtomicU64,
    access_clock: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl SledAudioCache {
    /// 创建新的缓存实例
    pub fn new(config: &SledCacheConfig) -> Result<Self, CacheError> {
        let db = sled::open(&config.db_path)
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;

        let (current_size, last_access) = Self::scan_totals(&db)?;

        tracing::info!(
            db_path = %config.db_path,
            max_size_bytes = config.max_size_bytes,
            current_size = current_size,
            "SledAudioCache initialized"
        );

        Ok(Self {
            db,
            max_size_bytes: config.max_size_bytes,
            current_size: AtomicU64::new(current_size),
            access_clock: AtomicU64::new(last_access),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        })
    }

    /// 打开现有缓存
    pub fn open<P: AsRef<Path>>(path: P, max_size_bytes: u64) -> Result<Self, CacheError> {
        let config = SledCacheConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
            max_size_bytes,
        };
        Self::new(&config)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn entry_key(cache_key: &str) -> String {
        format!("{}{}", KEY_PREFIX, cache_key)
    }

    fn tick(&self) -> u64 {
        self.access_clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 统计已有条目的总大小与最大访问时钟
    fn scan_totals(db: &Db) -> Result<(u64, u64), CacheError> {
        let mut total = 0u64;
        let mut last_access = 0u64;
        for item in db.scan_prefix(KEY_PREFIX) {
            let (_, value) = item.map_err(|e| CacheError::DatabaseError(e.to_string()))?;
            if let Ok(entry) = bincode::deserialize::<InternalCacheEntry>(&value) {
                total += entry.size_bytes;
                last_access = last_access.max(entry.last_accessed);
            }
        }
        Ok((total, last_access))
    }

    /// LRU 淘汰一个条目，缓存为空时返回 false
    fn evict_lru(&self) -> Result<bool, CacheError> {
        let mut oldest: Option<(sled::IVec, InternalCacheEntry)> = None;

        for item in self.db.scan_prefix(KEY_PREFIX) {
            let (key, value) = item.map_err(|e| CacheError::DatabaseError(e.to_string()))?;
            let Ok(entry) = bincode::deserialize::<InternalCacheEntry>(&value) else {
                // 无法解析的条目直接丢弃
                self.db
                    .remove(&key)
                    .map_err(|e| CacheError::DatabaseError(e.to_string()))?;
                return Ok(true);
            };

            let is_older = oldest
                .as_ref()
                .map(|(_, e)| entry.last_accessed < e.last_accessed)
                .unwrap_or(true);
            if is_older {
                oldest = Some((key, entry));
            }
        }

        let Some((key, entry)) = oldest else {
            return Ok(false);
        };

        self.db
            .remove(&key)
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;
        self.sub_size(entry.size_bytes);

        tracing::debug!(
            key = %String::from_utf8_lossy(&key),
            size_bytes = entry.size_bytes,
            "LRU evicted cache entry"
        );
        Ok(true)
    }

    fn sub_size(&self, size: u64) {
        let _ = self
            .current_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(size))
            });
    }
}

#[async_trait]
impl AudioCachePort for SledAudioCache {
    async fn put(
        &self,
        cache_key: &str,
        audio_data: Vec<u8>,
        metadata: CacheMetadata,
    ) -> Result<(), CacheError> {
        let size = audio_data.len() as u64;
        if size > self.max_size_bytes {
            tracing::warn!(
                cache_key = %cache_key,
                size_bytes = size,
                max_size_bytes = self.max_size_bytes,
                "Audio larger than cache, not cached"
            );
            return Ok(());
        }

        let key = Self::entry_key(cache_key);

        // 覆盖写：先扣除旧条目大小
        if let Some(old) = self
            .db
            .remove(&key)
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?
        {
            if let Ok(old) = bincode::deserialize::<InternalCacheEntry>(&old) {
                self.sub_size(old.size_bytes);
            }
        }

        // 淘汰以腾出空间
        while self.current_size.load(Ordering::Relaxed) + size > self.max_size_bytes {
            if !self.evict_lru()? {
                break;
            }
        }

        let entry = InternalCacheEntry {
            audio_data,
            size_bytes: size,
            voice_id: metadata.voice_id,
            char_count: metadata.char_count,
            duration_ms: metadata.duration_ms,
            last_accessed: self.tick(),
            created_at: Utc::now().timestamp(),
        };

        let entry_bytes =
            bincode::serialize(&entry).map_err(|e| CacheError::SerializationError(e.to_string()))?;

        self.db
            .insert(&key, entry_bytes)
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;
        self.current_size.fetch_add(size, Ordering::Relaxed);

        tracing::debug!(
            cache_key = %cache_key,
            size_bytes = size,
            "Audio cached"
        );

        Ok(())
    }

    async fn get(&self, cache_key: &str) -> Result<Option<CachedAudio>, CacheError> {
        let key = Self::entry_key(cache_key);

        match self.db.get(&key) {
            Ok(Some(data)) => {
                let mut entry: InternalCacheEntry = bincode::deserialize(&data)
                    .map_err(|e| CacheError::SerializationError(e.to_string()))?;

                // 更新访问时钟 (LRU touch)
                entry.last_accessed = self.tick();
                let entry_bytes = bincode::serialize(&entry)
                    .map_err(|e| CacheError::SerializationError(e.to_string()))?;
                self.db
                    .insert(&key, entry_bytes)
                    .map_err(|e| CacheError::DatabaseError(e.to_string()))?;

                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.into_cached()))
            }
            Ok(None) => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => Err(CacheError::DatabaseError(e.to_string())),
        }
    }

    async fn exists(&self, cache_key: &str) -> Result<bool, CacheError> {
        self.db
            .contains_key(Self::entry_key(cache_key))
            .map_err(|e| CacheError::DatabaseError(e.to_string()))
    }

    async fn remove(&self, cache_key: &str) -> Result<(), CacheError> {
        if let Some(data) = self
            .db
            .remove(Self::entry_key(cache_key))
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?
        {
            if let Ok(entry) = bincode::deserialize::<InternalCacheEntry>(&data) {
                self.sub_size(entry.size_bytes);
            }
        }

        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let total_entries = self.db.scan_prefix(KEY_PREFIX).count();

        CacheStats {
            total_entries,
            total_size_bytes: self.current_size.load(Ordering::Relaxed),
            max_size_bytes: self.max_size_bytes,
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.db
            .flush_async()
            .await
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
