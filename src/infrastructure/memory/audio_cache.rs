//! In-Memory Audio Cache
//!
//! 进程内缓存，不做淘汰；用于测试和不需要持久化缓存的部署

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::application::ports::{AudioCachePort, CacheError, CacheMetadata, CacheStats, CachedAudio};

#[derive(Default)]
pub struct InMemoryAudioCache {
    entries: DashMap<String, CachedAudio>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl InMemoryAudioCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AudioCachePort for InMemoryAudioCache {
    async fn put(
        &self,
        cache_key: &str,
        audio_data: Vec<u8>,
        metadata: CacheMetadata,
    ) -> Result<(), CacheError> {
        self.entries.insert(
            cache_key.to_string(),
            CachedAudio {
                audio_data,
                metadata,
            },
        );
        Ok(())
    }

    async fn get(&self, cache_key: &str) -> Result<Option<CachedAudio>, CacheError> {
        match self.entries.get(cache_key) {
            Some(entry) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.clone()))
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn exists(&self, cache_key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.contains_key(cache_key))
    }

    async fn remove(&self, cache_key: &str) -> Result<(), CacheError> {
        self.entries.remove(cache_key);
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            total_size_bytes: self
                .entries
                .iter()
                .map(|e| e.audio_data.len() as u64)
                .sum(),
            max_size_bytes: 0,
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }
}
