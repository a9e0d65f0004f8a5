//! Sled 持久化分块音频缓存

mod audio_cache;

pub use audio_cache::{SledAudioCache, SledCacheConfig};
