//! Memory Layer - In-Memory State Management
//!
//! 实现 JobRegistry 与进程内 AudioCache

mod audio_cache;
mod job_registry;

pub use audio_cache::InMemoryAudioCache;
pub use job_registry::InMemoryJobRegistry;
