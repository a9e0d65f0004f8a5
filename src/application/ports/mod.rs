//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod artifact_storage;
mod audio_cache;
mod job_registry;
mod job_repository;
mod speech_provider;
mod text_source;

pub use artifact_storage::{ArtifactStoragePort, StorageError};
pub use audio_cache::{
    generate_cache_key, AudioCachePort, CacheError, CacheMetadata, CacheStats, CachedAudio,
};
pub use job_registry::{CancelOutcome, JobRegistryPort, RegistryError};
pub use job_repository::{JobRepositoryPort, RepositoryError};
pub use speech_provider::{
    ModelParams, ProviderError, SpeechProviderPort, SpeechRequest, SpeechResponse,
};
pub use text_source::{TextSourceError, TextSourcePort};
