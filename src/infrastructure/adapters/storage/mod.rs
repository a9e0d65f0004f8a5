//! Storage Adapter - 章节音频存储

mod file_storage;

pub use file_storage::FileArtifactStorage;
