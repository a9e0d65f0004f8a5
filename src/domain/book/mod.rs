//! Book Context - 书稿限界上下文
//!
//! 职责:
//! - 章节实体（由 ChapterDetector 产生）
//! - 文本分块实体（由 TextChunker 产生）
//! - 音频产物值对象

mod entities;
mod errors;
mod value_objects;

pub use entities::{AudioArtifact, Chapter, DurationSource, TextChunk};
pub use errors::BookError;
pub use value_objects::VoiceId;
