//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Book Context: 章节、分块、音频产物
//! - Job Context: 有声书生成任务的状态机
//!
//! 以及两个纯文本服务: 章节识别与文本分块

pub mod book;
pub mod job;

mod chapter_detector;
mod text_chunker;

pub use chapter_detector::ChapterDetector;
pub use text_chunker::TextChunker;
