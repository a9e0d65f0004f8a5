//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SpeechProvider、AudioCache、JobRegistry、JobRepository 等）
//! - synthesis: 限流 + 退避 + 缓存的语音合成客户端
//! - assembler / coordinator: 章节组装与任务状态机
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod assembler;
pub mod commands;
pub mod coordinator;
pub mod error;
pub mod ports;
pub mod queries;
pub mod synthesis;

// Re-exports
pub use assembler::{ChapterAssembler, ChapterError};
pub use commands::{
    handlers::{CancelJobHandler, ResumeJobHandler, SubmitJobHandler},
    CancelJob, ResumeJob, SubmitJob, TextInput,
};
pub use coordinator::JobCoordinator;
pub use error::ApplicationError;
pub use queries::{
    handlers::{GetJobHandler, ListJobsHandler},
    GetJob, ListJobs,
};
pub use synthesis::{
    SynthesisClient, SynthesisClientConfig, SynthesisError, SynthesisErrorKind, SynthesisStats,
};
