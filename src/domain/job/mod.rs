//! Job Context - 生成任务限界上下文
//!
//! 职责:
//! - Job 聚合根及其状态机
//! - 进度快照（持久化单元）

mod aggregate;
mod errors;
mod value_objects;

pub use aggregate::{Job, JobParts, JobProgress};
pub use errors::JobError;
pub use value_objects::{JobId, JobStatus};
