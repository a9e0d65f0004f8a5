//! 应用层 - 查询（读操作）
//!
//! CQRS 查询侧：实时快照优先，仓储兜底

mod job_queries;

pub mod handlers;

pub use job_queries::*;
