//! Worker Layer - Background Job Processing
//!
//! 实现 JobWorker，从队列消费有声书生成任务

mod job_worker;

pub use job_worker::{JobWorker, JobWorkerConfig};
