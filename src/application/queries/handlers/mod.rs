//! Query Handlers

mod job_handlers;

pub use job_handlers::*;
