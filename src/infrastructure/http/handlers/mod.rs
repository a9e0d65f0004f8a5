//! HTTP Handlers

mod job;
mod ping;
mod stats;

pub use job::*;
pub use ping::*;
pub use stats::*;
