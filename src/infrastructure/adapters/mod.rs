//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod speech;
pub mod storage;
pub mod text;

pub use speech::*;
pub use storage::*;
pub use text::*;
