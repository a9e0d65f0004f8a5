//! HTTP Layer - RESTful API
//!
//! 任务提交 / 查询 / 取消 / 恢复，以及章节音频静态文件

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_routes;
pub use server::{HttpServer, ServerConfig};
pub use state::AppState;
