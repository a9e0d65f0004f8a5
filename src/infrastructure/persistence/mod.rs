//! Persistence Layer - 数据持久化
//!
//! SQLite（任务）和 Sled（分块音频缓存）存储实现

pub mod sled;
pub mod sqlite;

pub use self::sled::{SledAudioCache, SledCacheConfig};
pub use self::sqlite::{create_pool, run_migrations, DatabaseConfig, DbPool, SqliteJobRepository};
