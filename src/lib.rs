//! Lector - 有声书生成服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Book Context: 章节检测、文本分块、音频产物
//! - Job Context: 任务状态机
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SpeechProvider, AudioCache, JobRegistry, JobRepository, ArtifactStorage, TextSource）
//! - Synthesis: 令牌桶 + 并发限制 + 退避重试 + 内容寻址缓存
//! - ChapterAssembler / JobCoordinator: 章节组装与任务推进
//! - Commands / Queries: CQRS 处理器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API
//! - Memory: JobRegistry, AudioCache 内存实现
//! - Worker: JobWorker 后台任务处理
//! - Persistence: SQLite（任务）+ Sled（分块缓存）
//! - Adapters: 语音合成客户端、章节音频存储、书稿文本来源

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
