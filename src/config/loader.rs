//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `LECTOR_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `LECTOR_SERVER__PORT=8080`
/// - `LECTOR_SPEECH__URL=http://speech-server:8000`
/// - `LECTOR_SPEECH__API_KEY=sk-...`
/// - `LECTOR_RATE_LIMIT__MAX_CONCURRENT=3`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级），其余字段由 serde default 补齐
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5070)?
        .set_default("speech.provider", "http")?
        .set_default("speech.url", "http://localhost:8000")?
        .set_default("speech.timeout_secs", 60)?
        .set_default("synthesis.max_chunk_size", 2500)?
        .set_default("synthesis.max_attempts", 3)?
        .set_default("rate_limit.capacity", 50)?
        .set_default("rate_limit.max_concurrent", 5)?
        .set_default("worker.max_concurrent_jobs", 2)?
        .set_default("database.path", "data/lector.db")?
        .set_default("database.max_connections", 5)?
        .set_default("storage.audio_dir", "data/audio")?
        .set_default("storage.uploads_dir", "data/uploads")?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 例如: LECTOR_SPEECH__URL=http://speech-server:8000
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("LECTOR")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn invalid(message: &str) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.to_string()))
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return invalid("Server port cannot be 0");
    }

    if !config.speech.is_fake() && config.speech.url.is_empty() {
        return invalid("Speech URL cannot be empty");
    }

    if config.synthesis.max_chunk_size == 0 {
        return invalid("max_chunk_size must be greater than 0");
    }

    if config.synthesis.max_attempts == 0 {
        return invalid("max_attempts must be at least 1");
    }

    if config.synthesis.base_delay_ms > config.synthesis.max_delay_ms {
        return invalid("base_delay_ms cannot exceed max_delay_ms");
    }

    let rate = &config.rate_limit;
    if rate.capacity == 0 {
        return invalid("Token bucket capacity must be greater than 0");
    }

    if rate.refill_interval_secs == 0 {
        return invalid("Token refill interval cannot be 0");
    }

    if rate.min_concurrent == 0 || rate.max_concurrent < rate.min_concurrent {
        return invalid("Require max_concurrent >= min_concurrent >= 1");
    }

    let threshold = rate.adaptive.error_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return invalid("Adaptive error_threshold must be in (0, 1]");
    }

    // 放大步长不超过收缩步长
    let adaptive = &rate.adaptive;
    if adaptive.decrease_step == 0
        || adaptive.increase_step == 0
        || adaptive.increase_step > adaptive.decrease_step
    {
        return invalid("Require adaptive decrease_step >= increase_step >= 1");
    }

    if config.worker.max_concurrent_jobs == 0 {
        return invalid("worker.max_concurrent_jobs must be at least 1");
    }

    if config.worker.queue_capacity == 0 {
        return invalid("worker.queue_capacity must be at least 1");
    }

    if config.database.path.is_empty() {
        return invalid("Database path cannot be empty");
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Public Base URL: {}", config.server.public_base_url());
    tracing::info!("Speech Provider: {}", config.speech.provider);
    if !config.speech.is_fake() {
        tracing::info!("Speech URL: {}", config.speech.url);
        tracing::info!(
            "Speech API Key: {}",
            if config.speech.api_key.is_empty() { "<unset>" } else { "<set>" }
        );
    }
    tracing::info!("Speech Timeout: {}s", config.speech.timeout_secs);
    tracing::info!("Model: {}", config.speech.model_id);
    tracing::info!("Max Chunk Size: {}", config.synthesis.max_chunk_size);
    tracing::info!("Chunk Fan-out: {}", config.synthesis.fan_out);
    tracing::info!(
        "Retry: {} attempts, {}ms..{}ms",
        config.synthesis.max_attempts,
        config.synthesis.base_delay_ms,
        config.synthesis.max_delay_ms
    );
    tracing::info!(
        "Token Bucket: {} (+{} / {}s)",
        config.rate_limit.capacity,
        config.rate_limit.refill_amount,
        config.rate_limit.refill_interval_secs
    );
    tracing::info!(
        "Concurrency: {}..{} (adaptive: {})",
        config.rate_limit.min_concurrent,
        config.rate_limit.max_concurrent,
        config.rate_limit.adaptive.enabled
    );
    tracing::info!("Worker Jobs: {}", config.worker.max_concurrent_jobs);
    tracing::info!("Database: {}", config.database.path);
    tracing::info!("Audio Directory: {:?}", config.storage.audio_dir);
    tracing::info!("Uploads Directory: {:?}", config.storage.uploads_dir);
    tracing::info!("Cache Backend: {}", config.storage.cache_backend);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
