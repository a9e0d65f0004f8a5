//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::ports::ModelParams;
use crate::application::synthesis::{
    AdaptiveConfig, ConcurrencyConfig, RetryPolicy, SynthesisClientConfig, TokenBucketConfig,
};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 语音合成服务配置
    #[serde(default)]
    pub speech: SpeechConfig,

    /// 分块与重试配置
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// 限流配置
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// 音频配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 后台任务配置
    #[serde(default)]
    pub worker: WorkerConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 组装共享 SynthesisClient 的配置
    pub fn synthesis_client_config(&self) -> SynthesisClientConfig {
        SynthesisClientConfig {
            model_params: ModelParams {
                model_id: self.speech.model_id.clone(),
                stability: self.speech.stability,
                similarity_boost: self.speech.similarity_boost,
                output_format: self.speech.output_format.clone(),
            },
            request_timeout: Duration::from_secs(self.speech.timeout_secs),
            acquire_timeout: Duration::from_secs(self.synthesis.acquire_timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.synthesis.max_attempts,
                base_delay: Duration::from_millis(self.synthesis.base_delay_ms),
                max_delay: Duration::from_millis(self.synthesis.max_delay_ms),
            },
            token_bucket: TokenBucketConfig {
                capacity: self.rate_limit.capacity,
                refill_amount: self.rate_limit.refill_amount,
                refill_interval: Duration::from_secs(self.rate_limit.refill_interval_secs),
            },
            concurrency: ConcurrencyConfig {
                max_concurrent: self.rate_limit.max_concurrent,
                min_concurrent: self.rate_limit.min_concurrent,
                adaptive: AdaptiveConfig {
                    enabled: self.rate_limit.adaptive.enabled,
                    error_threshold: self.rate_limit.adaptive.error_threshold,
                    window: Duration::from_secs(self.rate_limit.adaptive.window_secs),
                    cooldown: Duration::from_secs(self.rate_limit.adaptive.cooldown_secs),
                    decrease_step: self.rate_limit.adaptive.decrease_step,
                    increase_step: self.rate_limit.adaptive.increase_step,
                },
            },
            bitrate_kbps: self.audio.bitrate_kbps,
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 公开访问的 Base URL（拼接章节音频 URL）
    /// 如果未设置，则使用 http://{host}:{port}
    #[serde(default)]
    pub base_url: Option<String>,

    /// 请求体上限（字节）
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

fn default_body_limit() -> usize {
    20 * 1024 * 1024 // 20 MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 获取公开的 Base URL
    pub fn public_base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            let host = if self.host == "0.0.0.0" {
                "localhost"
            } else {
                &self.host
            };
            format!("http://{}:{}", host, self.port)
        })
    }
}

/// 语音合成服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// "http" 或 "fake"（本地调试，不调用外部服务）
    #[serde(default = "default_provider")]
    pub provider: String,

    /// 服务基础 URL
    #[serde(default = "default_speech_url")]
    pub url: String,

    /// API Key
    #[serde(default)]
    pub api_key: String,

    /// 单次请求超时（秒）
    #[serde(default = "default_speech_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_model_id")]
    pub model_id: String,

    #[serde(default = "default_stability")]
    pub stability: f32,

    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,

    #[serde(default = "default_output_format")]
    pub output_format: String,
}

fn default_provider() -> String {
    "http".to_string()
}

fn default_speech_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_speech_timeout() -> u64 {
    60
}

fn default_model_id() -> String {
    ModelParams::default().model_id
}

fn default_stability() -> f32 {
    ModelParams::default().stability
}

fn default_similarity_boost() -> f32 {
    ModelParams::default().similarity_boost
}

fn default_output_format() -> String {
    ModelParams::default().output_format
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: default_speech_url(),
            api_key: String::new(),
            timeout_secs: default_speech_timeout(),
            model_id: default_model_id(),
            stability: default_stability(),
            similarity_boost: default_similarity_boost(),
            output_format: default_output_format(),
        }
    }
}

impl SpeechConfig {
    pub fn is_fake(&self) -> bool {
        self.provider.eq_ignore_ascii_case("fake")
    }
}

/// 分块与重试配置
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// 单个分块最大字符数（provider 限制）
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// 单章内同时合成的分块数
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,

    /// 等待令牌 / 并发槽位的上限（秒）
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// 总尝试次数（含首次）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_chunk_size() -> usize {
    2500
}

fn default_fan_out() -> usize {
    1
}

fn default_acquire_timeout() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            fan_out: default_fan_out(),
            acquire_timeout_secs: default_acquire_timeout(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// 限流配置（令牌桶 + 并发上限）
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// 每个周期补充的令牌数
    #[serde(default = "default_capacity")]
    pub refill_amount: u32,

    #[serde(default = "default_refill_interval")]
    pub refill_interval_secs: u64,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_min_concurrent")]
    pub min_concurrent: usize,

    /// 按错误率动态调整并发上限
    #[serde(default)]
    pub adaptive: AdaptiveRateConfig,
}

fn default_capacity() -> u32 {
    50
}

fn default_refill_interval() -> u64 {
    60
}

fn default_max_concurrent() -> usize {
    5
}

fn default_min_concurrent() -> usize {
    1
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_amount: default_capacity(),
            refill_interval_secs: default_refill_interval(),
            max_concurrent: default_max_concurrent(),
            min_concurrent: default_min_concurrent(),
            adaptive: AdaptiveRateConfig::default(),
        }
    }
}

/// 动态并发调整配置
#[derive(Debug, Clone, Deserialize)]
pub struct AdaptiveRateConfig {
    #[serde(default)]
    pub enabled: bool,

    /// 窗口内错误数达到 threshold * max_concurrent 时降低上限
    #[serde(default = "default_error_threshold")]
    pub error_threshold: f64,

    #[serde(default = "default_window")]
    pub window_secs: u64,

    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    #[serde(default = "default_step")]
    pub decrease_step: usize,

    #[serde(default = "default_step")]
    pub increase_step: usize,
}

fn default_error_threshold() -> f64 {
    0.5
}

fn default_window() -> u64 {
    60
}

fn default_cooldown() -> u64 {
    30
}

fn default_step() -> usize {
    1
}

impl Default for AdaptiveRateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            error_threshold: default_error_threshold(),
            window_secs: default_window(),
            cooldown_secs: default_cooldown(),
            decrease_step: default_step(),
            increase_step: default_step(),
        }
    }
}

/// 音频配置
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// 无服务端时长时用于估算的比特率（kbps）
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,

    /// 章节音频文件扩展名
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_bitrate_kbps() -> u32 {
    128
}

fn default_extension() -> String {
    "mp3".to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            bitrate_kbps: default_bitrate_kbps(),
            extension: default_extension(),
        }
    }
}

/// 后台任务配置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// 同时处理的任务数
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// 任务队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 关闭时等待进行中任务的时长（秒）
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            queue_capacity: default_queue_capacity(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/lector.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 章节音频存储目录
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,

    /// 上传书稿（纯文本）目录
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    /// 分块缓存后端: "sled" 或 "memory"
    #[serde(default = "default_cache_backend")]
    pub cache_backend: String,

    /// Sled 缓存路径
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// 缓存容量上限（字节），超出按 LRU 淘汰
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size_bytes: u64,
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("data/audio")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("data/uploads")
}

fn default_cache_backend() -> String {
    "sled".to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("data/cache.sled")
}

fn default_cache_max_size() -> u64 {
    2 * 1024 * 1024 * 1024 // 2 GB
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            audio_dir: default_audio_dir(),
            uploads_dir: default_uploads_dir(),
            cache_backend: default_cache_backend(),
            cache_path: default_cache_path(),
            cache_max_size_bytes: default_cache_max_size(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
