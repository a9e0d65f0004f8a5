//! Speech Provider Port - 外部语音合成服务抽象
//!
//! 具体实现在 infrastructure/adapters/speech 层

use async_trait::async_trait;
use thiserror::Error;

/// 语音合成服务错误
///
/// 只描述传输层 / 协议层发生了什么，是否重试由 SynthesisClient 决定
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 服务端返回非 2xx 状态码
    #[error("Provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    /// 响应体读取失败或被截断
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 模型参数
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub output_format: String,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            model_id: "multilingual-v2".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            output_format: "mp3_44100_128".to_string(),
        }
    }
}

/// 合成请求
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    /// 要合成的文本（已分块）
    pub text: String,
    /// 音色 ID
    pub voice_id: String,
    pub model_params: ModelParams,
}

/// 合成响应
#[derive(Debug, Clone)]
pub struct SpeechResponse {
    /// 编码后的音频数据（MP3）
    pub audio_data: Vec<u8>,
    /// 服务端报告的时长（毫秒）
    pub duration_ms: Option<u64>,
    /// 服务端请求 ID（用于追踪）
    pub request_id: Option<String>,
}

/// Speech Provider Port
#[async_trait]
pub trait SpeechProviderPort: Send + Sync {
    /// 合成一个文本分块
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse, ProviderError>;

    /// 检查服务是否可用
    async fn health_check(&self) -> bool {
        true
    }
}
