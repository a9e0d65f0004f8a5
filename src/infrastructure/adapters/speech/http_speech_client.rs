//! HTTP Speech Client - 调用外部语音合成 HTTP 服务
//!
//! 外部 API:
//! POST {base_url}/synthesize
//! Headers: x-api-key
//! Request: {"text": "...", "voice_id": "...", "model_id": "...", "voice_settings": {...}, "output_format": "..."}  (JSON)
//! Response: audio/mpeg binary，时长在 X-Audio-Duration-Ms 中（可选）

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{ProviderError, SpeechProviderPort, SpeechRequest, SpeechResponse};

/// 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct SynthesizeHttpRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
    output_format: &'a str,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// HTTP Speech 客户端配置
#[derive(Debug, Clone)]
pub struct HttpSpeechClientConfig {
    /// 服务基础 URL
    pub base_url: String,
    pub api_key: String,
    /// 连接级超时（秒），单次调用超时由 SynthesisClient 控制
    pub timeout_secs: u64,
}

impl Default for HttpSpeechClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_key: String::new(),
            timeout_secs: 120,
        }
    }
}

impl HttpSpeechClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP Speech 客户端
pub struct HttpSpeechClient {
    client: Client,
    config: HttpSpeechClientConfig,
}

impl HttpSpeechClient {
    pub fn new(config: HttpSpeechClientConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn synthesize_url(&self) -> String {
        format!("{}/synthesize", self.config.base_url.trim_end_matches('/'))
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechProviderPort for HttpSpeechClient {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse, ProviderError> {
        let params = &request.model_params;
        let body = SynthesizeHttpRequest {
            text: &request.text,
            voice_id: &request.voice_id,
            model_id: &params.model_id,
            voice_settings: VoiceSettings {
                stability: params.stability,
                similarity_boost: params.similarity_boost,
            },
            output_format: &params.output_format,
        };

        tracing::debug!(
            url = %self.synthesize_url(),
            text_len = request.text.len(),
            voice_id = %request.voice_id,
            "Sending synthesize request"
        );

        let response = self
            .client
            .post(self.synthesize_url())
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else if e.is_connect() {
                    ProviderError::Network(format!("Cannot connect to speech service: {}", e))
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        // 从 headers 提取元数据
        let headers = response.headers();
        let request_id = headers
            .get("X-Request-Id")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let duration_ms = headers
            .get("X-Audio-Duration-Ms")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let audio_data = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::InvalidResponse(format!("Failed to read audio: {}", e))
                }
            })?
            .to_vec();

        tracing::debug!(
            request_id = ?request_id,
            duration_ms = ?duration_ms,
            audio_size = audio_data.len(),
            "Synthesize request completed"
        );

        Ok(SpeechResponse {
            audio_data,
            duration_ms,
            request_id,
        })
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
