//! Fake Speech Client - 用于本地运行与测试的语音合成客户端
//!
//! 不访问网络，按文本生成确定性的“音频”字节，
//! 并可按脚本注入失败、延迟，用来复现重试和乱序完成。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::application::ports::{ProviderError, SpeechProviderPort, SpeechRequest, SpeechResponse};

/// Fake Speech Client 配置
#[derive(Debug, Clone)]
pub struct FakeSpeechClientConfig {
    /// 模拟的调用延迟
    pub latency: Duration,
    /// 是否在响应中带上时长
    pub report_duration: bool,
    /// 每个字符对应的时长（毫秒）
    pub ms_per_char: u64,
}

impl Default for FakeSpeechClientConfig {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            report_duration: true,
            ms_per_char: 60,
        }
    }
}

/// 注入的失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    Status(u16),
    Network,
    EmptyAudio,
}

#[derive(Debug)]
struct FailureRule {
    /// 只对包含该片段的文本生效，None 表示所有文本
    marker: Option<String>,
    failure: ScriptedFailure,
    /// 剩余生效次数，None 表示一直生效
    remaining: Option<usize>,
}

/// Fake Speech Client
pub struct FakeSpeechClient {
    config: FakeSpeechClientConfig,
    calls: AtomicUsize,
    requests: Mutex<Vec<String>>,
    failures: Mutex<Vec<FailureRule>>,
    delays: Mutex<Vec<(String, Duration)>>,
}

impl FakeSpeechClient {
    pub fn new(config: FakeSpeechClientConfig) -> Self {
        tracing::info!(
            latency_ms = config.latency.as_millis() as u64,
            report_duration = config.report_duration,
            "FakeSpeechClient initialized"
        );
        Self {
            config,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            delays: Mutex::new(Vec::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeSpeechClientConfig::default())
    }

    /// 所有调用都失败
    pub fn fail_always(&self, failure: ScriptedFailure) {
        self.failures.lock().push(FailureRule {
            marker: None,
            failure,
            remaining: None,
        });
    }

    /// 接下来 `times` 次调用失败
    pub fn fail_next(&self, failure: ScriptedFailure, times: usize) {
        self.failures.lock().push(FailureRule {
            marker: None,
            failure,
            remaining: Some(times),
        });
    }

    /// 文本包含 `marker` 的调用都失败
    pub fn fail_when_contains(&self, marker: impl Into<String>, failure: ScriptedFailure) {
        self.failures.lock().push(FailureRule {
            marker: Some(marker.into()),
            failure,
            remaining: None,
        });
    }

    /// 文本包含 `marker` 的调用额外延迟
    pub fn delay_when_contains(&self, marker: impl Into<String>, delay: Duration) {
        self.delays.lock().push((marker.into(), delay));
    }

    /// 清除所有注入的失败
    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// 服务端被调用的次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 按调用顺序记录的请求文本
    pub fn requested_texts(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// 某段文本对应的确定性音频
    pub fn audio_for(voice_id: &str, text: &str) -> Vec<u8> {
        format!("<{}|{}>", voice_id, text).into_bytes()
    }

    fn scripted_failure(&self, text: &str) -> Option<ScriptedFailure> {
        let mut rules = self.failures.lock();
        let index = rules.iter().position(|rule| {
            rule.remaining != Some(0)
                && rule.marker.as_deref().map_or(true, |m| text.contains(m))
        })?;

        let rule = &mut rules[index];
        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(rule.failure)
    }

    fn extra_delay(&self, text: &str) -> Duration {
        self.delays
            .lock()
            .iter()
            .filter(|(marker, _)| text.contains(marker.as_str()))
            .map(|(_, delay)| *delay)
            .sum()
    }
}

#[async_trait]
impl SpeechProviderPort for FakeSpeechClient {
    async fn synthesize(&self, request: SpeechRequest) -> Result<SpeechResponse, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().push(request.text.clone());

        tracing::debug!(
            call,
            text_len = request.text.len(),
            voice_id = %request.voice_id,
            "FakeSpeechClient: synthesizing"
        );

        let delay = self.config.latency + self.extra_delay(&request.text);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.scripted_failure(&request.text) {
            Some(ScriptedFailure::Status(status)) => {
                return Err(ProviderError::Status {
                    status,
                    message: format!("scripted status {}", status),
                });
            }
            Some(ScriptedFailure::Network) => {
                return Err(ProviderError::Network("scripted connection reset".to_string()));
            }
            Some(ScriptedFailure::EmptyAudio) => {
                return Ok(SpeechResponse {
                    audio_data: Vec::new(),
                    duration_ms: None,
                    request_id: Some(format!("fake-{}", call)),
                });
            }
            None => {}
        }

        let duration_ms = self
            .config
            .report_duration
            .then(|| request.text.chars().count() as u64 * self.config.ms_per_char);

        Ok(SpeechResponse {
            audio_data: Self::audio_for(&request.voice_id, &request.text),
            duration_ms,
            request_id: Some(format!("fake-{}", call)),
        })
    }
}
