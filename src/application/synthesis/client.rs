//! SynthesisClient - 单个分块的语音合成
//!
//! 流程: 缓存查找 -> (每次尝试) 并发槽位 + 令牌 -> 调用服务端 -> 错误分类 -> 退避重试 -> 写缓存
//!
//! 由 main 构造一次，所有任务通过 Arc 共享，令牌桶与并发限制是全局的。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::error::{classify, Disposition, SynthesisError, SynthesisErrorKind};
use super::rate_limiter::{ConcurrencyConfig, ConcurrencyLimiter, TokenBucket, TokenBucketConfig};
use super::retry::RetryPolicy;
use crate::application::ports::{
    generate_cache_key, AudioCachePort, CacheMetadata, ModelParams, ProviderError,
    SpeechProviderPort, SpeechRequest, SpeechResponse,
};
use crate::domain::book::{AudioArtifact, TextChunk, VoiceId};

/// SynthesisClient 配置
#[derive(Debug, Clone)]
pub struct SynthesisClientConfig {
    pub model_params: ModelParams,
    /// 单次服务端调用超时
    pub request_timeout: Duration,
    /// 等待令牌 / 并发槽位的超时
    pub acquire_timeout: Duration,
    pub retry: RetryPolicy,
    pub token_bucket: TokenBucketConfig,
    pub concurrency: ConcurrencyConfig,
    /// 时长估算使用的码率
    pub bitrate_kbps: u32,
}

impl Default for SynthesisClientConfig {
    fn default() -> Self {
        Self {
            model_params: ModelParams::default(),
            request_timeout: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            token_bucket: TokenBucketConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            bitrate_kbps: 128,
        }
    }
}

impl SynthesisClientConfig {
    fn bytes_per_second(&self) -> u64 {
        self.bitrate_kbps as u64 * 1000 / 8
    }
}

/// 运行统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct SynthesisStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub provider_calls: u64,
    pub retries: u64,
    pub failures: u64,
    pub concurrency_ceiling: usize,
    pub active_requests: usize,
    pub available_tokens: u32,
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    provider_calls: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

/// 语音合成客户端
pub struct SynthesisClient {
    provider: Arc<dyn SpeechProviderPort>,
    cache: Arc<dyn AudioCachePort>,
    token_bucket: TokenBucket,
    limiter: ConcurrencyLimiter,
    config: SynthesisClientConfig,
    counters: Counters,
}

impl SynthesisClient {
    pub fn new(
        provider: Arc<dyn SpeechProviderPort>,
        cache: Arc<dyn AudioCachePort>,
        config: SynthesisClientConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            token_bucket: TokenBucket::new(&config.token_bucket),
            limiter: ConcurrencyLimiter::new(&config.concurrency),
            config,
            counters: Counters::default(),
        }
    }

    /// 合成一个分块
    ///
    /// 缓存命中时不调用服务端，也不消耗令牌和并发槽位
    pub async fn synthesize(
        &self,
        chunk: &TextChunk,
        voice_id: &VoiceId,
    ) -> Result<AudioArtifact, SynthesisError> {
        let cache_key = generate_cache_key(&chunk.text, voice_id.as_str());

        match self.cache.get(&cache_key).await {
            Ok(Some(cached)) if !cached.audio_data.is_empty() => {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    chapter_index = chunk.chapter_index,
                    sequence = chunk.sequence,
                    cache_key = %cache_key,
                    "Chunk served from cache"
                );
                return Ok(self.to_artifact(cached.audio_data, cached.metadata.duration_ms));
            }
            Ok(_) => {
                self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(cache_key = %cache_key, error = %e, "Cache read failed, treating as miss");
            }
        }

        let response = self.call_with_retry(chunk, voice_id).await.map_err(|e| {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
            e
        })?;

        let metadata = CacheMetadata {
            voice_id: voice_id.as_str().to_string(),
            char_count: chunk.char_count(),
            duration_ms: response.duration_ms,
        };
        if let Err(e) = self
            .cache
            .put(&cache_key, response.audio_data.clone(), metadata)
            .await
        {
            tracing::warn!(cache_key = %cache_key, error = %e, "Cache write failed");
        }

        Ok(self.to_artifact(response.audio_data, response.duration_ms))
    }

    /// 统计快照
    pub fn stats(&self) -> SynthesisStats {
        SynthesisStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            provider_calls: self.counters.provider_calls.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            concurrency_ceiling: self.limiter.ceiling(),
            active_requests: self.limiter.active(),
            available_tokens: self.token_bucket.available(),
        }
    }

    /// 每次尝试都重新取槽位和令牌；退避期间不占用槽位
    async fn call_with_retry(
        &self,
        chunk: &TextChunk,
        voice_id: &VoiceId,
    ) -> Result<SpeechResponse, SynthesisError> {
        let request = SpeechRequest {
            text: chunk.text.clone(),
            voice_id: voice_id.as_str().to_string(),
            model_params: self.config.model_params.clone(),
        };
        let policy = &self.config.retry;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let result = {
                // 先占槽位再取令牌，槽位等待超时不消耗令牌
                let _permit = self.limiter.acquire(self.config.acquire_timeout).await?;
                self.token_bucket.acquire(self.config.acquire_timeout).await?;
                self.counters.provider_calls.fetch_add(1, Ordering::Relaxed);
                match tokio::time::timeout(
                    self.config.request_timeout,
                    self.provider.synthesize(request.clone()),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout),
                }
            };

            let err = match result {
                Ok(response) if response.audio_data.is_empty() => {
                    tracing::warn!(
                        chapter_index = chunk.chapter_index,
                        sequence = chunk.sequence,
                        request_id = ?response.request_id,
                        "Provider returned empty audio"
                    );
                    return Err(SynthesisError::new(
                        SynthesisErrorKind::Empty,
                        format!("chunk {} returned 0 bytes", chunk.sequence),
                    ));
                }
                Ok(response) => {
                    self.limiter.record_success();
                    tracing::debug!(
                        chapter_index = chunk.chapter_index,
                        sequence = chunk.sequence,
                        attempt,
                        bytes = response.audio_data.len(),
                        request_id = ?response.request_id,
                        "Chunk synthesized"
                    );
                    return Ok(response);
                }
                Err(err) => err,
            };

            match classify(&err) {
                Disposition::Fatal(kind) => {
                    tracing::error!(
                        chapter_index = chunk.chapter_index,
                        sequence = chunk.sequence,
                        attempt,
                        kind = kind.as_str(),
                        error = %err,
                        "Synthesis failed"
                    );
                    return Err(SynthesisError::new(kind, err.to_string()));
                }
                Disposition::Transient(kind) => {
                    self.limiter.record_error();

                    if !policy.should_retry(attempt) {
                        tracing::error!(
                            chapter_index = chunk.chapter_index,
                            sequence = chunk.sequence,
                            attempts = attempt,
                            kind = kind.as_str(),
                            error = %err,
                            "Synthesis retries exhausted"
                        );
                        return Err(SynthesisError::new(
                            kind,
                            format!("{} (after {} attempts)", err, attempt),
                        ));
                    }

                    let delay = policy.delay_for(attempt);
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        chapter_index = chunk.chapter_index,
                        sequence = chunk.sequence,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient provider error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn to_artifact(&self, bytes: Vec<u8>, duration_ms: Option<u64>) -> AudioArtifact {
        match duration_ms {
            Some(ms) => AudioArtifact::reported(bytes, ms as f64 / 1000.0),
            None => AudioArtifact::estimated(bytes, self.config.bytes_per_second()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::DurationSource;
    use crate::infrastructure::adapters::{FakeSpeechClient, FakeSpeechClientConfig, ScriptedFailure};
    use crate::infrastructure::memory::InMemoryAudioCache;

    fn client_with(
        provider: Arc<FakeSpeechClient>,
        cache: Arc<InMemoryAudioCache>,
        config: SynthesisClientConfig,
    ) -> SynthesisClient {
        SynthesisClient::new(provider, cache, config)
    }

    fn chunk(text: &str) -> TextChunk {
        TextChunk::new(0, 0, text)
    }

    fn voice() -> VoiceId {
        VoiceId::new("voice-a").unwrap()
    }

    #[tokio::test]
    async fn test_cache_idempotence() {
        let provider = Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig::default()));
        let cache = Arc::new(InMemoryAudioCache::new());
        let client = client_with(provider.clone(), cache, SynthesisClientConfig::default());

        let first = client.synthesize(&chunk("Hello world."), &voice()).await.unwrap();
        let second = client.synthesize(&chunk("Hello world."), &voice()).await.unwrap();

        assert_eq!(first.bytes, second.bytes);
        assert_eq!(provider.call_count(), 1);

        let stats = client.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.provider_calls, 1);
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_consume_tokens() {
        let provider = Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig::default()));
        let cache = Arc::new(InMemoryAudioCache::new());
        let config = SynthesisClientConfig {
            token_bucket: TokenBucketConfig {
                capacity: 1,
                refill_amount: 0,
                refill_interval: Duration::from_secs(60),
            },
            acquire_timeout: Duration::from_millis(10),
            ..SynthesisClientConfig::default()
        };
        let client = client_with(provider.clone(), cache, config);

        client.synthesize(&chunk("Same text."), &voice()).await.unwrap();
        for _ in 0..5 {
            client.synthesize(&chunk("Same text."), &voice()).await.unwrap();
        }
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_429_stops_at_retry_ceiling() {
        let provider = Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig::default()));
        provider.fail_always(ScriptedFailure::Status(429));
        let cache = Arc::new(InMemoryAudioCache::new());
        let client = client_with(provider.clone(), cache.clone(), SynthesisClientConfig::default());

        let err = client.synthesize(&chunk("Hello."), &voice()).await.unwrap_err();

        assert_eq!(err.kind, SynthesisErrorKind::QuotaExceeded);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(client.stats().retries, 2);
        assert_eq!(cache.stats().await.total_entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_recovers() {
        let provider = Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig::default()));
        provider.fail_next(ScriptedFailure::Status(503), 2);
        let cache = Arc::new(InMemoryAudioCache::new());
        let client = client_with(provider.clone(), cache, SynthesisClientConfig::default());

        let artifact = client.synthesize(&chunk("Hello."), &voice()).await.unwrap();
        assert!(!artifact.bytes.is_empty());
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_invalid_key_is_not_retried() {
        let provider = Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig::default()));
        provider.fail_always(ScriptedFailure::Status(401));
        let cache = Arc::new(InMemoryAudioCache::new());
        let client = client_with(provider.clone(), cache, SynthesisClientConfig::default());

        let err = client.synthesize(&chunk("Hello."), &voice()).await.unwrap_err();
        assert_eq!(err.kind, SynthesisErrorKind::InvalidKey);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(client.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_empty_audio_is_not_retried() {
        let provider = Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig::default()));
        provider.fail_always(ScriptedFailure::EmptyAudio);
        let cache = Arc::new(InMemoryAudioCache::new());
        let client = client_with(provider.clone(), cache, SynthesisClientConfig::default());

        let err = client.synthesize(&chunk("Hello."), &voice()).await.unwrap_err();
        assert_eq!(err.kind, SynthesisErrorKind::Empty);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_admits_capacity_without_refill() {
        let provider = Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig::default()));
        let cache = Arc::new(InMemoryAudioCache::new());
        let config = SynthesisClientConfig {
            token_bucket: TokenBucketConfig {
                capacity: 4,
                refill_amount: 0,
                refill_interval: Duration::from_secs(60),
            },
            acquire_timeout: Duration::from_secs(1),
            ..SynthesisClientConfig::default()
        };
        let client = client_with(provider.clone(), cache, config);

        let mut timeouts = 0;
        for i in 0..9 {
            let text = format!("Distinct sentence number {}.", i);
            if let Err(e) = client.synthesize(&chunk(&text), &voice()).await {
                assert_eq!(e.kind, SynthesisErrorKind::RateLimitTimeout);
                timeouts += 1;
            }
        }

        assert_eq!(provider.call_count(), 4);
        assert_eq!(timeouts, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_timeout_keeps_token() {
        let provider = Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig::default()));
        provider.delay_when_contains("Slow", Duration::from_secs(10));
        let cache = Arc::new(InMemoryAudioCache::new());
        let config = SynthesisClientConfig {
            token_bucket: TokenBucketConfig {
                capacity: 3,
                refill_amount: 0,
                refill_interval: Duration::from_secs(60),
            },
            concurrency: ConcurrencyConfig {
                max_concurrent: 1,
                min_concurrent: 1,
                ..ConcurrencyConfig::default()
            },
            acquire_timeout: Duration::from_secs(1),
            ..SynthesisClientConfig::default()
        };
        let client = Arc::new(client_with(provider.clone(), cache, config));

        let in_flight = tokio::spawn({
            let client = client.clone();
            async move { client.synthesize(&chunk("Slow request."), &voice()).await }
        });
        while provider.call_count() == 0 {
            tokio::task::yield_now().await;
        }

        // 唯一的槽位被占用，第二个请求等待槽位超时
        let err = client
            .synthesize(&chunk("Second request."), &voice())
            .await
            .unwrap_err();
        assert_eq!(err.kind, SynthesisErrorKind::RateLimitTimeout);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(client.stats().available_tokens, 2);

        in_flight.await.unwrap().unwrap();
        assert_eq!(client.stats().available_tokens, 2);
    }

    #[tokio::test]
    async fn test_duration_reported_or_estimated() {
        let provider = Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig {
            report_duration: true,
            ..FakeSpeechClientConfig::default()
        }));
        let cache = Arc::new(InMemoryAudioCache::new());
        let client = client_with(provider, cache, SynthesisClientConfig::default());
        let artifact = client.synthesize(&chunk("Reported."), &voice()).await.unwrap();
        assert_eq!(artifact.duration_source, DurationSource::Reported);

        let provider = Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig {
            report_duration: false,
            ..FakeSpeechClientConfig::default()
        }));
        let cache = Arc::new(InMemoryAudioCache::new());
        let client = client_with(provider, cache, SynthesisClientConfig::default());
        let artifact = client.synthesize(&chunk("Estimated."), &voice()).await.unwrap();
        assert_eq!(artifact.duration_source, DurationSource::Estimated);
        let expected = artifact.size_bytes as f64 / 16000.0;
        assert!((artifact.duration_seconds - expected).abs() < 1e-9);
    }
}
