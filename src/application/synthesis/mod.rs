//! Synthesis - 受限流保护的语音合成客户端
//!
//! - client: 缓存 + 令牌桶 + 并发限制 + 退避重试
//! - rate_limiter: TokenBucket / ConcurrencyLimiter
//! - retry: 指数退避策略
//! - error: 终态错误分类

mod client;
mod error;
mod rate_limiter;
mod retry;

pub use client::{SynthesisClient, SynthesisClientConfig, SynthesisStats};
pub use error::{SynthesisError, SynthesisErrorKind};
pub use rate_limiter::{
    AdaptiveConfig, ConcurrencyConfig, ConcurrencyLimiter, ConcurrencyPermit, TokenBucket,
    TokenBucketConfig,
};
pub use retry::RetryPolicy;
