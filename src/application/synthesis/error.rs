//! 合成错误分类

use thiserror::Error;

use crate::application::ports::ProviderError;

/// 分块合成的终态错误种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisErrorKind {
    /// 配额用尽（402 / 持续 429）
    QuotaExceeded,
    /// 凭证无效（401 / 403），不重试
    InvalidKey,
    /// 服务端错误、网络错误或重试耗尽
    ProviderError,
    /// 返回了 0 字节音频
    Empty,
    /// 在 acquire_timeout 内没拿到令牌或并发槽位
    RateLimitTimeout,
}

impl SynthesisErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SynthesisErrorKind::QuotaExceeded => "quota_exceeded",
            SynthesisErrorKind::InvalidKey => "invalid_key",
            SynthesisErrorKind::ProviderError => "provider_error",
            SynthesisErrorKind::Empty => "empty",
            SynthesisErrorKind::RateLimitTimeout => "rate_limit_timeout",
        }
    }

    /// 面向用户的描述（写入任务的 error 字段）
    pub fn description(&self) -> &'static str {
        match self {
            SynthesisErrorKind::QuotaExceeded => "provider quota exceeded",
            SynthesisErrorKind::InvalidKey => "invalid provider credential",
            SynthesisErrorKind::ProviderError => "provider error",
            SynthesisErrorKind::Empty => "provider returned empty audio",
            SynthesisErrorKind::RateLimitTimeout => "rate limit wait timed out",
        }
    }
}

impl std::fmt::Display for SynthesisErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// 分块合成失败
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct SynthesisError {
    pub kind: SynthesisErrorKind,
    pub message: String,
}

impl SynthesisError {
    pub fn new(kind: SynthesisErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limit_timeout(what: &str) -> Self {
        Self::new(
            SynthesisErrorKind::RateLimitTimeout,
            format!("timed out waiting for {}", what),
        )
    }
}

/// 对服务端错误的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// 立即失败
    Fatal(SynthesisErrorKind),
    /// 可重试；重试耗尽后以该种类失败
    Transient(SynthesisErrorKind),
}

/// 把传输层错误映射为处理方式
pub(crate) fn classify(err: &ProviderError) -> Disposition {
    match err {
        ProviderError::Status { status, message } => match *status {
            401 | 403 => {
                if message.to_lowercase().contains("quota") {
                    Disposition::Fatal(SynthesisErrorKind::QuotaExceeded)
                } else {
                    Disposition::Fatal(SynthesisErrorKind::InvalidKey)
                }
            }
            402 => Disposition::Fatal(SynthesisErrorKind::QuotaExceeded),
            429 => Disposition::Transient(SynthesisErrorKind::QuotaExceeded),
            408 | 500..=599 => Disposition::Transient(SynthesisErrorKind::ProviderError),
            _ => Disposition::Fatal(SynthesisErrorKind::ProviderError),
        },
        ProviderError::Network(_) | ProviderError::Timeout | ProviderError::InvalidResponse(_) => {
            Disposition::Transient(SynthesisErrorKind::ProviderError)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, message: &str) -> ProviderError {
        ProviderError::Status {
            status: code,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_auth_errors_are_fatal() {
        assert_eq!(
            classify(&status(401, "bad key")),
            Disposition::Fatal(SynthesisErrorKind::InvalidKey)
        );
        assert_eq!(
            classify(&status(403, "forbidden")),
            Disposition::Fatal(SynthesisErrorKind::InvalidKey)
        );
        assert_eq!(
            classify(&status(401, "Quota exceeded for this key")),
            Disposition::Fatal(SynthesisErrorKind::QuotaExceeded)
        );
        assert_eq!(
            classify(&status(402, "")),
            Disposition::Fatal(SynthesisErrorKind::QuotaExceeded)
        );
    }

    #[test]
    fn test_transient_errors() {
        assert_eq!(
            classify(&status(429, "slow down")),
            Disposition::Transient(SynthesisErrorKind::QuotaExceeded)
        );
        assert_eq!(
            classify(&status(503, "unavailable")),
            Disposition::Transient(SynthesisErrorKind::ProviderError)
        );
        assert_eq!(
            classify(&ProviderError::Timeout),
            Disposition::Transient(SynthesisErrorKind::ProviderError)
        );
        assert_eq!(
            classify(&ProviderError::Network("reset".into())),
            Disposition::Transient(SynthesisErrorKind::ProviderError)
        );
    }

    #[test]
    fn test_other_client_errors_are_fatal() {
        assert_eq!(
            classify(&status(400, "bad request")),
            Disposition::Fatal(SynthesisErrorKind::ProviderError)
        );
        assert_eq!(
            classify(&status(404, "voice not found")),
            Disposition::Fatal(SynthesisErrorKind::ProviderError)
        );
    }

    #[test]
    fn test_error_message_names_kind() {
        let err = SynthesisError::new(SynthesisErrorKind::InvalidKey, "status 401");
        assert_eq!(err.to_string(), "invalid provider credential: status 401");
    }
}
