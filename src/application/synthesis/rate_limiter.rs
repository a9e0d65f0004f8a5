//! 速率与并发控制
//!
//! - TokenBucket: 每次调用服务端前消耗一个令牌，按时间连续补充
//! - ConcurrencyLimiter: 限制同时在途的请求数，支持按错误率自适应收缩
//!
//! 两者都被所有任务共享，锁只保护计数，不跨 await 持有。

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::error::SynthesisError;

// ============================================================================
// Token Bucket
// ============================================================================

/// 令牌桶配置
#[derive(Debug, Clone)]
pub struct TokenBucketConfig {
    /// 桶容量（也是初始令牌数）
    pub capacity: u32,
    /// 每个 refill_interval 补充的令牌数，0 表示不补充
    pub refill_amount: u32,
    pub refill_interval: Duration,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            refill_amount: 50,
            refill_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// 令牌桶
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    /// 每秒补充的令牌数
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(config: &TokenBucketConfig) -> Self {
        let interval = config.refill_interval.as_secs_f64();
        let refill_per_sec = if interval > 0.0 {
            config.refill_amount as f64 / interval
        } else {
            0.0
        };

        Self {
            capacity: config.capacity as f64,
            refill_per_sec,
            state: Mutex::new(BucketState {
                tokens: config.capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// 尝试取一个令牌
    ///
    /// 失败时返回还需等待的时长；不会补充时返回 None
    pub fn try_acquire(&self) -> Result<(), Option<Duration>> {
        let mut state = self.state.lock();
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }

        if self.refill_per_sec <= 0.0 {
            return Err(None);
        }
        let missing = 1.0 - state.tokens;
        Err(Some(Duration::from_secs_f64(missing / self.refill_per_sec)))
    }

    /// 等待一个令牌，最长等待 `timeout`
    pub async fn acquire(&self, timeout: Duration) -> Result<(), SynthesisError> {
        let deadline = Instant::now() + timeout;

        loop {
            let wait = match self.try_acquire() {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Token bucket wait timed out");
                return Err(SynthesisError::rate_limit_timeout("rate limit token"));
            }

            let wake_at = match wait {
                Some(wait) => (now + wait).min(deadline),
                None => deadline,
            };
            tokio::time::sleep_until(wake_at).await;
        }
    }

    /// 当前可用令牌数（向下取整）
    pub fn available(&self) -> u32 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens.floor() as u32
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            state.last_refill = now;
        }
    }
}

// ============================================================================
// Concurrency Limiter
// ============================================================================

/// 自适应限流配置
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    pub enabled: bool,
    /// 窗口内错误数达到 `error_threshold * max_concurrent` 时收缩
    pub error_threshold: f64,
    pub window: Duration,
    /// 最近一次错误 / 调整后多久才允许放大
    pub cooldown: Duration,
    pub decrease_step: usize,
    pub increase_step: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            error_threshold: 0.5,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
            decrease_step: 1,
            increase_step: 1,
        }
    }
}

/// 并发限制配置
#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    pub max_concurrent: usize,
    /// 自适应收缩的下限
    pub min_concurrent: usize,
    pub adaptive: AdaptiveConfig,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            min_concurrent: 1,
            adaptive: AdaptiveConfig::default(),
        }
    }
}

#[derive(Debug)]
struct LimiterState {
    active: usize,
    ceiling: usize,
    recent_errors: VecDeque<Instant>,
    last_error: Option<Instant>,
    last_adjust: Instant,
}

/// 并发限制器
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    max_concurrent: usize,
    floor: usize,
    adaptive: AdaptiveConfig,
    state: Mutex<LimiterState>,
    released: Notify,
}

/// 并发槽位，drop 时归还
#[derive(Debug)]
pub struct ConcurrencyPermit<'a> {
    limiter: &'a ConcurrencyLimiter,
}

impl Drop for ConcurrencyPermit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

impl ConcurrencyLimiter {
    pub fn new(config: &ConcurrencyConfig) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        let floor = config.min_concurrent.clamp(1, max_concurrent);

        Self {
            max_concurrent,
            floor,
            adaptive: config.adaptive.clone(),
            state: Mutex::new(LimiterState {
                active: 0,
                ceiling: max_concurrent,
                recent_errors: VecDeque::new(),
                last_error: None,
                last_adjust: Instant::now(),
            }),
            released: Notify::new(),
        }
    }

    /// 非阻塞获取槽位
    pub fn try_acquire(&self) -> Option<ConcurrencyPermit<'_>> {
        let mut state = self.state.lock();
        if state.active < state.ceiling {
            state.active += 1;
            Some(ConcurrencyPermit { limiter: self })
        } else {
            None
        }
    }

    /// 等待槽位，最长等待 `timeout`
    pub async fn acquire(&self, timeout: Duration) -> Result<ConcurrencyPermit<'_>, SynthesisError> {
        let deadline = Instant::now() + timeout;

        loop {
            // 先注册再检查，避免错过检查与等待之间的 release
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(permit) = self.try_acquire() {
                return Ok(permit);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    ceiling = self.ceiling(),
                    "Concurrency slot wait timed out"
                );
                return Err(SynthesisError::rate_limit_timeout("concurrency slot"));
            }
        }
    }

    /// 记录一次可重试错误，必要时收缩上限
    pub fn record_error(&self) {
        if !self.adaptive.enabled {
            return;
        }

        let now = Instant::now();
        let mut state = self.state.lock();
        state.last_error = Some(now);
        state.recent_errors.push_back(now);
        while let Some(&oldest) = state.recent_errors.front() {
            if now.duration_since(oldest) > self.adaptive.window {
                state.recent_errors.pop_front();
            } else {
                break;
            }
        }

        let threshold = (self.adaptive.error_threshold * self.max_concurrent as f64)
            .ceil()
            .max(1.0) as usize;
        if state.recent_errors.len() >= threshold && state.ceiling > self.floor {
            let previous = state.ceiling;
            state.ceiling = previous
                .saturating_sub(self.adaptive.decrease_step)
                .max(self.floor);
            state.recent_errors.clear();
            state.last_adjust = now;
            tracing::warn!(
                from = previous,
                to = state.ceiling,
                "Provider errors above threshold, lowering concurrency"
            );
        }
    }

    /// 记录一次成功，冷却期后放大上限
    pub fn record_success(&self) {
        if !self.adaptive.enabled {
            return;
        }

        let now = Instant::now();
        let raised = {
            let mut state = self.state.lock();
            let calm = state
                .last_error
                .map_or(true, |t| now.duration_since(t) >= self.adaptive.cooldown);
            let settled = now.duration_since(state.last_adjust) >= self.adaptive.cooldown;

            if state.ceiling < self.max_concurrent && calm && settled {
                let previous = state.ceiling;
                state.ceiling = (previous + self.adaptive.increase_step).min(self.max_concurrent);
                state.last_adjust = now;
                tracing::info!(from = previous, to = state.ceiling, "Raising concurrency");
                true
            } else {
                false
            }
        };

        if raised {
            self.released.notify_waiters();
        }
    }

    /// 当前生效的并发上限
    pub fn ceiling(&self) -> usize {
        self.state.lock().ceiling
    }

    pub fn active(&self) -> usize {
        self.state.lock().active
    }

    fn release(&self) {
        {
            let mut state = self.state.lock();
            state.active = state.active.saturating_sub(1);
        }
        self.released.notify_waiters();
    }
}
