//! 重試策略與失敗分類
//!
//! 所有對上游的請求共用同一個 [`RetryPolicy`]：每頁有固定的嘗試次數，
//! 一般錯誤短暫等待，被限流 (429/5xx) 或被封鎖 (403) 時等待時間大幅拉長。

use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;

/// 單次請求失敗的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 429，或回傳 HTML 而非 JSON (疑似機器人偵測)
    RateLimited,
    /// HTTP 403
    Forbidden,
    Timeout,
    /// HTTP 5xx
    ServerError,
    Connection,
    Generic,
}

impl FailureKind {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => FailureKind::RateLimited,
            403 => FailureKind::Forbidden,
            500..=599 => FailureKind::ServerError,
            _ => FailureKind::Generic,
        }
    }

    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_connect() {
            FailureKind::Connection
        } else if let Some(status) = err.status() {
            Self::from_status(status)
        } else {
            FailureKind::Generic
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::RateLimited => "rate-limited",
            FailureKind::Forbidden => "forbidden",
            FailureKind::Timeout => "timeout",
            FailureKind::ServerError => "server-error",
            FailureKind::Connection => "connection",
            FailureKind::Generic => "generic",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 每頁最多嘗試次數 (含第一次)
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// 429 / 5xx 的基礎等待
    pub throttle_delay: Duration,
    /// 403 的基礎等待，應為最長
    pub forbidden_delay: Duration,
    /// 收到 HTML 軟封鎖後的冷卻時間
    pub soft_block_cooldown: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            throttle_delay: Duration::from_secs(30),
            forbidden_delay: Duration::from_secs(60),
            soft_block_cooldown: Duration::from_secs(60),
            max_delay: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// 測試用：所有等待歸零
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            throttle_delay: Duration::ZERO,
            forbidden_delay: Duration::ZERO,
            soft_block_cooldown: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// `attempt` 為已失敗的次數 (從 1 開始)。節流類錯誤隨次數線性遞增，上限 `max_delay`。
    pub fn delay_for(&self, kind: FailureKind, attempt: u32) -> Duration {
        let step = attempt.max(1);
        let delay = match kind {
            FailureKind::Forbidden => self.forbidden_delay.saturating_mul(step),
            FailureKind::RateLimited | FailureKind::ServerError => {
                self.throttle_delay.saturating_mul(step)
            }
            FailureKind::Timeout | FailureKind::Connection | FailureKind::Generic => {
                self.base_delay
            }
        };
        delay.min(self.max_delay.max(self.base_delay))
    }
}
