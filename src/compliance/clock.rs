//! Time source
//!
//! 台帳の全ての日時計算はこの時計を経由する。

use chrono::{DateTime, Duration, Utc};
use std::sync::RwLock;

/// 現在時刻の供給元
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// システム時計
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手動で進める時計（テスト・過去データの取り込み用）
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// 時刻を設定
    pub fn set(&self, now: DateTime<Utc>) {
        match self.now.write() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    /// 時刻を進める
    pub fn advance(&self, by: Duration) {
        let next = self.now() + by;
        self.set(next);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
