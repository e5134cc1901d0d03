use std::collections::HashMap;
use tracing::warn;

/// 1オリジンあたりのロビー数のデフォルト上限
pub const DEFAULT_LOBBIES_PER_ORIGIN: u32 = 5;

/// オリジン（IPアドレス）ごとのホスト中ロビー数
///
/// カウントが0になったエントリは即座に削除する
#[derive(Debug)]
pub struct QuotaTracker {
    cap: u32,
    counts: HashMap<String, u32>,
}

impl QuotaTracker {
    pub fn new(cap: u32) -> Self {
        Self {
            cap,
            counts: HashMap::new(),
        }
    }

    pub fn count(&self, origin: &str) -> u32 {
        self.counts.get(origin).copied().unwrap_or(0)
    }

    pub fn is_exhausted(&self, origin: &str) -> bool {
        self.count(origin) >= self.cap
    }

    /// 上限に達していなければ1つ確保する
    pub fn try_reserve(&mut self, origin: &str) -> bool {
        if self.is_exhausted(origin) {
            return false;
        }
        *self.counts.entry(origin.to_owned()).or_insert(0) += 1;
        true
    }

    /// `try_reserve` で確保した分を1つ返却
    pub fn release(&mut self, origin: &str) {
        let Some(count) = self.counts.get_mut(origin) else {
            warn!(origin, "quota released without a reservation");
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(origin);
        }
    }

    /// エントリを持つオリジン数
    pub fn tracked_origins(&self) -> usize {
        self.counts.len()
    }
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LOBBIES_PER_ORIGIN)
    }
}
