use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Freshness of a stored entry relative to the configured ttl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

impl Freshness {
    /// An entry is fresh iff `now - created_at < ttl` (all in unix millis).
    ///
    /// A `created_at` in the future (clock moved backwards) counts as age 0.
    pub fn evaluate(created_at: u64, ttl: Duration, now: u64) -> Self {
        let age = u128::from(now.saturating_sub(created_at));
        if age < ttl.as_millis() {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }

    pub fn is_fresh(self) -> bool {
        self == Freshness::Fresh
    }
}

/// Current wall-clock time in milliseconds since the unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
