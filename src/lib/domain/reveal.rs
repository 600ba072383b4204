use std::time::Duration;

/// Default minimum wait between commit and reveal.
pub const DEFAULT_REVEAL_DELAY: Duration = Duration::from_secs(30 * 60);

/// Outcome of a reveal-delay check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealStatus {
    pub allowed: bool,
    pub remaining_secs: u64,
}

/// Pure time check for the commit → reveal delay.
///
/// Advisory on the client; the ledger enforces the same rule. Re-evaluated on
/// demand, so there is nothing to cancel while waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealGate {
    delay_secs: u64,
}

impl RevealGate {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay_secs: delay.as_secs(),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    /// `allowed` iff `now >= commit_ts + delay`.
    pub fn can_reveal(&self, commit_ts: u64, now: u64) -> RevealStatus {
        let unlock_at = commit_ts.saturating_add(self.delay_secs);
        RevealStatus {
            allowed: now >= unlock_at,
            remaining_secs: unlock_at.saturating_sub(now),
        }
    }
}

impl Default for RevealGate {
    fn default() -> Self {
        Self::new(DEFAULT_REVEAL_DELAY)
    }
}
