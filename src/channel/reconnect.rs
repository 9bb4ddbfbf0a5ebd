//! Reconnect backoff policy.

use std::time::Duration;

/// Default backoff schedule: 2 s, 4 s, 8 s, 15 s, then a 30 s ceiling.
pub const DEFAULT_BACKOFF_SCHEDULE_SECS: [u64; 5] = [2, 4, 8, 15, 30];

/// Default backup reconnect-timer period.
pub const DEFAULT_BACKUP_INTERVAL: Duration = Duration::from_secs(30);

/// Reconnect timing policy for the tracking channel.
///
/// Attempts are unlimited; the schedule's last entry acts as the ceiling for
/// every attempt past the end. A separate backup timer forces an attempt if
/// the connection is still down when it fires, guarding against the backoff
/// layer stalling.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before each retry, indexed by attempt number (1-based). The
    /// last entry repeats forever.
    pub schedule: Vec<Duration>,

    /// Period of the independent backup reconnect timer.
    pub backup_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            schedule: DEFAULT_BACKOFF_SCHEDULE_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            backup_interval: DEFAULT_BACKUP_INTERVAL,
        }
    }
}

impl ReconnectPolicy {
    /// Delay to wait before reconnect attempt number `attempt` (1-based).
    ///
    /// Attempts past the schedule reuse the final (ceiling) entry. An empty
    /// schedule falls back to the backup interval.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.schedule.is_empty() {
            return self.backup_interval;
        }
        let index = (attempt.max(1) as usize - 1).min(self.schedule.len() - 1);
        self.schedule[index]
    }

    /// The ceiling delay (largest the policy will ever wait).
    pub fn ceiling(&self) -> Duration {
        self.schedule
            .last()
            .copied()
            .unwrap_or(self.backup_interval)
    }
}
