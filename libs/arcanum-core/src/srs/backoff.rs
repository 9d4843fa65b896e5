//! Review interval progression.

use chrono::Duration;

/// Days between reviews at each stage. Doubling steps implement the
/// spacing effect; the last stage repeats forever (items are never
/// retired from review).
const DEFAULT_DAYS: [i64; 7] = [1, 2, 4, 8, 16, 32, 64];

/// Strictly increasing interval table indexed by stage.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    days: Vec<i64>,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            days: DEFAULT_DAYS.to_vec(),
        }
    }
}

impl BackoffSchedule {
    /// Build a custom schedule. Returns `None` unless `days` is non-empty
    /// and strictly increasing, which is what keeps interval growth
    /// monotonic across stages.
    pub fn from_days(days: &[i64]) -> Option<Self> {
        if days.is_empty() || days[0] < 1 {
            return None;
        }
        if days.windows(2).any(|w| w[0] >= w[1]) {
            return None;
        }
        Some(Self {
            days: days.to_vec(),
        })
    }

    /// Interval for a stage, clamped to the final stage.
    pub fn interval(&self, stage: u32) -> Duration {
        let idx = (stage as usize).min(self.days.len() - 1);
        Duration::days(self.days[idx])
    }

    /// Highest stage an item can reach.
    pub fn max_stage(&self) -> u32 {
        (self.days.len() - 1) as u32
    }
}
