use crate::config::CrawlerConfig;
use crate::state::Controller;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Accumulated page-load timings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DelayStatistics {
    /// Sum of all recorded load durations
    pub total: Duration,

    /// Number of recorded loads
    pub loads: u32,
}

impl DelayStatistics {
    /// Mean load duration, `None` before the first load
    pub fn mean(&self) -> Option<Duration> {
        if self.loads == 0 {
            None
        } else {
            Some(self.total / self.loads)
        }
    }
}

/// Paces the crawl from observed page-load times
///
/// With dynamic pacing the pause between paginated fetches follows the mean
/// load time, never dropping below the configured minimum.
#[derive(Debug)]
pub struct DelayRegulator {
    min_delay: Duration,
    dynamic: bool,
    stats: Mutex<DelayStatistics>,
}

impl DelayRegulator {
    pub fn new(min_delay: Duration, dynamic: bool) -> Self {
        Self {
            min_delay,
            dynamic,
            stats: Mutex::new(DelayStatistics::default()),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.min_delay(), config.dynamic_delay)
    }

    fn stats(&self) -> MutexGuard<'_, DelayStatistics> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records the duration of one page load
    pub fn record_load(&self, duration: Duration) {
        let mut stats = self.stats();
        stats.total += duration;
        stats.loads += 1;
    }

    pub fn statistics(&self) -> DelayStatistics {
        *self.stats()
    }

    /// Computes the pause for one wait, scaled by `multiplier`
    ///
    /// Before the first recorded load dynamic pacing has nothing to average
    /// and returns the bare minimum.
    pub fn compute_delay(&self, multiplier: f64) -> Duration {
        let multiplier = if multiplier.is_finite() && multiplier >= 0.0 {
            multiplier
        } else {
            1.0
        };

        if !self.dynamic {
            return self.min_delay.mul_f64(multiplier);
        }

        match self.statistics().mean() {
            None => self.min_delay,
            Some(mean) => mean.max(self.min_delay).mul_f64(multiplier),
        }
    }

    /// Sleeps for `compute_delay(multiplier)`, then honours a pending pause
    ///
    /// A stop request cuts the sleep short and releases a pause.
    pub async fn sleep(&self, multiplier: f64, control: &Controller) {
        let delay = self.compute_delay(multiplier);
        tracing::debug!("Sleeping {:.2}s", delay.as_secs_f64());

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = control.stopped() => {
                tracing::debug!("Sleep cut short by stop request");
            }
        }

        control.wait_while_paused().await;
    }
}
