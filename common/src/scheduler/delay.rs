// Delay strategies between consecutive runs of a scheduled task

use rand::Rng;
use std::time::Duration;

/// Strategy trait for calculating the pause before the next run
pub trait DelayStrategy: Send + Sync {
    /// Delay between the end of one run and the start of the next
    fn next_delay(&self) -> Duration;
}

/// Uniformly distributed delay in `[0, 2 × period)`
///
/// The mean delay equals `period`, but tasks sharing a period do not line up
/// into synchronized bursts. There is no lower bound: a run may follow the
/// previous one almost immediately.
#[derive(Debug, Clone)]
pub struct UniformJitter {
    period: Duration,
}

impl UniformJitter {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Exclusive upper bound of the delay, in milliseconds
    fn upper_bound_ms(&self) -> u64 {
        u64::try_from(self.period.as_millis().saturating_mul(2)).unwrap_or(u64::MAX)
    }
}

impl DelayStrategy for UniformJitter {
    fn next_delay(&self) -> Duration {
        let upper_bound_ms = self.upper_bound_ms();
        if upper_bound_ms == 0 {
            return Duration::ZERO;
        }

        let delay_ms = rand::thread_rng().gen_range(0..upper_bound_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Fixed delay strategy
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl DelayStrategy for FixedDelay {
    fn next_delay(&self) -> Duration {
        self.delay
    }
}
