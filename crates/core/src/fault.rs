use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;

/// Decides whether a simulated operation fails.
#[derive(Debug, Clone, Default)]
pub enum FaultInjector {
    #[default]
    Never,
    Always,
    /// Fails with the given probability in `0.0..=1.0`.
    Rate(f64),
    /// Replays recorded outcomes (`true` = fail) in order, then succeeds.
    Scripted(Arc<Mutex<VecDeque<bool>>>),
}

impl FaultInjector {
    #[must_use]
    pub fn scripted(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self::Scripted(Arc::new(Mutex::new(outcomes.into_iter().collect())))
    }

    #[must_use]
    pub fn should_fail(&self) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Rate(rate) => {
                let rate = rate.clamp(0.0, 1.0);
                rate > 0.0 && rand::thread_rng().gen_bool(rate)
            }
            Self::Scripted(outcomes) => outcomes
                .lock()
                .ok()
                .and_then(|mut outcomes| outcomes.pop_front())
                .unwrap_or(false),
        }
    }
}

/// Simulated wait before an operation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Latency {
    #[default]
    None,
    Fixed(Duration),
    Between(Duration, Duration),
}

impl Latency {
    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        if millis == 0 {
            Self::None
        } else {
            Self::Fixed(Duration::from_millis(millis))
        }
    }

    #[must_use]
    pub fn between_millis(min: u64, max: u64) -> Self {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        if high == 0 {
            Self::None
        } else if low == high {
            Self::Fixed(Duration::from_millis(low))
        } else {
            Self::Between(Duration::from_millis(low), Duration::from_millis(high))
        }
    }

    #[must_use]
    pub fn sample(self) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(duration) => duration,
            Self::Between(min, max) => rand::thread_rng().gen_range(min..=max),
        }
    }

    pub async fn wait(self) {
        let duration = self.sample();
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{FaultInjector, Latency};

    #[test]
    fn fixed_strategies_are_deterministic() {
        assert!(!FaultInjector::Never.should_fail());
        assert!(FaultInjector::Always.should_fail());
        assert!(!FaultInjector::Rate(0.0).should_fail());
        assert!(FaultInjector::Rate(1.0).should_fail());
    }

    #[test]
    fn scripted_outcomes_replay_in_order_then_succeed() {
        let injector = FaultInjector::scripted([true, false, true]);
        let clone = injector.clone();

        assert!(injector.should_fail());
        assert!(!clone.should_fail());
        assert!(injector.should_fail());
        assert!(!injector.should_fail());
        assert!(!clone.should_fail());
    }

    #[test]
    fn latency_samples_stay_within_bounds() {
        assert_eq!(Latency::from_millis(0), Latency::None);
        assert_eq!(Latency::between_millis(0, 0).sample(), Duration::ZERO);
        assert_eq!(
            Latency::between_millis(30, 30),
            Latency::Fixed(Duration::from_millis(30))
        );

        let latency = Latency::between_millis(20, 10);
        for _ in 0..50 {
            let sample = latency.sample();
            assert!(sample >= Duration::from_millis(10));
            assert!(sample <= Duration::from_millis(20));
        }
    }
}
