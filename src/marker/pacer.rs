use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

use crate::config::DelayConfig;

/// Picks a random duration within `range_ms`, in milliseconds.
pub fn random_delay<R: Rng>(rng: &mut R, range_ms: &RangeInclusive<u64>) -> Duration {
    Duration::from_millis(rng.gen_range(range_ms.clone()))
}

/// Stands in for the time real marking work takes.
#[derive(Debug, Clone)]
pub struct Pacer {
    delays: DelayConfig,
}

impl Pacer {
    pub fn new(delays: DelayConfig) -> Self {
        Self { delays }
    }

    /// Time taken to read one rubric line.
    pub async fn review<R: Rng>(&self, rng: &mut R) {
        pause(random_delay(rng, &self.delays.review_ms)).await;
    }

    /// Time taken to grade one question.
    pub async fn grade<R: Rng>(&self, rng: &mut R) {
        pause(random_delay(rng, &self.delays.grade_ms)).await;
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.delays.idle_ms)
    }
}

async fn pause(duration: Duration) {
    if duration.is_zero() {
        // Still give other markers a turn on the runtime.
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_delay_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let d = random_delay(&mut rng, &(10..=20));
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
    }

    #[test]
    fn random_delay_fixed_range() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(random_delay(&mut rng, &(0..=0)), Duration::ZERO);
    }

    #[tokio::test]
    async fn instant_pacer_returns_immediately() {
        let pacer = Pacer::new(DelayConfig::instant());
        let mut rng = StdRng::seed_from_u64(3);
        let started = std::time::Instant::now();
        pacer.review(&mut rng).await;
        pacer.grade(&mut rng).await;
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(pacer.idle_interval(), Duration::from_millis(1));
    }
}
