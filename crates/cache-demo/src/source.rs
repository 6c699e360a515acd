//! The slow value source every route caches

use async_trait::async_trait;
use std::time::Duration;
use tiered_cache::ValueSource;
use tracing::debug;

/// Simulates a slow database or service call that returns the time of day
pub struct SlowClock {
    delay: Duration,
}

impl SlowClock {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ValueSource for SlowClock {
    type Value = String;

    async fn produce(&self, key: &str) -> tiered_cache::Result<String> {
        debug!(key, delay_ms = self.delay.as_millis() as u64, "Computing value");
        tokio::time::sleep(self.delay).await;
        Ok(chrono::Local::now().format("%H:%M:%S%.7f").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_delay() {
        let clock = SlowClock::new(Duration::from_secs(3));
        let start = Instant::now();

        let value = clock.produce("current-time").await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(3));
        // hh:mm:ss.fffffff
        assert_eq!(value.len(), 16);
        assert_eq!(value.matches(':').count(), 2);
    }
}
