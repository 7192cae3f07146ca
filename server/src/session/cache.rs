use std::time::Duration;

use lamp::{DeviceStatus, LampDriver, LampState};

/// Upper bound on how long session start waits for the lamp to report.
pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(3);

/// What the lamp looked like before a session took it over.
#[derive(Debug, Default)]
pub struct LampStateCache {
    saved: Option<DeviceStatus>,
}

impl LampStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query the lamp and remember the answer. A failure or timeout leaves
    /// nothing saved, so the configured restore values are used later.
    pub async fn capture(
        &mut self,
        driver: &dyn LampDriver,
        timeout: Duration,
    ) -> Option<DeviceStatus> {
        self.saved = match tokio::time::timeout(timeout, driver.query_state()).await {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => {
                tracing::warn!(lamp = driver.name(), error = %e, "Could not capture lamp state");
                None
            }
            Err(_) => {
                tracing::warn!(lamp = driver.name(), ?timeout, "Lamp state capture timed out");
                None
            }
        };
        if let Some(status) = self.saved {
            tracing::debug!(%status, "Captured lamp state");
        }
        self.saved
    }

    /// The state to restore to, consuming the capture. Without a capture the
    /// lamp is left on at `fallback`.
    pub fn take_restore_state(&mut self, fallback: LampState) -> DeviceStatus {
        self.saved.take().unwrap_or(DeviceStatus::lit(fallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamp::mock::MockLamp;
    use lamp::Rgb;

    const FALLBACK: LampState = LampState {
        color: Rgb::new(255, 200, 100),
        brightness: 100,
    };

    #[tokio::test]
    async fn test_captured_state_is_used_once() {
        let saved = LampState::new(Rgb::new(10, 20, 30), 55);
        let lamp = MockLamp::new().with_state(saved);
        let mut cache = LampStateCache::new();

        assert_eq!(
            cache.capture(&lamp, CAPTURE_TIMEOUT).await,
            Some(DeviceStatus::lit(saved))
        );
        assert_eq!(cache.take_restore_state(FALLBACK), DeviceStatus::lit(saved));
        assert_eq!(cache.take_restore_state(FALLBACK), DeviceStatus::lit(FALLBACK));
    }

    #[tokio::test]
    async fn test_switched_off_lamp_is_remembered_off() {
        let saved = LampState::new(Rgb::new(10, 20, 30), 55);
        let lamp = MockLamp::new().with_state(saved).with_power_off();
        let mut cache = LampStateCache::new();

        let captured = cache.capture(&lamp, CAPTURE_TIMEOUT).await.unwrap();
        assert!(!captured.on);
        let restore = cache.take_restore_state(FALLBACK);
        assert_eq!(restore.state, saved);
        assert!(!restore.on);
    }

    #[tokio::test]
    async fn test_failed_capture_falls_back() {
        let lamp = MockLamp::new();
        lamp.set_failing(true);
        let mut cache = LampStateCache::new();

        assert_eq!(cache.capture(&lamp, CAPTURE_TIMEOUT).await, None);
        assert_eq!(cache.take_restore_state(FALLBACK), DeviceStatus::lit(FALLBACK));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_lamp_times_out() {
        let lamp = MockLamp::new()
            .with_state(LampState::new(Rgb::WHITE, 10))
            .with_query_delay(Duration::from_secs(10));
        let mut cache = LampStateCache::new();

        assert_eq!(cache.capture(&lamp, CAPTURE_TIMEOUT).await, None);
        assert_eq!(lamp.queries(), 1);
    }
}
