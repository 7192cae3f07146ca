//! Mock lamp for testing - only compiled in test mode or with mock feature

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{LampError, LampResult};
use crate::{DeviceStatus, LampCommand, LampDriver, LampState, Rgb};

/// Records every command it accepts, with the (tokio) instant it arrived.
/// `Apply` is recorded as its two primitive commands.
#[derive(Clone, Default)]
pub struct MockLamp {
    inner: Arc<Mutex<MockLampState>>,
}

#[derive(Default)]
struct MockLampState {
    log: Vec<(Instant, LampCommand)>,
    failing: bool,
    fail_next: usize,
    attempts: usize,
    state: Option<DeviceStatus>,
    query_delay: Option<Duration>,
    queries: usize,
}

impl MockLamp {
    pub fn new() -> Self {
        Self::default()
    }

    /// State reported by `query_state`, switched on.
    pub fn with_state(self, state: LampState) -> Self {
        self.inner.lock().unwrap().state = Some(DeviceStatus::lit(state));
        self
    }

    /// Report the lamp as switched off.
    pub fn with_power_off(self) -> Self {
        if let Some(status) = self.inner.lock().unwrap().state.as_mut() {
            status.on = false;
        }
        self
    }

    /// Make `query_state` take this long before answering.
    pub fn with_query_delay(self, delay: Duration) -> Self {
        self.inner.lock().unwrap().query_delay = Some(delay);
        self
    }

    /// Fail every call until switched off.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap().failing = failing;
    }

    /// Fail the next `n` commands.
    pub fn fail_next(&self, n: usize) {
        self.inner.lock().unwrap().fail_next = n;
    }

    pub fn commands(&self) -> Vec<LampCommand> {
        self.inner.lock().unwrap().log.iter().map(|(_, c)| *c).collect()
    }

    pub fn timeline(&self) -> Vec<(Instant, LampCommand)> {
        self.inner.lock().unwrap().log.clone()
    }

    pub fn attempts(&self) -> usize {
        self.inner.lock().unwrap().attempts
    }

    pub fn queries(&self) -> usize {
        self.inner.lock().unwrap().queries
    }

    /// Color and brightness the lamp would show after the recorded commands.
    /// Power switches are ignored.
    pub fn current(&self) -> (Option<Rgb>, Option<u8>) {
        let inner = self.inner.lock().unwrap();
        let mut color = None;
        let mut brightness = None;
        for (_, command) in &inner.log {
            match command {
                LampCommand::SetColor(c) => color = Some(*c),
                LampCommand::SetBrightness(b) => brightness = Some(*b),
                LampCommand::SetPower(_) => {}
                LampCommand::Apply(s) => {
                    color = Some(s.color);
                    brightness = Some(s.brightness);
                }
            }
        }
        (color, brightness)
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().log.clear()
    }

    fn record(&self, command: LampCommand) -> LampResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts += 1;
        if inner.failing {
            return Err(LampError::Protocol("mock lamp failing".into()));
        }
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(LampError::Protocol("mock lamp failure".into()));
        }
        inner.log.push((Instant::now(), command));
        Ok(())
    }
}

#[async_trait]
impl LampDriver for MockLamp {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn set_color(&self, color: Rgb) -> LampResult<()> {
        self.record(LampCommand::SetColor(color))
    }

    async fn set_brightness(&self, brightness: u8) -> LampResult<()> {
        self.record(LampCommand::SetBrightness(brightness))
    }

    async fn set_power(&self, on: bool) -> LampResult<()> {
        self.record(LampCommand::SetPower(on))
    }

    async fn query_state(&self) -> LampResult<Option<DeviceStatus>> {
        let (delay, failing, state) = {
            let mut inner = self.inner.lock().unwrap();
            inner.queries += 1;
            (inner.query_delay, inner.failing, inner.state)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(LampError::Protocol("mock lamp failing".into()));
        }
        Ok(state)
    }
}
