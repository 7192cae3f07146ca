use async_trait::async_trait;

use crate::error::LampResult;
use crate::{DeviceStatus, LampDriver, Rgb};

/// Tries the primary driver first and falls back to the secondary on error.
pub struct FallbackLamp<P, S> {
    primary: P,
    secondary: S,
}

impl<P: LampDriver, S: LampDriver> FallbackLamp<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl<P: LampDriver, S: LampDriver> LampDriver for FallbackLamp<P, S> {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn set_color(&self, color: Rgb) -> LampResult<()> {
        match self.primary.set_color(color).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!(driver = self.primary.name(), error = %e, "Falling back for set_color");
                self.secondary.set_color(color).await
            }
        }
    }

    async fn set_brightness(&self, brightness: u8) -> LampResult<()> {
        match self.primary.set_brightness(brightness).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!(driver = self.primary.name(), error = %e, "Falling back for set_brightness");
                self.secondary.set_brightness(brightness).await
            }
        }
    }

    async fn set_power(&self, on: bool) -> LampResult<()> {
        match self.primary.set_power(on).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!(driver = self.primary.name(), error = %e, "Falling back for set_power");
                self.secondary.set_power(on).await
            }
        }
    }

    /// A primary that answers but cannot report its state also falls back.
    async fn query_state(&self) -> LampResult<Option<DeviceStatus>> {
        match self.primary.query_state().await {
            Ok(Some(status)) => Ok(Some(status)),
            Ok(None) => self.secondary.query_state().await,
            Err(e) => {
                tracing::debug!(driver = self.primary.name(), error = %e, "Falling back for query_state");
                self.secondary.query_state().await
            }
        }
    }
}
