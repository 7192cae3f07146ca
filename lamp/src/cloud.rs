//! Govee developer cloud API driver.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{LampError, LampResult};
use crate::{device_brightness, DeviceStatus, LampDriver, LampState, Rgb};

pub const DEFAULT_BASE_URL: &str = "https://developer-api.govee.com";
pub const DEFAULT_MODEL: &str = "H6022";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct GoveeCloud {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    mac: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct StateData {
    #[serde(default)]
    properties: Vec<Value>,
}

impl GoveeCloud {
    pub fn new(
        api_key: impl Into<String>,
        mac: impl Into<String>,
        model: Option<String>,
    ) -> LampResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            mac: mac.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn control(&self, cmd: Value) -> LampResult<()> {
        let body = json!({
            "device": self.mac,
            "model": self.model,
            "cmd": cmd,
        });
        let response = self
            .http
            .put(format!("{}/v1/devices/control", self.base_url))
            .header("Govee-API-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        check(response).await.map(|_| ())
    }
}

async fn check(response: reqwest::Response) -> LampResult<Value> {
    let status = response.status();
    let text = response.text().await?;
    let parsed: Option<ApiResponse> = serde_json::from_str(&text).ok();

    if !status.is_success() {
        let message = parsed.map(|p| p.message).unwrap_or(text);
        return Err(LampError::Api {
            code: status.as_u16(),
            message,
        });
    }
    match parsed {
        Some(api) if api.code == 200 || api.code == 0 => Ok(api.data),
        Some(api) => Err(LampError::Api {
            code: api.code,
            message: api.message,
        }),
        None => Err(LampError::Protocol(text)),
    }
}

/// Pull color, brightness and power out of the `properties` list, which holds
/// one single-key object per property.
fn state_from_properties(properties: &[Value]) -> Option<DeviceStatus> {
    let mut color = None;
    let mut brightness = None;
    let mut on = true;
    for property in properties {
        if let Some(value) = property.get("powerState").and_then(Value::as_str) {
            on = value != "off";
        }
        if let Some(value) = property.get("color") {
            color = serde_json::from_value::<Rgb>(value.clone()).ok();
        }
        if let Some(value) = property.get("brightness").and_then(Value::as_u64) {
            brightness = Some(value.min(100) as u8);
        }
    }
    Some(DeviceStatus {
        state: LampState::new(color?, brightness?),
        on,
    })
}

#[async_trait]
impl LampDriver for GoveeCloud {
    fn name(&self) -> &'static str {
        "govee-cloud"
    }

    async fn set_color(&self, color: Rgb) -> LampResult<()> {
        tracing::debug!(%color, "Cloud color");
        self.control(json!({"name": "color", "value": {"r": color.r, "g": color.g, "b": color.b}}))
            .await
    }

    async fn set_brightness(&self, brightness: u8) -> LampResult<()> {
        tracing::debug!(brightness, "Cloud brightness");
        self.control(json!({"name": "brightness", "value": device_brightness(brightness)}))
            .await
    }

    async fn set_power(&self, on: bool) -> LampResult<()> {
        tracing::debug!(on, "Cloud turn");
        self.control(json!({"name": "turn", "value": if on { "on" } else { "off" }}))
            .await
    }

    async fn query_state(&self) -> LampResult<Option<DeviceStatus>> {
        let response = self
            .http
            .get(format!("{}/v1/devices/state", self.base_url))
            .header("Govee-API-Key", &self.api_key)
            .query(&[("device", self.mac.as_str()), ("model", self.model.as_str())])
            .send()
            .await?;
        let data = check(response).await?;
        let state: StateData =
            serde_json::from_value(data).map_err(|e| LampError::Protocol(e.to_string()))?;
        Ok(state_from_properties(&state.properties))
    }
}
