//! Turning a [`FileConfig`] into fully resolved settings.
//!
//! Every color and brightness is taken from, in order: the explicit field,
//! the named theme, the hardcoded fallback. Resolution never fails.

use std::time::Duration;

use lamp::{LampState, Rgb};
use serde::{Deserialize, Serialize};

use super::theme::{find_theme, Theme};
use super::FileConfig;

const FALLBACK_MY_TURN: LampState = LampState {
    color: Rgb::new(0, 255, 0),
    brightness: 40,
};
const FALLBACK_OPPONENT_TURN: LampState = LampState {
    color: Rgb::new(255, 0, 0),
    brightness: 40,
};
const FALLBACK_RESTORE: LampState = LampState {
    color: Rgb::new(255, 200, 100),
    brightness: 100,
};
const FALLBACK_WARNING_COLOR: Rgb = Rgb::new(255, 140, 0);
const FALLBACK_CRITICAL_COLOR: Rgb = Rgb::new(255, 0, 0);
const FALLBACK_TIME_BRIGHTNESS: u8 = 100;
const FALLBACK_WARNING_SECS: u64 = 30;
const FALLBACK_CRITICAL_SECS: u64 = 10;
const FALLBACK_CHECK: LampState = LampState {
    color: Rgb::new(255, 0, 128),
    brightness: 100,
};
const FALLBACK_MOVE_FLASH: LampState = LampState {
    color: Rgb::WHITE,
    brightness: 100,
};
const FALLBACK_MOVE_FLASH_MS: u64 = 400;
const FALLBACK_WIN_COLOR: Rgb = Rgb::new(255, 215, 0);
const FALLBACK_DRAW_COLOR: Rgb = Rgb::new(0, 128, 255);
const FALLBACK_PULSE_COUNT: u8 = 3;
const MAX_PULSE_COUNT: u32 = 20;
const FALLBACK_DIM_MS: u64 = 1500;

/// Settings changed through the control surface. They sit on top of the
/// file and survive reloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOverrides {
    pub theme: Option<String>,
    pub gradual_dim_enabled: Option<bool>,
    pub gradual_dim_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePressure {
    pub enabled: bool,
    pub warning: Duration,
    pub critical: Duration,
    pub warning_color: Rgb,
    pub critical_color: Rgb,
    pub brightness: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSettings {
    pub enabled: bool,
    pub blink: bool,
    pub state: LampState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveNotification {
    pub enabled: bool,
    pub state: LampState,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Celebration {
    pub enabled: bool,
    pub win_color: Rgb,
    pub draw_color: Rgb,
    pub pulse_count: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradualDim {
    pub enabled: bool,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Name of the theme in effect, if a known one was named.
    pub theme: Option<&'static str>,
    pub my_turn: LampState,
    pub opponent_turn: LampState,
    pub time_pressure: TimePressure,
    pub check: CheckSettings,
    pub move_notification: MoveNotification,
    pub celebration: Celebration,
    pub restore: LampState,
    pub gradual_dim: GradualDim,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        resolve(&FileConfig::default(), &RuntimeOverrides::default())
    }
}

fn brightness(value: Option<u32>) -> Option<u8> {
    value.map(|b| b.min(100) as u8)
}

fn state(
    color: Option<Rgb>,
    level: Option<u32>,
    theme_color: Option<Rgb>,
    theme_level: Option<u8>,
    fallback: LampState,
) -> LampState {
    LampState {
        color: color.or(theme_color).unwrap_or(fallback.color),
        brightness: brightness(level)
            .or(theme_level)
            .unwrap_or(fallback.brightness),
    }
}

pub fn resolve(file: &FileConfig, overrides: &RuntimeOverrides) -> ResolvedConfig {
    let theme_name = overrides.theme.as_deref().or(file.theme.as_deref());
    let theme: Option<&Theme> = theme_name.and_then(|name| {
        let found = find_theme(name);
        if found.is_none() {
            tracing::warn!(theme = name, "Unknown theme, using defaults");
        }
        found
    });

    let my_turn = state(
        file.my_turn_color,
        file.my_turn_brightness,
        theme.map(|t| t.my_turn_color),
        theme.map(|t| t.my_turn_brightness),
        FALLBACK_MY_TURN,
    );
    let opponent_turn = state(
        file.opponent_turn_color,
        file.opponent_turn_brightness,
        theme.map(|t| t.opponent_turn_color),
        theme.map(|t| t.opponent_turn_brightness),
        FALLBACK_OPPONENT_TURN,
    );

    let critical_secs = file.time_pressure_critical.unwrap_or(FALLBACK_CRITICAL_SECS);
    let warning_secs = file
        .time_pressure_warning
        .unwrap_or(FALLBACK_WARNING_SECS)
        .max(critical_secs);
    let time_pressure = TimePressure {
        enabled: file.time_pressure_enabled.unwrap_or(true),
        warning: Duration::from_secs(warning_secs),
        critical: Duration::from_secs(critical_secs),
        warning_color: file.time_warning_color.unwrap_or(FALLBACK_WARNING_COLOR),
        critical_color: file.time_critical_color.unwrap_or(FALLBACK_CRITICAL_COLOR),
        brightness: brightness(file.time_pressure_brightness).unwrap_or(FALLBACK_TIME_BRIGHTNESS),
    };

    let check = CheckSettings {
        enabled: file.check_detection_enabled.unwrap_or(true),
        blink: file.check_blink_enabled.unwrap_or(true),
        state: state(
            file.check_color,
            file.check_brightness,
            theme.and_then(|t| t.check_color),
            None,
            FALLBACK_CHECK,
        ),
    };

    let move_notification = MoveNotification {
        enabled: file.move_notification_enabled.unwrap_or(true),
        state: state(
            file.move_notification_color,
            file.move_notification_brightness,
            theme.and_then(|t| t.move_notification_color),
            None,
            FALLBACK_MOVE_FLASH,
        ),
        duration: Duration::from_millis(
            file.move_notification_duration_ms
                .unwrap_or(FALLBACK_MOVE_FLASH_MS),
        ),
    };

    let celebration = Celebration {
        enabled: file.celebration_enabled.unwrap_or(true),
        win_color: file.celebration_win_color.unwrap_or(FALLBACK_WIN_COLOR),
        draw_color: file.celebration_draw_color.unwrap_or(FALLBACK_DRAW_COLOR),
        pulse_count: file
            .celebration_pulse_count
            .map(|n| n.clamp(1, MAX_PULSE_COUNT) as u8)
            .unwrap_or(FALLBACK_PULSE_COUNT),
    };

    let restore = state(
        file.restore_color,
        file.restore_brightness,
        None,
        None,
        FALLBACK_RESTORE,
    );

    let gradual_dim = GradualDim {
        enabled: overrides
            .gradual_dim_enabled
            .or(file.gradual_dim_enabled)
            .unwrap_or(false),
        duration: Duration::from_millis(
            overrides
                .gradual_dim_duration_ms
                .or(file.gradual_dim_duration_ms)
                .unwrap_or(FALLBACK_DIM_MS),
        ),
    };

    ResolvedConfig {
        theme: theme.map(|t| t.name),
        my_turn,
        opponent_turn,
        time_pressure,
        check,
        move_notification,
        celebration,
        restore,
        gradual_dim,
    }
}
