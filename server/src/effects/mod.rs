//! Deciding what the lamp shows, and showing it.

pub mod pattern;
pub mod resolver;
pub mod scheduler;

use std::fmt;
use std::time::Duration;

use lamp::{LampState, Rgb};

pub use resolver::{farewell, resolve};
pub use scheduler::{spawn_scheduler, SchedulerError, SchedulerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Restore,
    Celebration,
    Check,
    TimeCritical,
    TimeWarning,
    MoveFlash,
    OpponentAway,
    TurnColor,
}

impl EffectKind {
    /// Higher wins.
    pub fn priority(self) -> u8 {
        match self {
            Self::Restore => 7,
            Self::Celebration => 6,
            Self::Check => 5,
            Self::TimeCritical => 4,
            Self::TimeWarning => 3,
            Self::MoveFlash => 2,
            Self::OpponentAway => 1,
            Self::TurnColor => 0,
        }
    }

    /// Transients play and then hand the lamp back to the steady effect.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::MoveFlash | Self::Celebration)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restore => "restore",
            Self::Celebration => "celebration",
            Self::Check => "check",
            Self::TimeCritical => "time_critical",
            Self::TimeWarning => "time_warning",
            Self::MoveFlash => "move_flash",
            Self::OpponentAway => "opponent_away",
            Self::TurnColor => "turn_color",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    Solid,
    BlinkSingle,
    BlinkDoubleFast,
    BlinkTripleFast,
    Pulse(u8),
    FlashOnce(Duration),
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solid => f.write_str("solid"),
            Self::BlinkSingle => f.write_str("blink_single"),
            Self::BlinkDoubleFast => f.write_str("blink_double_fast"),
            Self::BlinkTripleFast => f.write_str("blink_triple_fast"),
            Self::Pulse(n) => write!(f, "pulse_{n}"),
            Self::FlashOnce(d) => write!(f, "flash_once_{}ms", d.as_millis()),
        }
    }
}

/// A fully resolved lamp effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectDecision {
    pub kind: EffectKind,
    pub color: Rgb,
    pub brightness: u8,
    pub pattern: Pattern,
}

impl EffectDecision {
    pub fn new(kind: EffectKind, state: LampState, pattern: Pattern) -> Self {
        Self {
            kind,
            color: state.color,
            brightness: state.brightness,
            pattern,
        }
    }

    pub fn state(&self) -> LampState {
        LampState::new(self.color, self.brightness)
    }

    pub fn priority(&self) -> u8 {
        self.kind.priority()
    }

    pub fn report(&self) -> chesslamp_proto::EffectReport {
        chesslamp_proto::EffectReport {
            kind: self.kind.to_string(),
            pattern: self.pattern.to_string(),
            color: self.color.to_string(),
            brightness: self.brightness,
        }
    }
}

/// An effect plus, for transients, the steady effect it reverts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub effect: EffectDecision,
    pub underlying: Option<EffectDecision>,
}

impl Resolution {
    pub fn steady(effect: EffectDecision) -> Self {
        Self {
            effect,
            underlying: None,
        }
    }

    /// The steady decision this resolution leaves behind.
    pub fn steady_part(&self) -> Option<EffectDecision> {
        if self.effect.kind.is_transient() {
            self.underlying
        } else {
            Some(self.effect)
        }
    }
}
