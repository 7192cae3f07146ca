use std::time::Duration;

use tokio::time::Instant;

use super::{EffectDecision, EffectKind, Pattern, Resolution};
use crate::config::ResolvedConfig;
use crate::session::state::{GameResult, TurnState};
use lamp::LampState;

/// Brightness celebrations pulse up to.
const CELEBRATION_BRIGHTNESS: u8 = 100;

/// How long the dimmed turn color shows when a game ends by abandonment.
pub const ABANDON_HOLD: Duration = Duration::from_secs(2);

/// Pick the effect for a turn state. Deterministic in all arguments.
pub fn resolve(
    turn: &TurnState,
    cfg: &ResolvedConfig,
    move_event: bool,
    now: Instant,
) -> Resolution {
    if turn.is_ended() {
        return resolve_ended(turn, cfg);
    }

    let steady = resolve_steady(turn, cfg, now);
    if move_event
        && cfg.move_notification.enabled
        && steady.priority() < EffectKind::MoveFlash.priority()
    {
        let flash = EffectDecision::new(
            EffectKind::MoveFlash,
            cfg.move_notification.state,
            Pattern::FlashOnce(cfg.move_notification.duration),
        );
        return Resolution {
            effect: flash,
            underlying: Some(steady),
        };
    }
    Resolution::steady(steady)
}

/// What plays between the end of a game and the restore, in order: the
/// dimmed turn color if the opponent walked away, then any celebration.
pub fn farewell(turn: &TurnState, cfg: &ResolvedConfig) -> Vec<EffectDecision> {
    if !turn.is_ended() {
        return Vec::new();
    }
    let mut effects = Vec::with_capacity(2);
    if turn.opponent_abandoned() {
        let color = if turn.is_viewer_turn() {
            cfg.my_turn
        } else {
            cfg.opponent_turn
        };
        effects.push(EffectDecision::new(
            EffectKind::OpponentAway,
            halved(color),
            Pattern::FlashOnce(ABANDON_HOLD),
        ));
    }
    let ended = resolve_ended(turn, cfg);
    if ended.effect.kind == EffectKind::Celebration {
        effects.push(ended.effect);
    }
    effects
}

/// Half brightness, never fully dark.
fn halved(state: LampState) -> LampState {
    LampState::new(state.color, (state.brightness / 2).max(1))
}

fn resolve_ended(turn: &TurnState, cfg: &ResolvedConfig) -> Resolution {
    let restore = EffectDecision::new(EffectKind::Restore, cfg.restore, Pattern::Solid);
    let celebration_color = match turn.result {
        Some(GameResult::Win) => Some(cfg.celebration.win_color),
        Some(GameResult::Draw) => Some(cfg.celebration.draw_color),
        _ => None,
    };
    match celebration_color {
        Some(color) if cfg.celebration.enabled => Resolution {
            effect: EffectDecision::new(
                EffectKind::Celebration,
                LampState::new(color, CELEBRATION_BRIGHTNESS),
                Pattern::Pulse(cfg.celebration.pulse_count),
            ),
            underlying: Some(restore),
        },
        _ => Resolution::steady(restore),
    }
}

fn resolve_steady(turn: &TurnState, cfg: &ResolvedConfig, now: Instant) -> EffectDecision {
    if !turn.is_viewer_turn() {
        if turn.opponent_abandoned() {
            return EffectDecision::new(
                EffectKind::OpponentAway,
                halved(cfg.opponent_turn),
                Pattern::Solid,
            );
        }
        return EffectDecision::new(EffectKind::TurnColor, cfg.opponent_turn, Pattern::Solid);
    }

    if turn.in_check && cfg.check.enabled {
        let pattern = if cfg.check.blink {
            Pattern::BlinkTripleFast
        } else {
            Pattern::Solid
        };
        return EffectDecision::new(EffectKind::Check, cfg.check.state, pattern);
    }

    let tp = &cfg.time_pressure;
    if tp.enabled {
        if let Some(left) = turn.clock_at(turn.viewer_side, now) {
            if left <= tp.critical {
                return EffectDecision::new(
                    EffectKind::TimeCritical,
                    LampState::new(tp.critical_color, tp.brightness),
                    Pattern::BlinkDoubleFast,
                );
            }
            if left <= tp.warning {
                return EffectDecision::new(
                    EffectKind::TimeWarning,
                    LampState::new(tp.warning_color, tp.brightness),
                    Pattern::BlinkSingle,
                );
            }
        }
    }

    EffectDecision::new(EffectKind::TurnColor, cfg.my_turn, Pattern::Solid)
}

/// Whether the clock can push this state across a threshold without any
/// new record arriving.
pub fn needs_clock_tick(turn: &TurnState, cfg: &ResolvedConfig) -> bool {
    !turn.is_ended()
        && turn.is_viewer_turn()
        && cfg.time_pressure.enabled
        && turn.clock.is_some()
}
