use chesslamp_proto::{SessionReport, StatusReport};
use tokio::time::Instant;

use super::state::TurnState;
use crate::config::ResolvedConfig;
use crate::effects::EffectDecision;

/// Wire view of the turn state.
pub fn session_report(turn: &TurnState, now: Instant) -> SessionReport {
    SessionReport {
        game_id: turn.game_id.clone(),
        viewer: turn.viewer_side.to_string(),
        side_to_move: turn.active_side.to_string(),
        move_count: turn.move_count,
        in_check: turn.in_check,
        status: turn.lichess_status.to_string(),
        result: turn.result.map(|r| r.as_str().to_string()),
        viewer_clock_ms: turn
            .clock_at(turn.viewer_side, now)
            .map(|d| d.as_millis() as u64),
    }
}

pub fn status_report(
    enabled: bool,
    cfg: &ResolvedConfig,
    turn: Option<&TurnState>,
    effect: Option<EffectDecision>,
    now: Instant,
) -> StatusReport {
    StatusReport {
        enabled,
        theme: cfg.theme.map(str::to_string),
        gradual_dim_enabled: cfg.gradual_dim.enabled,
        gradual_dim_duration_ms: cfg.gradual_dim.duration.as_millis() as u64,
        session: turn.map(|t| session_report(t, now)),
        effect: effect.map(|e| e.report()),
    }
}
