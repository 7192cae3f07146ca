//! Turns raw [`GameRecord`]s into [`TurnState`]s.
//!
//! Pure: the caller keeps the previous state and decides what to do with a
//! rejected record (log it and keep the previous state).

use chess::Side;
use lichess_client::{GameRecord, GameStatus, SnapshotRecord, TerminalRecord, UpdateRecord};
use tokio::time::Instant;

use super::state::{ClockReading, GameResult, SessionStatus, TurnState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpretError {
    #[error("{0} record before any snapshot")]
    NoBaseline(&'static str),
    #[error("record after the game ended")]
    AlreadyEnded,
    #[error("move count went backwards ({previous} -> {current})")]
    MoveCountDecreased { previous: u32, current: u32 },
    #[error("{side} to move contradicts move count {move_count}")]
    ParityMismatch { side: Side, move_count: u32 },
    #[error("snapshot for game {got} on the stream of {expected}")]
    GameMismatch { expected: String, got: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    pub state: TurnState,
    /// True exactly when `move_count` strictly increased.
    pub move_event: bool,
}

pub fn interpret(
    previous: Option<&TurnState>,
    record: &GameRecord,
    viewer: Side,
    now: Instant,
) -> Result<Interpretation, InterpretError> {
    if previous.is_some_and(TurnState::is_ended) {
        return Err(InterpretError::AlreadyEnded);
    }
    match record {
        GameRecord::Snapshot(snapshot) => from_snapshot(previous, snapshot, viewer, now),
        GameRecord::Update(update) => {
            let previous = previous.ok_or(InterpretError::NoBaseline("update"))?;
            from_update(previous, update, now)
        }
        GameRecord::Terminal(terminal) => {
            let previous = previous.ok_or(InterpretError::NoBaseline("terminal"))?;
            from_terminal(previous, terminal)
        }
    }
}

fn check_count(previous: Option<&TurnState>, current: u32) -> Result<bool, InterpretError> {
    match previous {
        Some(prev) if current < prev.move_count => Err(InterpretError::MoveCountDecreased {
            previous: prev.move_count,
            current,
        }),
        Some(prev) => Ok(current > prev.move_count),
        None => Ok(false),
    }
}

fn check_parity(first_to_move: Side, side: Side, move_count: u32) -> Result<(), InterpretError> {
    if TurnState::expected_side(first_to_move, move_count) != side {
        return Err(InterpretError::ParityMismatch { side, move_count });
    }
    Ok(())
}

fn from_snapshot(
    previous: Option<&TurnState>,
    snapshot: &SnapshotRecord,
    viewer: Side,
    now: Instant,
) -> Result<Interpretation, InterpretError> {
    if let Some(prev) = previous {
        if prev.game_id != snapshot.game_id {
            return Err(InterpretError::GameMismatch {
                expected: prev.game_id.clone(),
                got: snapshot.game_id.clone(),
            });
        }
    }
    let move_event = check_count(previous, snapshot.move_count)?;
    check_parity(
        snapshot.first_to_move,
        snapshot.side_to_move,
        snapshot.move_count,
    )?;

    let finished = snapshot.status.is_finished();
    let viewer = previous.map_or(viewer, |p| p.viewer_side);
    Ok(Interpretation {
        state: TurnState {
            game_id: snapshot.game_id.clone(),
            viewer_side: viewer,
            first_to_move: snapshot.first_to_move,
            active_side: snapshot.side_to_move,
            clock: snapshot.clocks.map(|clocks| ClockReading {
                clocks,
                observed_at: now,
            }),
            in_check: snapshot.in_check,
            move_count: snapshot.move_count,
            status: if finished {
                SessionStatus::Ended
            } else {
                SessionStatus::Ongoing
            },
            result: finished
                .then(|| GameResult::from_winner(snapshot.winner, snapshot.status, viewer)),
            lichess_status: snapshot.status,
            opponent_connected: snapshot.presence.connected(viewer.opponent()),
        },
        move_event,
    })
}

fn from_update(
    previous: &TurnState,
    update: &UpdateRecord,
    now: Instant,
) -> Result<Interpretation, InterpretError> {
    let move_event = check_count(Some(previous), update.move_count)?;
    check_parity(previous.first_to_move, update.side_to_move, update.move_count)?;

    // Without fresh clocks, freeze the old reading as of now so the
    // extrapolation follows the new side to move.
    let clock = match update.clocks {
        Some(clocks) => Some(ClockReading {
            clocks,
            observed_at: now,
        }),
        None => previous.clock_snapshot(now),
    };

    Ok(Interpretation {
        state: TurnState {
            active_side: update.side_to_move,
            clock,
            in_check: update.in_check,
            move_count: update.move_count,
            lichess_status: GameStatus::Started,
            ..previous.clone()
        },
        move_event,
    })
}

fn from_terminal(
    previous: &TurnState,
    terminal: &TerminalRecord,
) -> Result<Interpretation, InterpretError> {
    let move_count = terminal.move_count.unwrap_or(previous.move_count);
    let move_event = check_count(Some(previous), move_count)?;

    Ok(Interpretation {
        state: TurnState {
            move_count,
            status: SessionStatus::Ended,
            result: Some(GameResult::from_winner(
                terminal.winner,
                terminal.status,
                previous.viewer_side,
            )),
            lichess_status: terminal.status,
            ..previous.clone()
        },
        move_event,
    })
}
