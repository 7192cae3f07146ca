use std::time::Duration;

use chess::Side;
use lichess_client::{Clocks, GameStatus};
use tokio::time::Instant;

/// Lichess only starts the clocks once both sides have moved.
const CLOCK_START_PLY: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Ongoing,
    Ended,
}

/// Outcome relative to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Win,
    Loss,
    Draw,
    Unknown,
}

impl GameResult {
    pub fn from_winner(winner: Option<Side>, status: GameStatus, viewer: Side) -> Self {
        match winner {
            Some(side) if side == viewer => Self::Win,
            Some(_) => Self::Loss,
            None if status.is_drawish() => Self::Draw,
            None => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Loss => "loss",
            Self::Draw => "draw",
            Self::Unknown => "unknown",
        }
    }
}

/// Clock values together with the instant they were reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    pub clocks: Clocks,
    pub observed_at: Instant,
}

/// Canonical view of the monitored game. Replaced wholesale on every
/// accepted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnState {
    pub game_id: String,
    pub viewer_side: Side,
    /// Side that moved at `move_count == 0`.
    pub first_to_move: Side,
    pub active_side: Side,
    pub clock: Option<ClockReading>,
    pub in_check: bool,
    pub move_count: u32,
    pub status: SessionStatus,
    pub result: Option<GameResult>,
    pub lichess_status: GameStatus,
    /// As of the last full game object.
    pub opponent_connected: bool,
}

impl TurnState {
    pub fn is_viewer_turn(&self) -> bool {
        self.active_side == self.viewer_side
    }

    pub fn is_ended(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    /// The opponent walked away: an abandoned game, a timeout or flag won by
    /// the viewer, or a dropped connection while it is the opponent's move.
    pub fn opponent_abandoned(&self) -> bool {
        match self.status {
            SessionStatus::Ended => match self.lichess_status {
                GameStatus::Abandoned => true,
                GameStatus::Timeout | GameStatus::OutOfTime => {
                    self.result == Some(GameResult::Win)
                }
                _ => false,
            },
            SessionStatus::Ongoing => !self.opponent_connected && !self.is_viewer_turn(),
        }
    }

    /// Side that must be to move after `move_count` plies.
    pub fn expected_side(first_to_move: Side, move_count: u32) -> Side {
        first_to_move.after_plies(move_count)
    }

    fn clock_running(&self) -> bool {
        self.status == SessionStatus::Ongoing && self.move_count >= CLOCK_START_PLY
    }

    /// Remaining time for `side` at `now`, extrapolating the running clock.
    pub fn clock_at(&self, side: Side, now: Instant) -> Option<Duration> {
        let reading = self.clock?;
        let remaining = reading.clocks.remaining(side);
        if side == self.active_side && self.clock_running() {
            Some(remaining.saturating_sub(now.saturating_duration_since(reading.observed_at)))
        } else {
            Some(remaining)
        }
    }

    /// Both clocks as of `now`, re-stamped.
    pub fn clock_snapshot(&self, now: Instant) -> Option<ClockReading> {
        let white = self.clock_at(Side::White, now)?;
        let black = self.clock_at(Side::Black, now)?;
        Some(ClockReading {
            clocks: Clocks {
                white_ms: white.as_millis() as u64,
                black_ms: black.as_millis() as u64,
            },
            observed_at: now,
        })
    }
}
