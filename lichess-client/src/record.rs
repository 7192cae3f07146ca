//! Normalized game records.
//!
//! Raw payloads from the server vary in shape. Each shape gets its own
//! variant carrying only the fields it guarantees.

use std::time::Duration;

use chess::Side;
use serde::{Deserialize, Serialize};

/// One decoded event from a game stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameRecord {
    /// Full state of the game. Always the first record of a stream.
    Snapshot(SnapshotRecord),
    /// A move was played and/or the clocks were updated.
    Update(UpdateRecord),
    /// The game is over.
    Terminal(TerminalRecord),
}

impl GameRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::Update(_) => "update",
            Self::Terminal(_) => "terminal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub game_id: String,
    /// Side that moved at `move_count == 0`.
    pub first_to_move: Side,
    pub side_to_move: Side,
    /// Plies played since the game started.
    pub move_count: u32,
    #[serde(default)]
    pub clocks: Option<Clocks>,
    #[serde(default)]
    pub in_check: bool,
    pub status: GameStatus,
    #[serde(default)]
    pub winner: Option<Side>,
    #[serde(default)]
    pub presence: Presence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub side_to_move: Side,
    pub move_count: u32,
    #[serde(default)]
    pub clocks: Option<Clocks>,
    #[serde(default)]
    pub in_check: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalRecord {
    #[serde(default)]
    pub move_count: Option<u32>,
    pub status: GameStatus,
    #[serde(default)]
    pub winner: Option<Side>,
}

/// Whether each player is connected to the game. Missing means connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub white: bool,
    pub black: bool,
}

impl Default for Presence {
    fn default() -> Self {
        Self {
            white: true,
            black: true,
        }
    }
}

impl Presence {
    pub fn connected(&self, side: Side) -> bool {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }
}

/// Remaining clock time per side, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clocks {
    pub white_ms: u64,
    pub black_ms: u64,
}

impl Clocks {
    pub fn from_secs(white: u64, black: u64) -> Self {
        Self {
            white_ms: white.saturating_mul(1000),
            black_ms: black.saturating_mul(1000),
        }
    }

    pub fn remaining(&self, side: Side) -> Duration {
        match side {
            Side::White => Duration::from_millis(self.white_ms),
            Side::Black => Duration::from_millis(self.black_ms),
        }
    }
}

/// Lichess game status names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    #[serde(rename = "created")]
    Created,
    #[serde(rename = "started")]
    Started,
    #[serde(rename = "aborted")]
    Aborted,
    #[serde(rename = "mate")]
    Mate,
    #[serde(rename = "resign")]
    Resign,
    #[serde(rename = "stalemate")]
    Stalemate,
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "draw")]
    Draw,
    #[serde(rename = "outoftime")]
    OutOfTime,
    #[serde(rename = "cheat")]
    Cheat,
    #[serde(rename = "noStart")]
    NoStart,
    #[serde(rename = "insufficientMaterialClaim")]
    InsufficientMaterialClaim,
    #[serde(rename = "variantEnd")]
    VariantEnd,
    /// Reported by some clients when a player left the game for good.
    #[serde(rename = "abandoned")]
    Abandoned,
    #[serde(rename = "unknownFinish", other)]
    UnknownFinish,
}

impl GameStatus {
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::Created | Self::Started)
    }

    /// Finished without a winner being a normal outcome.
    pub fn is_drawish(self) -> bool {
        matches!(
            self,
            Self::Draw
                | Self::Stalemate
                | Self::InsufficientMaterialClaim
                | Self::Timeout
                | Self::OutOfTime
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Aborted => "aborted",
            Self::Mate => "mate",
            Self::Resign => "resign",
            Self::Stalemate => "stalemate",
            Self::Timeout => "timeout",
            Self::Draw => "draw",
            Self::OutOfTime => "outoftime",
            Self::Cheat => "cheat",
            Self::NoStart => "noStart",
            Self::InsufficientMaterialClaim => "insufficientMaterialClaim",
            Self::VariantEnd => "variantEnd",
            Self::Abandoned => "abandoned",
            Self::UnknownFinish => "unknownFinish",
        }
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
