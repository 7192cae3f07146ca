//! Lichess JSON payloads and their translation into [`GameRecord`]s.
//!
//! The game stream (`/api/stream/game/{id}`) is NDJSON: the first line is the
//! full game object, every following line is `{fen, lm, wc, bc}` after a
//! move, and a full game object is sent again once the game finishes. A full
//! game object that arrives mid-game is decoded as another snapshot.

use chess::{summarize_fen, Side};
use serde::Deserialize;

use crate::error::{ClientError, ClientResult};
use crate::record::{
    Clocks, GameRecord, GameStatus, Presence, SnapshotRecord, TerminalRecord, UpdateRecord,
};
use crate::traits::OngoingGame;

/// `GET /api/account/playing`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NowPlaying {
    #[serde(default)]
    pub now_playing: Vec<WireOngoing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireOngoing {
    pub game_id: String,
    pub color: Side,
    #[serde(default)]
    pub is_my_turn: bool,
    #[serde(default)]
    pub opponent: Option<WireOpponent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireOpponent {
    #[serde(default)]
    pub username: Option<String>,
}

impl From<WireOngoing> for OngoingGame {
    fn from(w: WireOngoing) -> Self {
        Self {
            game_id: w.game_id,
            color: w.color,
            is_my_turn: w.is_my_turn,
            opponent: w.opponent.and_then(|o| o.username),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireLine {
    Game(WireGame),
    Move(WireMove),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGame {
    id: String,
    status: WireStatus,
    #[serde(default)]
    fen: Option<String>,
    /// Side to move.
    #[serde(default)]
    player: Option<Side>,
    #[serde(default)]
    turns: Option<u32>,
    #[serde(default)]
    started_at_turn: Option<u32>,
    #[serde(default)]
    winner: Option<Side>,
    #[serde(default)]
    wc: Option<u64>,
    #[serde(default)]
    bc: Option<u64>,
    #[serde(default)]
    players: Option<WirePlayers>,
}

#[derive(Debug, Deserialize)]
struct WirePlayers {
    #[serde(default)]
    white: Option<WirePlayer>,
    #[serde(default)]
    black: Option<WirePlayer>,
}

#[derive(Debug, Deserialize)]
struct WirePlayer {
    #[serde(default)]
    connected: Option<bool>,
}

impl WirePlayers {
    fn presence(&self) -> Presence {
        let connected = |p: &Option<WirePlayer>| {
            p.as_ref().and_then(|p| p.connected).unwrap_or(true)
        };
        Presence {
            white: connected(&self.white),
            black: connected(&self.black),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMove {
    fen: String,
    #[serde(default)]
    wc: Option<u64>,
    #[serde(default)]
    bc: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireStatus {
    Named { name: GameStatus },
    Plain(GameStatus),
}

impl WireStatus {
    fn status(&self) -> GameStatus {
        match self {
            Self::Named { name } => *name,
            Self::Plain(status) => *status,
        }
    }
}

fn clocks(wc: Option<u64>, bc: Option<u64>) -> Option<Clocks> {
    match (wc, bc) {
        (Some(white), Some(black)) => Some(Clocks::from_secs(white, black)),
        _ => None,
    }
}

/// Stateful NDJSON line decoder for one game stream.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    started_at_turn: u32,
    last_ply: Option<u32>,
    seen_game: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one non-empty line. Errors are always
    /// [`ClientError::InvalidData`], so the stream stays usable.
    pub fn decode_line(&mut self, line: &str) -> ClientResult<GameRecord> {
        let parsed: WireLine = serde_json::from_str(line)
            .map_err(|e| ClientError::InvalidData(format!("{}: {}", e, line)))?;
        match parsed {
            WireLine::Game(game) => self.decode_game(game),
            WireLine::Move(mv) => self.decode_move(mv),
        }
    }

    fn decode_game(&mut self, game: WireGame) -> ClientResult<GameRecord> {
        let status = game.status.status();
        let summary = game
            .fen
            .as_deref()
            .map(summarize_fen)
            .transpose()
            .map_err(|e| ClientError::InvalidData(e.to_string()))?;

        if !self.seen_game {
            self.started_at_turn = game.started_at_turn.unwrap_or(0);
        }
        let ply = game
            .turns
            .or(summary.and_then(|s| s.ply))
            .or(self.last_ply)
            .ok_or_else(|| {
                ClientError::InvalidData(format!("game {} carries no ply count", game.id))
            })?;
        let move_count = ply.saturating_sub(self.started_at_turn);

        let first_seen = !self.seen_game;
        self.seen_game = true;
        self.last_ply = Some(ply);

        if !first_seen && status.is_finished() {
            return Ok(GameRecord::Terminal(TerminalRecord {
                move_count: Some(move_count),
                status,
                winner: game.winner,
            }));
        }

        let first_to_move = Side::White.after_plies(self.started_at_turn);
        let side_to_move = game
            .player
            .or(summary.map(|s| s.side_to_move))
            .unwrap_or_else(|| first_to_move.after_plies(move_count));

        Ok(GameRecord::Snapshot(SnapshotRecord {
            game_id: game.id,
            first_to_move,
            side_to_move,
            move_count,
            clocks: clocks(game.wc, game.bc),
            in_check: summary.is_some_and(|s| s.in_check),
            status,
            winner: game.winner,
            presence: game
                .players
                .as_ref()
                .map(WirePlayers::presence)
                .unwrap_or_default(),
        }))
    }

    fn decode_move(&mut self, mv: WireMove) -> ClientResult<GameRecord> {
        let summary =
            summarize_fen(&mv.fen).map_err(|e| ClientError::InvalidData(e.to_string()))?;
        let ply = summary
            .ply
            .or(self.last_ply.map(|p| p + 1))
            .ok_or_else(|| ClientError::InvalidData(format!("move line without ply: {}", mv.fen)))?;
        self.last_ply = Some(ply);

        Ok(GameRecord::Update(UpdateRecord {
            side_to_move: summary.side_to_move,
            move_count: ply.saturating_sub(self.started_at_turn),
            clocks: clocks(mv.wc, mv.bc),
            in_check: summary.in_check,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAME_START: &str = r#"{"id":"LuGQwhBb","variant":{"key":"standard"},"speed":"blitz","rated":true,"initialFen":"startpos","fen":"rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1","player":"white","turns":0,"startedAtTurn":0,"status":{"id":20,"name":"started"},"wc":180,"bc":180}"#;

    #[test]
    fn test_first_game_line_is_snapshot() {
        let mut decoder = StreamDecoder::new();
        let record = decoder.decode_line(GAME_START).unwrap();
        match record {
            GameRecord::Snapshot(s) => {
                assert_eq!(s.game_id, "LuGQwhBb");
                assert_eq!(s.first_to_move, Side::White);
                assert_eq!(s.side_to_move, Side::White);
                assert_eq!(s.move_count, 0);
                assert_eq!(s.clocks, Some(Clocks::from_secs(180, 180)));
                assert_eq!(s.status, GameStatus::Started);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_move_line_is_update_with_check() {
        let mut decoder = StreamDecoder::new();
        decoder.decode_line(GAME_START).unwrap();
        let line = r#"{"fen":"rnbqkbnr/ppppp1pp/8/5p1Q/4P3/8/PPPP1PPP/RNB1KBNR b KQkq - 1 2","lm":"d1h5","wc":170,"bc":175}"#;
        match decoder.decode_line(line).unwrap() {
            GameRecord::Update(u) => {
                assert_eq!(u.side_to_move, Side::Black);
                assert_eq!(u.move_count, 3);
                assert!(u.in_check);
                assert_eq!(u.clocks, Some(Clocks::from_secs(170, 175)));
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_short_fen_counts_from_previous_ply() {
        let mut decoder = StreamDecoder::new();
        decoder.decode_line(GAME_START).unwrap();
        let line = r#"{"fen":"rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b","lm":"e2e4"}"#;
        match decoder.decode_line(line).unwrap() {
            GameRecord::Update(u) => {
                assert_eq!(u.move_count, 1);
                assert_eq!(u.clocks, None);
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_finished_game_line_is_terminal() {
        let mut decoder = StreamDecoder::new();
        decoder.decode_line(GAME_START).unwrap();
        let line = r#"{"id":"LuGQwhBb","turns":31,"status":{"id":31,"name":"resign"},"winner":"black"}"#;
        match decoder.decode_line(line).unwrap() {
            GameRecord::Terminal(t) => {
                assert_eq!(t.status, GameStatus::Resign);
                assert_eq!(t.winner, Some(Side::Black));
                assert_eq!(t.move_count, Some(31));
            }
            other => panic!("expected terminal, got {:?}", other),
        }
    }

    #[test]
    fn test_disconnected_player_in_game_line() {
        let mut decoder = StreamDecoder::new();
        decoder.decode_line(GAME_START).unwrap();
        let line = r#"{"id":"LuGQwhBb","fen":"rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1","player":"black","turns":1,"status":{"id":20,"name":"started"},"players":{"white":{"user":{"name":"alice"},"connected":true},"black":{"user":{"name":"bob"},"connected":false}}}"#;
        match decoder.decode_line(line).unwrap() {
            GameRecord::Snapshot(s) => {
                assert!(s.presence.connected(Side::White));
                assert!(!s.presence.connected(Side::Black));
                assert_eq!(s.move_count, 1);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_game_line_without_players_is_all_connected() {
        let mut decoder = StreamDecoder::new();
        match decoder.decode_line(GAME_START).unwrap() {
            GameRecord::Snapshot(s) => assert_eq!(s.presence, Presence::default()),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_abandoned_game_line_is_terminal() {
        let mut decoder = StreamDecoder::new();
        decoder.decode_line(GAME_START).unwrap();
        let line = r#"{"id":"LuGQwhBb","turns":12,"status":"abandoned"}"#;
        match decoder.decode_line(line).unwrap() {
            GameRecord::Terminal(t) => assert_eq!(t.status, GameStatus::Abandoned),
            other => panic!("expected terminal, got {:?}", other),
        }
    }

    #[test]
    fn test_from_position_game_counts_from_start_turn() {
        let mut decoder = StreamDecoder::new();
        let line = r#"{"id":"abc","fen":"4k3/8/8/8/8/8/8/4K2R b K - 0 10","player":"black","turns":19,"startedAtTurn":19,"status":"started"}"#;
        match decoder.decode_line(line).unwrap() {
            GameRecord::Snapshot(s) => {
                assert_eq!(s.first_to_move, Side::Black);
                assert_eq!(s.move_count, 0);
                assert_eq!(s.side_to_move, Side::Black);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_is_record_error() {
        let mut decoder = StreamDecoder::new();
        let err = decoder.decode_line("{not json").unwrap_err();
        assert!(err.is_record_error());
        let err = decoder.decode_line(r#"{"fen":"xx","lm":"e2e4"}"#).unwrap_err();
        assert!(err.is_record_error());
    }
}
