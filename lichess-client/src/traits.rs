use async_trait::async_trait;
use chess::Side;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::ClientResult;
use crate::record::GameRecord;

/// Stream of decoded records for one game. Ends when the server closes the
/// connection; a transport failure is yielded once as the final item.
pub type GameStream = BoxStream<'static, ClientResult<GameRecord>>;

/// A game the account is currently playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OngoingGame {
    pub game_id: String,
    /// Side the account plays.
    pub color: Side,
    pub is_my_turn: bool,
    pub opponent: Option<String>,
}

/// Where game data comes from.
#[async_trait]
pub trait GameSource: Send + Sync {
    /// Games in progress for the authenticated account.
    async fn ongoing_games(&self) -> ClientResult<Vec<OngoingGame>>;

    /// Open the live event stream for a game.
    async fn stream_game(&self, game_id: &str) -> ClientResult<GameStream>;
}
