//! Lichess game source.
//!
//! Exposes the two things the lamp daemon needs from the game server: the
//! list of games the authenticated user is currently playing, and a stream
//! of normalized [`GameRecord`]s for one of those games.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use lichess_client::{GameSource, LichessClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LichessClient::new("lip_token")?;
//!     if let Some(game) = client.ongoing_games().await?.into_iter().next() {
//!         let mut records = client.stream_game(&game.game_id).await?;
//!         while let Some(record) = records.next().await {
//!             println!("{:?}", record?);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod record;
mod traits;
pub mod wire;

pub use client::LichessClient;
pub use error::{ClientError, ClientResult};
pub use record::{
    Clocks, GameRecord, GameStatus, Presence, SnapshotRecord, TerminalRecord, UpdateRecord,
};
pub use traits::{GameSource, GameStream, OngoingGame};
