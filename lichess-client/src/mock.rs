//! Mock GameSource implementation for testing

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{ClientError, ClientResult};
use crate::record::GameRecord;
use crate::traits::{GameSource, GameStream, OngoingGame};

/// Scripted game source - only compiled in test mode or with mock feature.
///
/// Ongoing-game queries return queued one-shot results first, then the
/// standing list set by [`MockGameSource::with_ongoing`]. Each
/// `stream_game` call pops the next scripted stream for that game.
#[derive(Clone, Default)]
pub struct MockGameSource {
    inner: Arc<Mutex<MockState>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Default)]
struct MockState {
    ongoing: Vec<OngoingGame>,
    ongoing_queue: VecDeque<ClientResult<Vec<OngoingGame>>>,
    streams: HashMap<String, VecDeque<ScriptedStream>>,
}

enum ScriptedStream {
    Records(Vec<ClientResult<GameRecord>>),
    Channel(mpsc::UnboundedReceiver<ClientResult<GameRecord>>),
    OpenError(ClientError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    OngoingGames,
    StreamGame { game_id: String },
}

impl MockGameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standing answer for `ongoing_games`.
    pub fn with_ongoing(self, games: Vec<OngoingGame>) -> Self {
        self.set_ongoing(games);
        self
    }

    pub fn set_ongoing(&self, games: Vec<OngoingGame>) {
        self.inner.lock().unwrap().ongoing = games;
    }

    /// One-shot answer for the next `ongoing_games` call.
    pub fn push_ongoing_result(&self, result: ClientResult<Vec<OngoingGame>>) {
        self.inner.lock().unwrap().ongoing_queue.push_back(result);
    }

    /// A stream that yields `records` and then ends.
    pub fn push_stream(&self, game_id: &str, records: Vec<ClientResult<GameRecord>>) {
        self.push(game_id, ScriptedStream::Records(records));
    }

    /// A stream fed by the returned sender; it ends when the sender drops.
    pub fn push_channel_stream(&self, game_id: &str) -> mpsc::UnboundedSender<ClientResult<GameRecord>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(game_id, ScriptedStream::Channel(rx));
        tx
    }

    /// Make the next `stream_game` call for this game fail to open.
    pub fn push_stream_error(&self, game_id: &str, error: ClientError) {
        self.push(game_id, ScriptedStream::OpenError(error));
    }

    fn push(&self, game_id: &str, scripted: ScriptedStream) {
        self.inner
            .lock()
            .unwrap()
            .streams
            .entry(game_id.to_string())
            .or_default()
            .push_back(scripted);
    }

    /// Get recorded calls for verification
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn stream_opens(&self, game_id: &str) -> usize {
        self.get_calls()
            .iter()
            .filter(|c| matches!(c, MockCall::StreamGame { game_id: g } if g == game_id))
            .count()
    }

    /// Clear call history
    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear()
    }
}

#[async_trait]
impl GameSource for MockGameSource {
    async fn ongoing_games(&self) -> ClientResult<Vec<OngoingGame>> {
        self.call_log.lock().unwrap().push(MockCall::OngoingGames);

        let mut state = self.inner.lock().unwrap();
        match state.ongoing_queue.pop_front() {
            Some(result) => result,
            None => Ok(state.ongoing.clone()),
        }
    }

    async fn stream_game(&self, game_id: &str) -> ClientResult<GameStream> {
        self.call_log.lock().unwrap().push(MockCall::StreamGame {
            game_id: game_id.to_string(),
        });

        let scripted = self
            .inner
            .lock()
            .unwrap()
            .streams
            .get_mut(game_id)
            .and_then(|queue| queue.pop_front());

        match scripted {
            Some(ScriptedStream::Records(records)) => Ok(stream::iter(records).boxed()),
            Some(ScriptedStream::Channel(rx)) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            Some(ScriptedStream::OpenError(e)) => Err(e),
            None => Err(ClientError::NotConfigured(format!("stream_game({})", game_id))),
        }
    }
}
