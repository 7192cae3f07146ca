//! Lichess HTTP client

use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;

use crate::error::{ClientError, ClientResult};
use crate::traits::{GameSource, GameStream, OngoingGame};
use crate::wire::{NowPlaying, StreamDecoder};

pub const DEFAULT_BASE_URL: &str = "https://lichess.org";
const USER_AGENT: &str = concat!("chesslamp/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Network client for the Lichess API, authenticated with a personal token.
#[derive(Clone)]
pub struct LichessClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for LichessClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LichessClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl LichessClient {
    pub fn new(token: impl Into<String>) -> ClientResult<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    /// Point the client at another server, e.g. a local Lichess instance.
    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> ClientResult<Self> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidAddress(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn get(&self, path: &str, accept: &str) -> ClientResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl GameSource for LichessClient {
    async fn ongoing_games(&self) -> ClientResult<Vec<OngoingGame>> {
        let response = self.get("/api/account/playing", "application/json").await?;
        let body: NowPlaying = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidData(e.to_string()))?;
        tracing::debug!(count = body.now_playing.len(), "Fetched ongoing games");
        Ok(body.now_playing.into_iter().map(OngoingGame::from).collect())
    }

    async fn stream_game(&self, game_id: &str) -> ClientResult<GameStream> {
        let path = format!("/api/stream/game/{}", game_id);
        let response = self.get(&path, "application/x-ndjson").await?;
        tracing::debug!(game_id, "Opened game stream");
        Ok(ndjson_records(response.bytes_stream().boxed()))
    }
}

struct LineReader<S> {
    body: S,
    buf: Vec<u8>,
    decoder: StreamDecoder,
    done: bool,
}

impl<S> LineReader<S> {
    fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buf.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn take_rest(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Split a chunked NDJSON body into decoded records. Blank keep-alive lines
/// are skipped; a transport error is yielded once and ends the stream.
fn ndjson_records<S, B, E>(body: S) -> GameStream
where
    S: futures::Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    let reader = LineReader {
        body,
        buf: Vec::new(),
        decoder: StreamDecoder::new(),
        done: false,
    };

    stream::unfold(reader, |mut reader| async move {
        loop {
            let line = match reader.next_line() {
                Some(line) => Some(line),
                None if reader.done => match reader.take_rest() {
                    Some(rest) => Some(rest),
                    None => return None,
                },
                None => None,
            };

            if let Some(line) = line {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let record = reader.decoder.decode_line(line);
                if let Err(e) = &record {
                    tracing::debug!(error = %e, "Malformed stream line");
                }
                return Some((record, reader));
            }

            match reader.body.next().await {
                Some(Ok(chunk)) => reader.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    reader.done = true;
                    reader.buf.clear();
                    return Some((Err(e.into()), reader));
                }
                None => reader.done = true,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::GameRecord;

    const GAME: &str = r#"{"id":"g1","fen":"rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1","player":"white","turns":0,"startedAtTurn":0,"status":{"id":20,"name":"started"}}"#;
    const MOVE: &str =
        r#"{"fen":"rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1","lm":"e2e4"}"#;

    fn chunks(parts: Vec<&str>) -> impl futures::Stream<Item = Result<Vec<u8>, ClientError>> {
        stream::iter(
            parts
                .into_iter()
                .map(|p| Ok(p.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let body = format!("{}\n\n{}\n", GAME, MOVE);
        let (a, b) = body.split_at(37);
        let records: Vec<_> = ndjson_records(chunks(vec![a, b])).collect().await;

        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Ok(GameRecord::Snapshot(_))));
        assert!(matches!(records[1], Ok(GameRecord::Update(_))));
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline() {
        let body = format!("{}\n{}", GAME, MOVE);
        let records: Vec<_> = ndjson_records(chunks(vec![body.as_str()])).collect().await;
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_bad_line_does_not_end_stream() {
        let body = format!("{}\nnonsense\n{}\n", GAME, MOVE);
        let records: Vec<_> = ndjson_records(chunks(vec![body.as_str()])).collect().await;
        assert_eq!(records.len(), 3);
        assert!(records[1].as_ref().is_err_and(|e| e.is_record_error()));
        assert!(records[2].is_ok());
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let parts: Vec<Result<Vec<u8>, ClientError>> = vec![
            Ok(format!("{}\n", GAME).into_bytes()),
            Err(ClientError::InvalidAddress("reset".into())),
            Ok(format!("{}\n", MOVE).into_bytes()),
        ];
        let records: Vec<_> = ndjson_records(stream::iter(parts)).collect().await;
        assert_eq!(records.len(), 2);
        assert!(records[1].as_ref().is_err_and(|e| !e.is_record_error()));
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let err = LichessClient::with_base_url("lichess.org", "t").unwrap_err();
        assert!(matches!(err, ClientError::InvalidAddress(_)));
    }
}
