use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lamp::LampDriver;
use lichess_client::{GameRecord, GameSource, GameStream, OngoingGame};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::Instrument;

use super::cache::{LampStateCache, CAPTURE_TIMEOUT};
use super::commands::{MonitorCommand, MonitorError};
use super::handle::MonitorHandle;
use super::interpreter::{interpret, Interpretation};
use super::snapshot::status_report;
use super::state::TurnState;
use crate::config::resolve::resolve as resolve_config;
use crate::config::theme::{find_theme, theme_names};
use crate::config::{FileConfig, ResolvedConfig, RuntimeOverrides};
use crate::effects::resolver::needs_clock_tick;
use crate::effects::{farewell, resolve, SchedulerHandle};

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);
/// How often time thresholds are re-checked on the viewer's turn.
pub const CLOCK_TICK: Duration = Duration::from_secs(1);

const COMMAND_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct MonitorTimings {
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub capture_timeout: Duration,
    pub clock_tick: Duration,
}

impl Default for MonitorTimings {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            reconnect_delay: RECONNECT_DELAY,
            capture_timeout: CAPTURE_TIMEOUT,
            clock_tick: CLOCK_TICK,
        }
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    Ended,
    Disconnected,
    Disabled,
    Shutdown,
}

enum Control {
    Continue { reconfigured: bool },
    Disable(oneshot::Sender<()>),
    Shutdown,
}

struct Session {
    game: OngoingGame,
    turn: Option<TurnState>,
    cache: LampStateCache,
}

/// Finds the account's live game, follows its stream and keeps the lamp in
/// step with it. Owns the turn state, the resolved config and the lamp
/// capture; everything else talks to it through a [`MonitorHandle`].
pub struct SessionMonitor {
    source: Arc<dyn GameSource>,
    lamp: Arc<dyn LampDriver>,
    scheduler: SchedulerHandle,
    config_rx: watch::Receiver<Arc<FileConfig>>,
    config_open: bool,
    file: Arc<FileConfig>,
    overrides: RuntimeOverrides,
    cfg: ResolvedConfig,
    enabled: bool,
    /// A finished game can stay listed as ongoing for a moment.
    last_finished: Option<String>,
    cmd_rx: mpsc::Receiver<MonitorCommand>,
    timings: MonitorTimings,
}

impl SessionMonitor {
    pub fn new(
        source: Arc<dyn GameSource>,
        lamp: Arc<dyn LampDriver>,
        scheduler: SchedulerHandle,
        mut config_rx: watch::Receiver<Arc<FileConfig>>,
    ) -> (Self, MonitorHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let file = config_rx.borrow_and_update().clone();
        let overrides = RuntimeOverrides::default();
        let cfg = resolve_config(&file, &overrides);
        let monitor = Self {
            source,
            lamp,
            scheduler,
            config_rx,
            config_open: true,
            file,
            overrides,
            cfg,
            enabled: true,
            last_finished: None,
            cmd_rx,
            timings: MonitorTimings::default(),
        };
        (monitor, MonitorHandle::new(cmd_tx))
    }

    pub async fn run(self) {
        self.run_inner()
            .instrument(tracing::info_span!("monitor"))
            .await;
    }

    async fn run_inner(mut self) {
        tracing::info!(theme = ?self.cfg.theme, "Session monitor started");

        let mut poll = time::interval(self.timings.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    match self.handle_command(cmd, None) {
                        Control::Continue { .. } => {}
                        Control::Disable(reply) => {
                            self.set_enabled(false);
                            let _ = reply.send(());
                        }
                        Control::Shutdown => break,
                    }
                }
                changed = self.config_rx.changed(), if self.config_open => {
                    self.on_config_changed(changed.is_ok());
                }
                _ = poll.tick(), if self.enabled => {
                    if let Some(game) = self.detect().await {
                        let span = tracing::info_span!("session", game = %game.game_id);
                        match self.run_session(game).instrument(span).await {
                            SessionExit::Shutdown => break,
                            SessionExit::Disconnected => {
                                poll.reset_at(Instant::now() + self.timings.reconnect_delay);
                            }
                            SessionExit::Ended | SessionExit::Disabled => poll.reset(),
                        }
                    }
                }
            }
        }

        tracing::info!("Session monitor stopped");
    }

    async fn detect(&mut self) -> Option<OngoingGame> {
        let games = match self.source.ongoing_games().await {
            Ok(games) => games,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to poll ongoing games");
                return None;
            }
        };
        if let Some(finished) = &self.last_finished {
            if !games.iter().any(|g| &g.game_id == finished) {
                self.last_finished = None;
            }
        }
        games
            .into_iter()
            .find(|g| self.last_finished.as_deref() != Some(g.game_id.as_str()))
    }

    async fn run_session(&mut self, game: OngoingGame) -> SessionExit {
        tracing::info!(
            color = %game.color,
            opponent = game.opponent.as_deref().unwrap_or("?"),
            "Game detected"
        );
        let mut session = Session {
            game,
            turn: None,
            cache: LampStateCache::new(),
        };
        let captured = session
            .cache
            .capture(self.lamp.as_ref(), self.timings.capture_timeout)
            .await;
        if matches!(captured, Some(status) if !status.on) {
            tracing::info!("Lamp is off, switching it on for the game");
            if let Err(e) = self.scheduler.power_on().await {
                tracing::error!(error = %e, "Could not switch lamp on");
            }
        }

        let mut stream = match self.source.stream_game(&session.game.game_id).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open game stream");
                return self
                    .end_session(&mut session, SessionExit::Disconnected)
                    .await;
            }
        };

        let (exit, reply) = self.follow(&mut session, &mut stream).await;
        let exit = self.end_session(&mut session, exit).await;
        if let Some(reply) = reply {
            let _ = reply.send(());
        }
        exit
    }

    async fn follow(
        &mut self,
        session: &mut Session,
        stream: &mut GameStream,
    ) -> (SessionExit, Option<oneshot::Sender<()>>) {
        let mut tick = time::interval(self.timings.clock_tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        return (SessionExit::Shutdown, None);
                    };
                    match self.handle_command(cmd, session.turn.as_ref()) {
                        Control::Continue { reconfigured } => {
                            if reconfigured {
                                self.replay(session).await;
                                tick.reset();
                            }
                        }
                        Control::Disable(reply) => {
                            self.set_enabled(false);
                            return (SessionExit::Disabled, Some(reply));
                        }
                        Control::Shutdown => return (SessionExit::Shutdown, None),
                    }
                }
                changed = self.config_rx.changed(), if self.config_open => {
                    if self.on_config_changed(changed.is_ok()) {
                        self.replay(session).await;
                        tick.reset();
                    }
                }
                record = stream.next() => match record {
                    None => {
                        tracing::info!("Game stream closed before the game ended");
                        return (SessionExit::Disconnected, None);
                    }
                    Some(Err(e)) if e.is_record_error() => {
                        tracing::warn!(error = %e, "Skipping malformed record");
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Game stream failed");
                        return (SessionExit::Disconnected, None);
                    }
                    Some(Ok(record)) => {
                        if self.on_record(session, &record).await {
                            return (SessionExit::Ended, None);
                        }
                        tick.reset();
                    }
                },
                _ = tick.tick() => {
                    if let Some(turn) = &session.turn {
                        if needs_clock_tick(turn, &self.cfg) {
                            self.show(turn, false).await;
                        }
                    }
                }
            }
        }
    }

    /// Returns true once the game has ended.
    async fn on_record(&mut self, session: &mut Session, record: &GameRecord) -> bool {
        let now = Instant::now();
        match interpret(session.turn.as_ref(), record, session.game.color, now) {
            Ok(Interpretation { state, move_event }) => {
                tracing::debug!(
                    kind = record.kind(),
                    move_count = state.move_count,
                    side = %state.active_side,
                    check = state.in_check,
                    move_event,
                    "Record accepted"
                );
                let ended = state.is_ended();
                if !ended {
                    self.show(&state, move_event).await;
                }
                session.turn = Some(state);
                ended
            }
            Err(e) => {
                tracing::warn!(kind = record.kind(), error = %e, "Dropping record");
                false
            }
        }
    }

    async fn show(&self, turn: &TurnState, move_event: bool) {
        let resolution = resolve(turn, &self.cfg, move_event, Instant::now());
        if let Err(e) = self
            .scheduler
            .play(resolution, self.cfg.gradual_dim)
            .await
        {
            tracing::error!(error = %e, "Could not hand effect to scheduler");
        }
    }

    /// Re-resolve the current turn after a config change. Never a move event.
    async fn replay(&self, session: &Session) {
        if let Some(turn) = session.turn.as_ref().filter(|t| !t.is_ended()) {
            self.show(turn, false).await;
        }
    }

    /// Exactly one restoration per session, whatever the exit.
    async fn end_session(&mut self, session: &mut Session, exit: SessionExit) -> SessionExit {
        let effects = session
            .turn
            .as_ref()
            .map(|t| farewell(t, &self.cfg))
            .unwrap_or_default();
        let restore = session.cache.take_restore_state(self.cfg.restore);

        if let Err(e) = self.scheduler.finish(effects, restore).await {
            tracing::error!(error = %e, "Could not restore lamp");
        }
        if exit == SessionExit::Ended {
            self.last_finished = Some(session.game.game_id.clone());
        }
        let result = session
            .turn
            .as_ref()
            .and_then(|t| t.result)
            .map(|r| r.as_str());
        tracing::info!(?exit, result, "Session ended");
        exit
    }

    fn handle_command(&mut self, cmd: MonitorCommand, turn: Option<&TurnState>) -> Control {
        match cmd {
            MonitorCommand::GetStatus { reply } => {
                let report = status_report(
                    self.enabled,
                    &self.cfg,
                    turn,
                    self.scheduler.current(),
                    Instant::now(),
                );
                let _ = reply.send(report);
                Control::Continue {
                    reconfigured: false,
                }
            }
            MonitorCommand::Enable { reply } => {
                self.set_enabled(true);
                let _ = reply.send(());
                Control::Continue {
                    reconfigured: false,
                }
            }
            MonitorCommand::Disable { reply } => Control::Disable(reply),
            MonitorCommand::SetTheme { name, reply } => {
                let result = match find_theme(&name) {
                    Some(theme) => {
                        self.overrides.theme = Some(theme.name.to_string());
                        tracing::info!(theme = theme.name, "Theme set");
                        Ok(())
                    }
                    None => Err(MonitorError::UnknownTheme {
                        name,
                        available: theme_names().collect::<Vec<_>>().join(", "),
                    }),
                };
                let reconfigured = result.is_ok() && self.reresolve();
                let _ = reply.send(result);
                Control::Continue { reconfigured }
            }
            MonitorCommand::SetGradualDim {
                enabled,
                duration_ms,
                reply,
            } => {
                self.overrides.gradual_dim_enabled = Some(enabled);
                if duration_ms.is_some() {
                    self.overrides.gradual_dim_duration_ms = duration_ms;
                }
                tracing::info!(enabled, duration_ms, "Gradual dim set");
                let reconfigured = self.reresolve();
                let _ = reply.send(());
                Control::Continue { reconfigured }
            }
            MonitorCommand::Shutdown => Control::Shutdown,
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            tracing::info!(enabled, "Monitoring toggled");
        }
        self.enabled = enabled;
    }

    /// Returns true if the resolved config changed.
    fn reresolve(&mut self) -> bool {
        let cfg = resolve_config(&self.file, &self.overrides);
        let changed = cfg != self.cfg;
        self.cfg = cfg;
        changed
    }

    fn on_config_changed(&mut self, open: bool) -> bool {
        if !open {
            tracing::warn!("Config watcher gone, keeping current config");
            self.config_open = false;
            return false;
        }
        self.file = self.config_rx.borrow_and_update().clone();
        let changed = self.reresolve();
        if changed {
            tracing::info!(theme = ?self.cfg.theme, "Config applied");
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::spawn_scheduler;
    use chess::Side;
    use lamp::mock::MockLamp;
    use lamp::{LampCommand, LampState, Rgb};
    use lichess_client::mock::MockGameSource;
    use lichess_client::{
        ClientError, ClientResult, Clocks, GameStatus, Presence, SnapshotRecord, TerminalRecord,
        UpdateRecord,
    };
    use tokio::task::JoinHandle;

    const SAVED: LampState = LampState {
        color: Rgb::new(10, 20, 30),
        brightness: 55,
    };
    const GREEN: Rgb = Rgb::new(0, 255, 0);
    const RED: Rgb = Rgb::new(255, 0, 0);

    fn game() -> OngoingGame {
        OngoingGame {
            game_id: "g1".into(),
            color: Side::White,
            is_my_turn: true,
            opponent: Some("bob".into()),
        }
    }

    fn snapshot(move_count: u32, side: Side, clocks: Option<Clocks>) -> ClientResult<GameRecord> {
        Ok(GameRecord::Snapshot(SnapshotRecord {
            game_id: "g1".into(),
            first_to_move: Side::White,
            side_to_move: side,
            move_count,
            clocks,
            in_check: false,
            status: GameStatus::Started,
            winner: None,
            presence: Presence::default(),
        }))
    }

    fn black_left(move_count: u32) -> ClientResult<GameRecord> {
        Ok(GameRecord::Snapshot(SnapshotRecord {
            game_id: "g1".into(),
            first_to_move: Side::White,
            side_to_move: Side::Black,
            move_count,
            clocks: None,
            in_check: false,
            status: GameStatus::Started,
            winner: None,
            presence: Presence {
                white: true,
                black: false,
            },
        }))
    }

    fn update(move_count: u32, side: Side, in_check: bool) -> ClientResult<GameRecord> {
        Ok(GameRecord::Update(UpdateRecord {
            side_to_move: side,
            move_count,
            clocks: None,
            in_check,
        }))
    }

    fn win(move_count: u32) -> ClientResult<GameRecord> {
        Ok(GameRecord::Terminal(TerminalRecord {
            move_count: Some(move_count),
            status: GameStatus::Mate,
            winner: Some(Side::White),
        }))
    }

    fn apply(state: LampState) -> Vec<LampCommand> {
        vec![
            LampCommand::SetBrightness(state.brightness),
            LampCommand::SetColor(state.color),
        ]
    }

    fn count_color(lamp: &MockLamp, color: Rgb) -> usize {
        lamp.commands()
            .iter()
            .filter(|c| **c == LampCommand::SetColor(color))
            .count()
    }

    struct Harness {
        handle: MonitorHandle,
        config_tx: watch::Sender<Arc<FileConfig>>,
        task: JoinHandle<()>,
    }

    fn start(source: &MockGameSource, lamp: &MockLamp, file: FileConfig) -> Harness {
        let (scheduler, _scheduler_task) = spawn_scheduler(Arc::new(lamp.clone()));
        let (config_tx, config_rx) = watch::channel(Arc::new(file));
        let (monitor, handle) = SessionMonitor::new(
            Arc::new(source.clone()),
            Arc::new(lamp.clone()),
            scheduler,
            config_rx,
        );
        let task = tokio::spawn(monitor.run());
        Harness {
            handle,
            config_tx,
            task,
        }
    }

    async fn sleep_ms(ms: u64) {
        time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_record_shows_turn_color_without_flash() {
        let source = MockGameSource::new().with_ongoing(vec![game()]);
        let lamp = MockLamp::new().with_state(SAVED);
        let tx = source.push_channel_stream("g1");
        let _h = start(&source, &lamp, FileConfig::default());

        tx.send(snapshot(0, Side::White, None)).unwrap();
        sleep_ms(500).await;

        assert_eq!(lamp.queries(), 1);
        assert_eq!(lamp.commands(), apply(LampState::new(GREEN, 40)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_won_game_celebrates_and_restores_once() {
        let source = MockGameSource::new().with_ongoing(vec![game()]);
        let lamp = MockLamp::new().with_state(SAVED);
        let tx = source.push_channel_stream("g1");
        let _h = start(&source, &lamp, FileConfig::default());

        tx.send(snapshot(0, Side::White, None)).unwrap();
        sleep_ms(100).await;
        tx.send(update(1, Side::Black, false)).unwrap();
        sleep_ms(1000).await;
        // flash, then back to the opponent's color
        assert_eq!(count_color(&lamp, Rgb::WHITE), 1);
        assert_eq!(lamp.current(), (Some(RED), Some(40)));

        tx.send(win(1)).unwrap();
        sleep_ms(5000).await;

        let commands = lamp.commands();
        assert!(commands.contains(&LampCommand::SetColor(Rgb::new(255, 215, 0))));
        assert_eq!(commands[commands.len() - 2..], apply(SAVED)[..]);
        assert_eq!(count_color(&lamp, SAVED.color), 1);

        // still listed as ongoing, but not followed again
        sleep_ms(10_000).await;
        assert_eq!(source.stream_opens("g1"), 1);
        assert_eq!(count_color(&lamp, SAVED.color), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_record_keeps_state() {
        let source = MockGameSource::new().with_ongoing(vec![game()]);
        let lamp = MockLamp::new();
        let tx = source.push_channel_stream("g1");
        let h = start(&source, &lamp, FileConfig::default());

        tx.send(snapshot(4, Side::White, None)).unwrap();
        tx.send(update(5, Side::White, false)).unwrap();
        sleep_ms(500).await;

        let status = h.handle.status().await.unwrap();
        let session = status.session.unwrap();
        assert_eq!(session.move_count, 4);
        assert_eq!(session.side_to_move, "white");
        assert_eq!(count_color(&lamp, Rgb::WHITE), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_tick_escalates_time_pressure() {
        let source = MockGameSource::new().with_ongoing(vec![game()]);
        let lamp = MockLamp::new();
        let tx = source.push_channel_stream("g1");
        let _h = start(&source, &lamp, FileConfig::default());

        tx.send(snapshot(10, Side::White, Some(Clocks::from_secs(12, 60))))
            .unwrap();
        sleep_ms(500).await;
        assert!(lamp.commands().contains(&LampCommand::SetColor(Rgb::new(255, 140, 0))));
        assert_eq!(count_color(&lamp, RED), 0);

        sleep_ms(3000).await;
        assert_eq!(count_color(&lamp, RED), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_recolors_without_event() {
        let source = MockGameSource::new().with_ongoing(vec![game()]);
        let lamp = MockLamp::new();
        let tx = source.push_channel_stream("g1");
        let classic = FileConfig {
            theme: Some("classic".into()),
            ..FileConfig::default()
        };
        let h = start(&source, &lamp, classic);

        tx.send(snapshot(2, Side::White, None)).unwrap();
        sleep_ms(500).await;
        let classic_theme = find_theme("classic").unwrap();
        assert_eq!(lamp.current(), (Some(classic_theme.my_turn_color), Some(classic_theme.my_turn_brightness)));

        h.config_tx.send_replace(Arc::new(FileConfig {
            theme: Some("royal".into()),
            ..FileConfig::default()
        }));
        sleep_ms(500).await;

        let royal = find_theme("royal").unwrap();
        assert_eq!(lamp.current(), (Some(royal.my_turn_color), Some(royal.my_turn_brightness)));
        assert_eq!(count_color(&lamp, Rgb::WHITE), 0);
        assert_eq!(h.handle.status().await.unwrap().theme.as_deref(), Some("royal"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_theme_from_control() {
        let source = MockGameSource::new();
        let lamp = MockLamp::new();
        let h = start(&source, &lamp, FileConfig::default());

        assert!(matches!(
            h.handle.set_theme("neon".into()).await,
            Err(MonitorError::UnknownTheme { .. })
        ));
        h.handle.set_theme("Ocean".into()).await.unwrap();
        h.handle.set_gradual_dim(true, Some(800)).await.unwrap();

        let status = h.handle.status().await.unwrap();
        assert_eq!(status.theme.as_deref(), Some("ocean"));
        assert!(status.gradual_dim_enabled);
        assert_eq!(status.gradual_dim_duration_ms, 800);

        // overrides survive a reload
        h.config_tx.send_replace(Arc::new(FileConfig::default()));
        sleep_ms(100).await;
        assert_eq!(h.handle.status().await.unwrap().theme.as_deref(), Some("ocean"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_restores_and_suspends_polling() {
        let source = MockGameSource::new().with_ongoing(vec![game()]);
        let lamp = MockLamp::new().with_state(SAVED);
        let tx = source.push_channel_stream("g1");
        let h = start(&source, &lamp, FileConfig::default());

        tx.send(snapshot(2, Side::White, None)).unwrap();
        sleep_ms(500).await;
        h.handle.disable().await.unwrap();

        let commands = lamp.commands();
        assert_eq!(commands[commands.len() - 2..], apply(SAVED)[..]);
        let status = h.handle.status().await.unwrap();
        assert!(!status.enabled);
        assert!(status.session.is_none());

        sleep_ms(10_000).await;
        assert_eq!(source.stream_opens("g1"), 1);
        assert_eq!(count_color(&lamp, SAVED.color), 1);

        h.handle.enable().await.unwrap();
        sleep_ms(500).await;
        assert_eq!(source.stream_opens("g1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_stream_restores_and_reconnects() {
        let source = MockGameSource::new().with_ongoing(vec![game()]);
        let lamp = MockLamp::new().with_state(SAVED);
        source.push_stream("g1", vec![snapshot(2, Side::White, None)]);
        let _tx = source.push_channel_stream("g1");
        let _h = start(&source, &lamp, FileConfig::default());

        sleep_ms(1000).await;
        assert_eq!(source.stream_opens("g1"), 1);
        assert_eq!(count_color(&lamp, SAVED.color), 1);

        sleep_ms(2000).await;
        assert_eq!(source.stream_opens("g1"), 2);
        // fresh capture for the new session
        assert_eq!(lamp.queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_ends_session() {
        let source = MockGameSource::new().with_ongoing(vec![game()]);
        let lamp = MockLamp::new();
        source.push_stream(
            "g1",
            vec![
                snapshot(2, Side::White, None),
                Err(ClientError::InvalidData("garbage".into())),
                update(3, Side::Black, false),
                Err(ClientError::Api {
                    status: 502,
                    message: "bad gateway".into(),
                }),
                update(4, Side::White, false),
            ],
        );
        let h = start(&source, &lamp, FileConfig::default());

        sleep_ms(1000).await;
        // malformed line skipped, the move after it applied, the rest dropped
        assert_eq!(count_color(&lamp, Rgb::WHITE), 1);
        let commands = lamp.commands();
        let restore = ResolvedConfig::default().restore;
        assert_eq!(commands[commands.len() - 2..], apply(restore)[..]);
        assert!(h.handle.status().await.unwrap().session.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_restores_running_session() {
        let source = MockGameSource::new().with_ongoing(vec![game()]);
        let lamp = MockLamp::new().with_state(SAVED);
        let tx = source.push_channel_stream("g1");
        let h = start(&source, &lamp, FileConfig::default());

        tx.send(snapshot(2, Side::White, None)).unwrap();
        sleep_ms(500).await;
        h.handle.shutdown().await;
        h.task.await.unwrap();

        let commands = lamp.commands();
        assert_eq!(commands[commands.len() - 2..], apply(SAVED)[..]);
        assert!(h.handle.status().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lamp_found_off_is_switched_on_then_off_again() {
        let source = MockGameSource::new().with_ongoing(vec![game()]);
        let lamp = MockLamp::new().with_state(SAVED).with_power_off();
        let tx = source.push_channel_stream("g1");
        let _h = start(&source, &lamp, FileConfig::default());

        tx.send(snapshot(0, Side::White, None)).unwrap();
        sleep_ms(500).await;
        let mut expected = vec![LampCommand::SetPower(true)];
        expected.extend(apply(LampState::new(GREEN, 40)));
        assert_eq!(lamp.commands(), expected);

        tx.send(Ok(GameRecord::Terminal(TerminalRecord {
            move_count: Some(0),
            status: GameStatus::Aborted,
            winner: None,
        })))
        .unwrap();
        sleep_ms(1000).await;

        let commands = lamp.commands();
        let tail = &commands[commands.len() - 3..];
        assert_eq!(tail[..2], apply(SAVED)[..]);
        assert_eq!(tail[2], LampCommand::SetPower(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_opponent_disconnect_dims_their_color() {
        let source = MockGameSource::new().with_ongoing(vec![game()]);
        let lamp = MockLamp::new();
        let tx = source.push_channel_stream("g1");
        let h = start(&source, &lamp, FileConfig::default());

        tx.send(snapshot(0, Side::White, None)).unwrap();
        sleep_ms(100).await;
        tx.send(black_left(1)).unwrap();
        sleep_ms(1000).await;

        // flash for the move, then the opponent's color at half brightness
        assert_eq!(count_color(&lamp, Rgb::WHITE), 1);
        assert_eq!(lamp.current(), (Some(RED), Some(20)));
        let effect = h.handle.status().await.unwrap().effect.unwrap();
        assert_eq!(effect.kind, "opponent_away");
    }
}
