use std::sync::Arc;

use lamp::{DeviceStatus, LampCommand, LampDriver, LampResult, LampState};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::Instrument;

use super::pattern::{self, Steps};
use super::{EffectDecision, Resolution};
use crate::config::resolve::GradualDim;

const COMMAND_CAPACITY: usize = 64;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulerError {
    #[error("Pattern scheduler closed")]
    Closed,
}

pub enum SchedulerCommand {
    Play {
        resolution: Resolution,
        dim: GradualDim,
    },
    /// Switch the lamp on before a session takes it over.
    PowerOn,
    /// Drop everything, play the farewell effects in order, then restore
    /// the lamp.
    Finish {
        farewell: Vec<EffectDecision>,
        restore: DeviceStatus,
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Cheap, cloneable handle to the scheduler task.
#[derive(Clone)]
pub struct SchedulerHandle {
    cmd_tx: mpsc::Sender<SchedulerCommand>,
    current: watch::Receiver<Option<EffectDecision>>,
}

impl SchedulerHandle {
    pub async fn play(&self, resolution: Resolution, dim: GradualDim) -> Result<(), SchedulerError> {
        self.send(SchedulerCommand::Play { resolution, dim }).await
    }

    pub async fn power_on(&self) -> Result<(), SchedulerError> {
        self.send(SchedulerCommand::PowerOn).await
    }

    /// Resolves once the lamp has been restored.
    pub async fn finish(
        &self,
        farewell: Vec<EffectDecision>,
        restore: DeviceStatus,
    ) -> Result<(), SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.send(SchedulerCommand::Finish {
            farewell,
            restore,
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SchedulerCommand::Shutdown).await;
    }

    /// The effect currently on the lamp.
    pub fn current(&self) -> Option<EffectDecision> {
        *self.current.borrow()
    }

    async fn send(&self, cmd: SchedulerCommand) -> Result<(), SchedulerError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SchedulerError::Closed)
    }
}

pub fn spawn_scheduler(driver: Arc<dyn LampDriver>) -> (SchedulerHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (current_tx, current_rx) = watch::channel(None);
    let scheduler = Scheduler {
        driver,
        running: None,
        steady: None,
        slot: None,
        dark: false,
        current_tx,
    };
    let task = tokio::spawn(
        scheduler
            .run(cmd_rx)
            .instrument(tracing::info_span!("scheduler")),
    );
    (
        SchedulerHandle {
            cmd_tx,
            current: current_rx,
        },
        task,
    )
}

struct Running {
    decision: EffectDecision,
    steps: Steps,
    index: usize,
    next_due: Instant,
}

struct Scheduler {
    driver: Arc<dyn LampDriver>,
    running: Option<Running>,
    /// Last steady decision.
    steady: Option<EffectDecision>,
    /// What a transient hands the lamp back to.
    slot: Option<LampState>,
    /// The last power command switched the lamp off.
    dark: bool,
    current_tx: watch::Sender<Option<EffectDecision>>,
}

impl Scheduler {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<SchedulerCommand>) {
        tracing::info!(lamp = self.driver.name(), "Pattern scheduler started");

        loop {
            let due = self.running.as_ref().map(|r| r.next_due);
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => match cmd {
                    Some(SchedulerCommand::Play { resolution, dim }) => {
                        self.play(resolution, dim).await;
                    }
                    Some(SchedulerCommand::PowerOn) => {
                        if let Err(e) = self.send(LampCommand::SetPower(true)).await {
                            tracing::warn!(error = %e, "Failed to switch lamp on");
                        }
                    }
                    Some(SchedulerCommand::Finish { farewell, restore, reply }) => {
                        self.finish(farewell, restore).await;
                        let _ = reply.send(());
                    }
                    Some(SchedulerCommand::Shutdown) | None => break,
                },
                _ = time::sleep_until(due.unwrap_or_else(Instant::now)), if due.is_some() => {
                    self.on_due().await;
                }
            }
        }

        tracing::info!("Pattern scheduler stopped");
    }

    async fn play(&mut self, resolution: Resolution, dim: GradualDim) {
        let incoming = resolution.effect;
        let steady = resolution.steady_part();

        if let Some(running) = &self.running {
            if running.decision.kind.is_transient()
                && incoming.priority() < running.decision.priority()
            {
                if let Some(steady) = steady {
                    tracing::debug!(kind = %steady.kind, "Transient running, updating revert target");
                    self.record_steady(steady);
                }
                return;
            }
        }

        if !incoming.kind.is_transient()
            && self.steady == Some(incoming)
            && self
                .running
                .as_ref()
                .map_or(true, |r| r.decision == incoming)
        {
            tracing::trace!(kind = %incoming.kind, "Unchanged steady effect");
            return;
        }

        if let Some(steady) = steady {
            self.record_steady(steady);
        }
        let dim = (!incoming.kind.is_transient()).then_some(&dim);
        let steps = pattern::steps_for(&incoming, dim);
        self.start(incoming, steps).await;
    }

    fn record_steady(&mut self, steady: EffectDecision) {
        self.steady = Some(steady);
        self.slot = Some(steady.state());
    }

    /// Replace whatever is running and issue the first step right away.
    async fn start(&mut self, decision: EffectDecision, steps: Steps) {
        if let Some(previous) = &self.running {
            tracing::debug!(from = %previous.decision.kind, to = %decision.kind, "Preempting pattern");
        }
        tracing::debug!(kind = %decision.kind, pattern = %decision.pattern, "Starting pattern");
        self.current_tx.send_replace(Some(decision));
        self.running = Some(Running {
            decision,
            steps,
            index: 0,
            next_due: Instant::now(),
        });
        self.on_due().await;
    }

    async fn on_due(&mut self) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        let Some(step) = running.steps.get(running.index).copied() else {
            self.complete().await;
            return;
        };
        running.index += 1;

        if let Err(e) = self.send(step.command).await {
            if let Some(aborted) = self.running.take() {
                tracing::warn!(error = %e, kind = %aborted.decision.kind, "Lamp command failed, aborting pattern");
            }
            // the lamp no longer shows the last steady effect
            self.steady = None;
            return;
        }
        tracing::debug!(command = ?step.command, "Lamp command sent");
        if let Some(running) = self.running.as_mut() {
            running.next_due = Instant::now() + step.hold;
        }
    }

    async fn complete(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        if !running.decision.kind.is_transient() {
            return;
        }
        if let Some(state) = self.slot {
            if let Err(e) = self.send(LampCommand::Apply(state)).await {
                tracing::warn!(error = %e, kind = %running.decision.kind, "Failed to revert after transient");
                // still showing the transient
                self.steady = None;
                self.current_tx.send_replace(Some(running.decision));
                return;
            }
        }
        self.current_tx.send_replace(self.steady);
    }

    /// Send one command, switching the lamp back on first if a blink left it
    /// off.
    async fn send(&mut self, command: LampCommand) -> LampResult<()> {
        if self.dark && !matches!(command, LampCommand::SetPower(_)) {
            self.driver.apply(LampCommand::SetPower(true)).await?;
            self.dark = false;
        }
        self.driver.apply(command).await?;
        if let LampCommand::SetPower(on) = command {
            self.dark = !on;
        }
        Ok(())
    }

    async fn finish(&mut self, farewell: Vec<EffectDecision>, restore: DeviceStatus) {
        self.running = None;

        for effect in farewell {
            tracing::info!(kind = %effect.kind, pattern = %effect.pattern, "Playing farewell");
            self.current_tx.send_replace(Some(effect));
            for step in pattern::steps_for(&effect, None) {
                if let Err(e) = self.send(step.command).await {
                    tracing::warn!(error = %e, kind = %effect.kind, "Farewell aborted");
                    break;
                }
                time::sleep(step.hold).await;
            }
        }

        match self.restore(restore).await {
            Ok(()) => tracing::info!(%restore, "Lamp restored"),
            Err(e) => tracing::warn!(error = %e, "Failed to restore lamp"),
        }
        self.steady = None;
        self.slot = None;
        self.current_tx.send_replace(None);
    }

    async fn restore(&mut self, restore: DeviceStatus) -> LampResult<()> {
        self.send(LampCommand::Apply(restore.state)).await?;
        if !restore.on {
            self.send(LampCommand::SetPower(false)).await?;
        }
        Ok(())
    }
}
