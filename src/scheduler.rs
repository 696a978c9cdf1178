//! CycleScheduler actor - Drives collection cycles on a fixed interval
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick ──> Collector::run_cycle ──> commit
//!     ↑
//!     └─── Commands (RunNow, Shutdown)
//! ```
//!
//! The actor awaits each cycle before it looks at the next tick or command, so
//! cycle N is committed before cycle N+1 dispatches. Ticks that fall due while
//! a cycle is running are delayed, not piled up.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument, warn};

use crate::collector::{Collector, CycleOutcome};

/// Commands accepted by the scheduler actor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run a cycle immediately and report its outcome
    RunNow {
        respond_to: oneshot::Sender<CycleOutcome>,
    },

    /// Stop the actor; answered once no cycle is running anymore
    Shutdown { respond_to: oneshot::Sender<()> },
}

pub struct CycleScheduler {
    collector: Arc<Collector>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
    period: Duration,
}

impl CycleScheduler {
    pub fn new(
        collector: Arc<Collector>,
        command_rx: mpsc::Receiver<SchedulerCommand>,
        period: Duration,
    ) -> Self {
        Self {
            collector,
            command_rx,
            period,
        }
    }

    /// Run the actor's main loop
    ///
    /// The first cycle starts right away. Runs until a `Shutdown` command
    /// arrives or every handle is dropped.
    #[instrument(skip(self), fields(period = ?self.period))]
    pub async fn run(mut self) {
        info!(
            "starting scheduler for {} hosts",
            self.collector.registry().len()
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stopped = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let CycleOutcome::Completed(report) = self.collector.run_cycle().await {
                        debug!("scheduled cycle finished: {report:?}");
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::RunNow { respond_to }) => {
                            debug!("received RunNow command");
                            let outcome = self.collector.run_cycle().await;
                            let _ = respond_to.send(outcome);
                        }

                        Some(SchedulerCommand::Shutdown { respond_to }) => {
                            debug!("received shutdown command");
                            stopped = Some(respond_to);
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        info!("scheduler stopped");

        if let Some(respond_to) = stopped {
            let _ = respond_to.send(());
        }
    }
}

/// Handle for controlling a [`CycleScheduler`]
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Spawn the scheduler actor on the current runtime
    pub fn spawn(collector: Arc<Collector>, period: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = CycleScheduler::new(collector, cmd_rx, period);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run a cycle now, outside the regular interval
    pub async fn run_now(&self) -> Result<CycleOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive cycle outcome")
    }

    /// Stop the scheduler
    ///
    /// Returns once the cycle that was running, if any, has been committed
    /// and the actor has left its loop.
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::Shutdown { respond_to: tx })
            .await
            .context("failed to send Shutdown command")?;

        rx.await.context("scheduler stopped before acknowledging shutdown")
    }
}
