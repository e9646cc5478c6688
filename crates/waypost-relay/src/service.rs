//! Long-running relay service with a command-based API
//!
//! The service owns the [`RelayController`] on a single task and funnels
//! every input (notification events, connectivity signals, periodic ticks,
//! stats queries) through one command queue, so relay state is updated by
//! exactly one event at a time. Callers hold a cheap cloneable
//! [`RelayHandle`].

use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::link::LinkTransport;
use crate::relay::{
    ConnectivitySignal, NotificationEvent, PowerSource, RelayController, RelayStats,
};

/// Interval of the internally generated clock tick
const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Command channel depth
const COMMAND_BUFFER: usize = 64;

/// Commands accepted by the relay service
#[derive(Debug)]
pub enum RelayCommand {
    /// A notification lifecycle event arrived
    Notification(NotificationEvent),
    /// Radio availability changed
    Connectivity(ConnectivitySignal),
    /// External clock tick carrying the current Unix-millisecond time
    Tick(i64),
    /// Query the current statistics
    GetStats(oneshot::Sender<RelayStats>),
    /// Stop the service, tearing the link down
    Shutdown,
}

/// Cloneable handle for submitting commands to a running relay service
#[derive(Debug, Clone)]
pub struct RelayHandle {
    command_tx: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    /// Submit a notification lifecycle event
    pub async fn notify(&self, event: NotificationEvent) -> Result<()> {
        self.command_tx
            .send(RelayCommand::Notification(event))
            .await?;
        Ok(())
    }

    /// Report a radio availability change
    pub async fn connectivity(&self, signal: ConnectivitySignal) -> Result<()> {
        self.command_tx
            .send(RelayCommand::Connectivity(signal))
            .await?;
        Ok(())
    }

    /// Fetch the current relay statistics
    pub async fn stats(&self) -> Result<RelayStats> {
        let (tx, rx) = oneshot::channel();
        self.command_tx.send(RelayCommand::GetStats(tx)).await?;
        rx.await.map_err(|_| RelayError::ChannelClosed)
    }

    /// Ask the service to stop
    pub async fn shutdown(&self) -> Result<()> {
        self.command_tx.send(RelayCommand::Shutdown).await?;
        Ok(())
    }
}

/// The relay service run loop
pub struct RelayService<T: LinkTransport, P: PowerSource> {
    controller: RelayController<T, P>,
    command_rx: mpsc::Receiver<RelayCommand>,
}

impl<T: LinkTransport, P: PowerSource> RelayService<T, P> {
    /// Create a service, its handle and the link status line receiver
    pub fn new(
        config: RelayConfig,
        transport: T,
        power: P,
    ) -> (Self, RelayHandle, watch::Receiver<String>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (controller, status_rx) = RelayController::new(config, transport, power);
        (
            Self {
                controller,
                command_rx,
            },
            RelayHandle { command_tx },
            status_rx,
        )
    }

    /// Run until shutdown or until every handle is dropped
    ///
    /// The initial connect is attempted immediately; its failure does not
    /// end the service, since a later connectivity signal may recover it.
    pub async fn run(mut self) -> Result<()> {
        info!("Relay service starting");
        if let Err(e) = self.controller.start().await {
            warn!("Initial connect failed ({}), awaiting connectivity", e);
        }

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.reset();

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(RelayCommand::Notification(event)) => {
                            if let Err(e) = self.controller.on_cue(event).await {
                                debug!("Cue handling failed ({}): {}", e.error_code(), e);
                            }
                        }
                        Some(RelayCommand::Connectivity(signal)) => {
                            self.controller.on_connectivity(signal).await;
                        }
                        Some(RelayCommand::Tick(now_millis)) => {
                            self.controller.on_tick(now_millis).await;
                        }
                        Some(RelayCommand::GetStats(reply)) => {
                            let _ = reply.send(self.controller.stats().clone());
                        }
                        Some(RelayCommand::Shutdown) | None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.controller
                        .on_tick(chrono::Utc::now().timestamp_millis())
                        .await;
                }
            }
        }

        info!("Relay service stopping");
        self.controller.stop().await;
        Ok(())
    }
}
