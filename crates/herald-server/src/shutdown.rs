use crate::error::{Result, ServerError};
use futures::stream::StreamExt;
use signal_hook::consts::signal::*;
use signal_hook_tokio::Signals;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Types of shutdown signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Drain open requests within the shutdown timeout
    Graceful,
    /// Stop without waiting for open requests
    Immediate,
}

/// Shutdown handle for external shutdown requests
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: broadcast::Sender<ShutdownSignal>,
}

impl ShutdownHandle {
    /// Request graceful shutdown
    pub fn shutdown_graceful(&self) -> Result<()> {
        self.send(ShutdownSignal::Graceful)
    }

    /// Request immediate shutdown
    pub fn shutdown_immediate(&self) -> Result<()> {
        self.send(ShutdownSignal::Immediate)
    }

    fn send(&self, signal: ShutdownSignal) -> Result<()> {
        self.sender
            .send(signal)
            .map_err(|_| ServerError::signal("Failed to send shutdown signal"))?;
        Ok(())
    }

    /// Subscribe to shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.sender.subscribe()
    }
}

/// Fans shutdown requests from OS signals and handles out to the HTTP
/// server, the background manager and the topic registry
#[derive(Debug)]
pub struct ShutdownCoordinator {
    shutdown_sender: broadcast::Sender<ShutdownSignal>,
    _shutdown_receiver: broadcast::Receiver<ShutdownSignal>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_sender, shutdown_receiver) = broadcast::channel(16);
        Self {
            shutdown_sender,
            _shutdown_receiver: shutdown_receiver,
        }
    }

    /// Get a handle for external shutdown requests
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            sender: self.shutdown_sender.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.shutdown_sender.subscribe()
    }

    /// Start listening for shutdown signals
    pub fn listen_for_signals(&self) -> Result<()> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT])
            .map_err(|e| ServerError::signal(e.to_string()))?;

        let shutdown_sender = self.shutdown_sender.clone();

        tokio::spawn(async move {
            while let Some(signal) = signals.next().await {
                match signal {
                    SIGTERM => {
                        info!("Received SIGTERM, initiating graceful shutdown");
                        let _ = shutdown_sender.send(ShutdownSignal::Graceful);
                    }
                    SIGINT => {
                        info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                        let _ = shutdown_sender.send(ShutdownSignal::Graceful);
                    }
                    SIGQUIT => {
                        warn!("Received SIGQUIT, initiating immediate shutdown");
                        let _ = shutdown_sender.send(ShutdownSignal::Immediate);
                    }
                    _ => {
                        warn!(signal, "Received unknown signal");
                    }
                }
            }
        });

        info!("Signal handlers installed");
        Ok(())
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for the next shutdown signal. A closed channel counts as graceful.
pub async fn wait_for_shutdown(mut receiver: broadcast::Receiver<ShutdownSignal>) -> ShutdownSignal {
    loop {
        match receiver.recv().await {
            Ok(signal) => return signal,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Shutdown receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return ShutdownSignal::Graceful,
        }
    }
}
