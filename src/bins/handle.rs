//! Single-owner access to a [`TimeBins`] from concurrent producers.
//!
//! The aggregator lives inside one tokio task. Producers send samples over an
//! `mpsc` channel and receive the routing result over a `oneshot`, so samples
//! are applied strictly in arrival order and reads never observe a partially
//! applied sample.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::time_bins::{BinsError, BinsSnapshot, TimeBins};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum HandleError {
    #[error(transparent)]
    Bins(#[from] BinsError),

    /// The owning task has stopped, either via [`BinsHandle::into_inner`] or
    /// because the runtime shut down.
    #[error("time bins owner task is no longer running")]
    Closed,
}

enum Command {
    Add {
        fractional_hour: f64,
        value: f64,
        reply: oneshot::Sender<Result<usize, BinsError>>,
    },
    Snapshot {
        reply: oneshot::Sender<BinsSnapshot>,
    },
    Finish {
        reply: oneshot::Sender<TimeBins>,
    },
}

/// Cloneable handle to a [`TimeBins`] owned by a background task.
#[derive(Clone)]
pub struct BinsHandle {
    tx: mpsc::Sender<Command>,
}

impl BinsHandle {
    /// Moves `bins` into a new task on the current tokio runtime.
    pub fn spawn(bins: TimeBins) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(run_owner(bins, rx));
        Self { tx }
    }

    /// Routes one sample through the owner; see [`TimeBins::add_value`].
    pub async fn add_value(&self, fractional_hour: f64, value: f64) -> Result<usize, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Add {
            fractional_hour,
            value,
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| HandleError::Closed)??)
    }

    /// Returns the midpoints, means and counts as of every sample sent before this call.
    pub async fn snapshot(&self) -> Result<BinsSnapshot, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| HandleError::Closed)
    }

    /// Stops the owner and returns the aggregator.
    ///
    /// Other clones of this handle get [`HandleError::Closed`] afterwards.
    pub async fn into_inner(self) -> Result<TimeBins, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Finish { reply }).await?;
        rx.await.map_err(|_| HandleError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), HandleError> {
        self.tx.send(command).await.map_err(|_| HandleError::Closed)
    }
}

async fn run_owner(mut bins: TimeBins, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Add {
                fractional_hour,
                value,
                reply,
            } => {
                let _ = reply.send(bins.add_value(fractional_hour, value));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(bins.snapshot());
            }
            Command::Finish { reply } => {
                debug!(samples = bins.total_samples(), "Time bins owner finishing");
                let _ = reply.send(bins);
                return;
            }
        }
    }
    debug!("All time bins handles dropped");
}
