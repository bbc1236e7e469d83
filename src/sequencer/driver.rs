/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Tokio event loop for a [`ThreadContext`].
//!
//! The driver plays the part of the owning event loop: each iteration runs
//! one dispatch pass and one timer check, then sleeps until the next
//! deadline, a wake-up from a newly pending sequencer, the idle poll
//! interval, or shutdown, whichever comes first. On shutdown every
//! remaining sequencer is destroyed.

use super::core::ThreadContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::debug;

/// Counters reported by a driver when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Loop iterations.
    pub iterations: u64,

    /// Iterations in which at least one event was dispatched.
    pub busy_iterations: u64,

    /// Sequencers destroyed during shutdown.
    pub destroyed_at_shutdown: usize,
}

/// Runs a [`ThreadContext`] on a tokio task.
///
/// # Examples
///
/// ```no_run
/// use sequencer_sched::sequencer::{ContextDriver, ThreadContext};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let context = Arc::new(ThreadContext::new(0));
/// let handle = ContextDriver::new(Arc::clone(&context)).spawn();
/// // Create sequencers and queue events through `context`...
/// let stats = handle.shutdown().await?;
/// println!("ran {} iterations", stats.iterations);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ContextDriver {
    context: Arc<ThreadContext>,
}

impl ContextDriver {
    /// Creates a driver for `context`.
    #[must_use]
    pub fn new(context: Arc<ThreadContext>) -> Self {
        Self { context }
    }

    /// Spawns the event loop on a new task.
    ///
    /// Returns a handle used to stop it.
    #[must_use]
    pub fn spawn(self) -> DriverHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move { self.run_loop(shutdown_rx).await });

        DriverHandle {
            handle,
            shutdown: shutdown_tx,
        }
    }

    /// Runs the loop until `shutdown_rx` fires or its sender is dropped.
    async fn run_loop(self, mut shutdown_rx: oneshot::Receiver<()>) -> DriverStats {
        let context = self.context;
        let idle = Duration::from_micros(context.config().idle_poll_us);
        let mut stats = DriverStats::default();

        debug!(tsi = context.tsi(), "sequencer driver started");

        loop {
            stats.iterations += 1;
            let worked = context.dispatch_pending();
            let next_us = context.check_timeouts(context.now());

            if worked {
                stats.busy_iterations += 1;
                match shutdown_rx.try_recv() {
                    Err(TryRecvError::Empty) => {
                        tokio::task::yield_now().await;
                        continue;
                    }
                    Ok(()) | Err(TryRecvError::Closed) => break,
                }
            }

            let wait = next_us.map_or(idle, |us| Duration::from_micros(us).min(idle));
            tokio::select! {
                _ = &mut shutdown_rx => break,
                () = context.wake_signal().notified() => {}
                () = tokio::time::sleep(wait) => {}
            }
        }

        stats.destroyed_at_shutdown = context.destroy_all();
        debug!(
            tsi = context.tsi(),
            iterations = stats.iterations,
            destroyed = stats.destroyed_at_shutdown,
            "sequencer driver stopped"
        );
        stats
    }
}

/// Handle to a spawned driver task.
#[derive(Debug)]
pub struct DriverHandle {
    handle: tokio::task::JoinHandle<DriverStats>,
    shutdown: oneshot::Sender<()>,
}

impl DriverHandle {
    /// Stops the driver, destroying every remaining sequencer, and waits
    /// for the task to finish.
    ///
    /// # Errors
    ///
    /// Returns the join error if the driver task panicked.
    pub async fn shutdown(self) -> Result<DriverStats, tokio::task::JoinError> {
        let _ = self.shutdown.send(());
        self.handle.await
    }

    /// Returns `true` once the driver task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
