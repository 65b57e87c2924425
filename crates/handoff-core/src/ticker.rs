//! Cancellable periodic timer.
//!
//! A worker thread posts one message per interval into a channel owned by the
//! coordinator. The guard cancels and joins the thread when dropped, so no
//! message is posted after [`PeriodicTimer::cancel`] returns.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError, select};

pub struct PeriodicTimer {
    cancel_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
    interval: Duration,
}

impl PeriodicTimer {
    /// Start posting `make()` into `sink` every `interval`.
    ///
    /// Ticks that find `sink` full are dropped. The worker exits on its own
    /// when the receiving side of `sink` is gone.
    pub fn start<T, F>(interval: Duration, sink: Sender<T>, make: F) -> Self
    where
        T: Send + 'static,
        F: Fn() -> T + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(0);
        let join = std::thread::spawn(move || {
            let ticks = crossbeam_channel::tick(interval);
            loop {
                select! {
                    recv(cancel_rx) -> _ => break,
                    recv(ticks) -> _ => {
                        match sink.try_send(make()) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                tracing::trace!("ticker: sink full, tick dropped");
                            }
                            Err(TrySendError::Disconnected(_)) => break,
                        }
                    }
                }
            }
        });
        tracing::debug!(interval_ms = interval.as_millis() as u64, "ticker: started");
        Self {
            cancel_tx: Some(cancel_tx),
            join: Some(join),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.join.is_some()
    }

    /// Stop the worker and wait for it to exit. Idempotent.
    pub fn cancel(&mut self) {
        // Dropping the sender disconnects the cancel channel and wakes the select.
        self.cancel_tx.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::warn!("ticker: worker panicked");
            }
            tracing::debug!("ticker: cancelled");
        }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
