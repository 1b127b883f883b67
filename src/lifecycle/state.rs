//! Observable lifecycle state.

use tokio::sync::watch;

/// Lifecycle states of a managed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Built, nothing resolved or bound yet.
    Constructed,
    /// First resolution in progress or completed without serving.
    Resolving,
    /// Accept loop running.
    Serving,
    /// Graceful stop initiated, draining in-flight work.
    Stopping,
    /// Terminal. Restart is not supported.
    Stopped,
}

/// Lifecycle state on a watch channel.
///
/// Transitions are compare-and-set under the channel's internal lock, so
/// concurrent start/stop paths race for exactly one winner, and `stop` can
/// await the `Stopped` publication without polling.
pub struct StateCell {
    tx: watch::Sender<Lifecycle>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Lifecycle::Constructed);
        Self { tx }
    }

    /// The current state.
    pub fn current(&self) -> Lifecycle {
        *self.tx.borrow()
    }

    /// Atomically advance to `to` if the current state is one of `from`.
    /// Returns the observed state as the error when the transition loses.
    pub fn advance_if(&self, from: &[Lifecycle], to: Lifecycle) -> Result<(), Lifecycle> {
        let mut observed = Lifecycle::Constructed;
        let changed = self.tx.send_if_modified(|state| {
            observed = *state;
            if from.contains(state) {
                *state = to;
                true
            } else {
                false
            }
        });

        if changed {
            Ok(())
        } else {
            Err(observed)
        }
    }

    /// Unconditionally publish `to`.
    pub fn set(&self, to: Lifecycle) {
        self.tx.send_replace(to);
    }

    /// Wait until the state equals `target`.
    pub async fn wait_for(&self, target: Lifecycle) {
        let mut rx = self.tx.subscribe();
        // only fails if the sender is dropped, which cannot happen while
        // `self` is borrowed
        let _ = rx.wait_for(|state| *state == target).await;
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
