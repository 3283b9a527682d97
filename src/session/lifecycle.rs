//! Stop signal with a cause
//!
//! Every publisher, subscriber and server run cycle owns a `Lifecycle`.
//! Stopping it records the first cause and cancels the underlying token, so
//! any number of observers can wait for termination.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::error::Error;

/// Cloneable stop signal carrying the cause of termination
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    token: CancellationToken,
    reason: Arc<Mutex<Option<Error>>>,
}

impl Lifecycle {
    /// Create a new, running lifecycle
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop with the given cause
    ///
    /// Returns `false` if already stopped; the first cause is kept.
    pub fn stop(&self, reason: Error) -> bool {
        {
            let mut slot = self.reason.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason);
        }
        self.token.cancel();
        true
    }

    /// Whether `stop` has been called
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The cause passed to the first `stop`, if stopped
    pub fn reason(&self) -> Option<Error> {
        self.reason.lock().clone()
    }

    /// Wait until stopped
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }

    /// Owned future resolving when stopped
    ///
    /// Holds only the token, not the owning entity.
    pub fn stopped_owned(&self) -> WaitForCancellationFutureOwned {
        self.token.clone().cancelled_owned()
    }
}
