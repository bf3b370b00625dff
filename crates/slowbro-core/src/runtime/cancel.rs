// crates/slowbro-core/src/runtime/cancel.rs
// ============================================================================
// Module: Slowbro Cancellation
// Description: Caller-initiated cancellation for a diagnostic run.
// Purpose: Let callers cut sampling short and route the run into revert.
// Dependencies: tokio::sync::watch
// ============================================================================

//! ## Overview
//! A [`CancelHandle`] flips a shared flag observed by every clone of the
//! paired [`CancelSignal`]. Cancellation is level-triggered: once set it stays
//! set, so late observers still see it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tokio::sync::watch;

// ============================================================================
// SECTION: Handle and Signal
// ============================================================================

/// Sending half of a cancellation pair.
#[derive(Debug)]
pub struct CancelHandle {
    /// Shared cancellation flag.
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns a new signal observing this handle.
    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving half of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    /// Shared cancellation flag.
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Returns a signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self {
            rx,
        }
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when cancellation is requested; pends forever if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Creates a linked cancellation handle and signal.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle {
            tx,
        },
        CancelSignal {
            rx,
        },
    )
}
