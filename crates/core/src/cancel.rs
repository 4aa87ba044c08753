//! Cooperative cancellation for saves
//!
//! A save checks its token between pages and stops with
//! `CompositionError::Cancelled` once the token has been cancelled.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared cancel flag; all clones observe the same state
///
/// # Example
///
/// ```
/// use pdf_overlay_core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// token.cancel();
/// assert!(worker_token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
