// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! contains useful type definitions shared by the dispatcher, the sequencer and the gripper.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// Blocking wait between two discrete steps of a run.
///
/// [`ThreadDelay`] is used on the real arm. Tests substitute an implementation which only
/// records the requested durations.
#[cfg_attr(test, automock)]
pub trait Delay {
    /// Blocks the calling thread for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Copy, Clone)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn sleep(&mut self, duration: Duration) {
        if duration > Duration::ZERO {
            std::thread::sleep(duration);
        }
    }
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Cooperative cancellation flag for a run.
///
/// Clones share the same flag, so a token handed to another thread can stop a run which is
/// currently executing. The sequencer checks it before every move.
#[derive(Debug, Default, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token which is not cancelled.
    pub fn new() -> Self {
        CancelToken::default()
    }
    /// Requests cancellation. The run stops before its next move.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
    /// Clears a previous cancellation so the token can be reused for the next run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
