//! Requested-N flow control window.
//!
//! Each request stream owns a [`RequestWindow`] holding the number of
//! emissions its consumer has authorized. The producer acquires one credit
//! per payload and suspends when the window is empty; the multiplexer's
//! dispatch path grants further credit when REQUEST_N frames arrive and
//! closes the window on teardown.

use tokio::sync::Semaphore;

/// `requestN` value treated as "effectively unbounded".
pub const UNBOUNDED: u32 = u32::MAX;

/// Error returned by [`RequestWindow::acquire`] once the window is closed.
///
/// A closed window means the stream was cancelled or its connection torn
/// down; the producer must stop emitting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowClosed;

/// Consumer-authorized emission credit for one stream.
///
/// Grants and acquisitions are decoupled: the multiplexer grants from the
/// frame-dispatch path while the producer task acquires, so the counter is a
/// semaphore rather than a plain integer.
#[derive(Debug)]
pub struct RequestWindow {
    credits: Semaphore,
}

impl RequestWindow {
    /// Create a window with `initial` credits.
    #[must_use]
    pub fn new(initial: u32) -> Self {
        Self {
            credits: Semaphore::new(initial as usize),
        }
    }

    /// Wait for one emission credit and consume it.
    ///
    /// Suspends indefinitely while the window is empty; a stalled stream is
    /// legitimate, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`WindowClosed`] once [`close`](Self::close) has been called.
    pub async fn acquire(&self) -> Result<(), WindowClosed> {
        match self.credits.acquire().await {
            Ok(permit) => {
                permit.forget();
                Ok(())
            }
            Err(_) => Err(WindowClosed),
        }
    }

    /// Add `n` credits, saturating at [`UNBOUNDED`].
    ///
    /// Only the connection's dispatch task grants, so reading the available
    /// count before adding is not racy.
    pub fn grant(&self, n: u32) {
        let headroom = UNBOUNDED as usize - self.credits.available_permits();
        self.credits.add_permits((n as usize).min(headroom));
    }

    /// Close the window, waking any suspended producer with [`WindowClosed`].
    pub fn close(&self) { self.credits.close(); }

    /// Credits currently available.
    #[must_use]
    pub fn available(&self) -> usize { self.credits.available_permits() }
}
