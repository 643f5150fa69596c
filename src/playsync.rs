// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{sync::Arc, time::Duration};

use parking_lot::{Condvar, Mutex};

/// Represents the current cancel state.
#[derive(PartialEq)]
enum CancelState {
    Untouched,
    Cancelled,
}

/// A cancel handle is passed to long-running playback (scheduled songs, the air
/// ticker). It's the runner's responsibility to respect a cancel request.
#[derive(Clone)]
pub struct CancelHandle {
    /// Set to cancelled if the underlying operation should stop.
    cancelled: Arc<Mutex<CancelState>>,
    /// The condvar will handle notification of cancelling.
    condvar: Arc<Condvar>,
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle {
            cancelled: Arc::new(Mutex::new(CancelState::Untouched)),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// Returns true if the operation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock() == CancelState::Cancelled
    }

    /// Sleeps for up to the given timeout, waking early on cancellation.
    /// Returns true if the handle was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut cancelled = self.cancelled.lock();
        if *cancelled == CancelState::Untouched {
            self.condvar.wait_while_for(
                &mut cancelled,
                |state| *state == CancelState::Untouched,
                timeout,
            );
        }
        *cancelled == CancelState::Cancelled
    }

    /// Cancels the operation.
    pub fn cancel(&self) {
        let mut cancel_state = self.cancelled.lock();
        if *cancel_state == CancelState::Untouched {
            *cancel_state = CancelState::Cancelled;
            self.condvar.notify_all();
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        CancelHandle::new()
    }
}

#[cfg(test)]
mod test {
    use std::{
        thread,
        time::{Duration, Instant},
    };

    use super::*;

    #[test]
    fn test_cancel_handle_cancelled() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.is_cancelled());

        let join = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || cancel_handle.wait_timeout(Duration::from_secs(30)))
        };

        cancel_handle.cancel();
        assert!(matches!(join.join(), Ok(true)));
        assert!(cancel_handle.is_cancelled());
    }

    #[test]
    fn test_cancel_handle_timeout() {
        let cancel_handle = CancelHandle::new();
        let start = Instant::now();
        assert!(!cancel_handle.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(!cancel_handle.is_cancelled());
    }

    #[test]
    fn test_cancelled_handle_does_not_wait() {
        let cancel_handle = CancelHandle::new();
        cancel_handle.cancel();
        let start = Instant::now();
        assert!(cancel_handle.wait_timeout(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
