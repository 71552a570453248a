//! Falling-edge notification for cooperative tasks.
//!
//! [`EdgeClock`] counts falling edges and wakes every parked [`EdgeWait`] when
//! one occurs. A wait resolves once its target count is reached. A reset bumps
//! the clock's epoch, and every wait created before it resolves with
//! [`DriverError::ResetAbort`] on its next poll.

use std::cell::RefCell;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::DriverError;

#[derive(Debug, Default)]
struct ClockShared {
    edges: u64,
    epoch: u64,
    waiters: Vec<Waker>,
}

impl ClockShared {
    fn take_waiters(&mut self) -> Vec<Waker> {
        mem::take(&mut self.waiters)
    }
}

/// Logical clock shared by the harness and its tasks.
#[derive(Debug, Clone, Default)]
pub struct EdgeClock {
    shared: Rc<RefCell<ClockShared>>,
}

impl EdgeClock {
    /// Creates a clock with no elapsed edges.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Falling edges seen so far.
    #[must_use]
    pub fn edges(&self) -> u64 {
        self.shared.borrow().edges
    }

    /// Number of resets signalled so far.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.shared.borrow().epoch
    }

    /// Records a falling edge and wakes all parked waits.
    pub fn falling_edge(&self) {
        let waiters = {
            let mut shared = self.shared.borrow_mut();
            shared.edges += 1;
            shared.take_waiters()
        };
        waiters.into_iter().for_each(Waker::wake);
    }

    /// Starts a new epoch so that every pending wait aborts.
    pub fn abort_waiters(&self) {
        let waiters = {
            let mut shared = self.shared.borrow_mut();
            shared.epoch += 1;
            shared.take_waiters()
        };
        waiters.into_iter().for_each(Waker::wake);
    }

    /// Waits until `count` more falling edges have occurred.
    pub fn wait_edges(&self, count: u64) -> EdgeWait {
        let shared = self.shared.borrow();
        EdgeWait {
            clock: self.clone(),
            target: shared.edges + count,
            epoch: shared.epoch,
        }
    }
}

/// Future returned by [`EdgeClock::wait_edges`].
#[derive(Debug)]
#[must_use = "edge waits do nothing unless awaited"]
pub struct EdgeWait {
    clock: EdgeClock,
    target: u64,
    epoch: u64,
}

impl Future for EdgeWait {
    type Output = Result<(), DriverError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.clock.shared.borrow_mut();
        if shared.epoch != self.epoch {
            return Poll::Ready(Err(DriverError::ResetAbort));
        }
        if shared.edges >= self.target {
            return Poll::Ready(Ok(()));
        }
        shared.waiters.push(cx.waker().clone());
        Poll::Pending
    }
}
