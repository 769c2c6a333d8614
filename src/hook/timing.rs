//! Per-subscription commit timing (debounce / throttle).
//!
//! All timer state belongs to one subscription and is cancelled when it
//! unmounts. Timer callbacks hold only a weak reference back to the
//! subscription, so a timer that somehow outlives it does nothing.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use crate::registry::{Delivery, SubscriberOptions};
use crate::timer::{self, TimerHandle};

/// What to do with a delivery right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Policy {
    /// No timing configured: commit synchronously.
    Immediate,
    /// Debounce only.
    Debounce,
    /// Throttle only: leading commit plus one trailing commit per window.
    Throttle,
    /// Debounce commits the delivery; a parallel throttle re-reads the
    /// viewport and commits when the subscribed dimension moved.
    DebounceAndThrottle,
}

pub(crate) struct Timing {
    pub debounce: Duration,
    pub throttle: Duration,
    debounce_timer: Cell<Option<TimerHandle>>,
    throttle_timer: Cell<Option<TimerHandle>>,
    /// When the throttle last let something through
    last_throttled: Cell<Option<Duration>>,
    /// Newest delivery waiting for the trailing throttle commit
    pending: RefCell<Option<Delivery>>,
}

impl Timing {
    pub fn new(options: &SubscriberOptions) -> Self {
        Self {
            debounce: options.debounce,
            throttle: options.throttle,
            debounce_timer: Cell::new(None),
            throttle_timer: Cell::new(None),
            last_throttled: Cell::new(None),
            pending: RefCell::new(None),
        }
    }

    pub fn policy(&self) -> Policy {
        match (self.debounce.is_zero(), self.throttle.is_zero()) {
            (true, true) => Policy::Immediate,
            (false, true) => Policy::Debounce,
            (true, false) => Policy::Throttle,
            (false, false) => Policy::DebounceAndThrottle,
        }
    }

    /// Replace the pending debounce timer.
    pub fn restart_debounce(&self, handle: TimerHandle) {
        if let Some(previous) = self.debounce_timer.replace(Some(handle)) {
            previous.cancel();
        }
    }

    pub fn debounce_fired(&self) {
        self.debounce_timer.set(None);
    }

    pub fn throttle_pending(&self) -> bool {
        self.throttle_timer.get().is_some()
    }

    pub fn set_throttle_timer(&self, handle: TimerHandle) {
        if let Some(previous) = self.throttle_timer.replace(Some(handle)) {
            previous.cancel();
        }
    }

    pub fn throttle_fired(&self) {
        self.throttle_timer.set(None);
        self.last_throttled.set(Some(timer::now()));
    }

    /// Time left in the current throttle window (zero when it has elapsed
    /// or nothing has gone through yet).
    pub fn throttle_remaining(&self) -> Duration {
        match self.last_throttled.get() {
            Some(last) => self.throttle.saturating_sub(timer::now().saturating_sub(last)),
            None => Duration::ZERO,
        }
    }

    pub fn mark_throttled_now(&self) {
        self.last_throttled.set(Some(timer::now()));
    }

    pub fn stash(&self, delivery: Delivery) {
        *self.pending.borrow_mut() = Some(delivery);
    }

    pub fn take_stashed(&self) -> Option<Delivery> {
        self.pending.borrow_mut().take()
    }

    /// Cancel every timer. Safe to call repeatedly.
    pub fn cancel_all(&self) {
        if let Some(handle) = self.debounce_timer.take() {
            handle.cancel();
        }
        if let Some(handle) = self.throttle_timer.take() {
            handle.cancel();
        }
        self.pending.borrow_mut().take();
    }

    pub fn has_pending_timers(&self) -> bool {
        self.debounce_timer.get().is_some_and(|h| h.is_pending())
            || self.throttle_timer.get().is_some_and(|h| h.is_pending())
    }
}
