//! Event Loop - drive resize notifications and timers.
//!
//! Everything in this crate runs on one thread, in turns of a cooperative
//! loop. A turn fires the timers that are due, waits for a resize (never
//! longer than the next timer deadline), and dispatches if one arrived.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use spark_viewport::{runtime, use_viewport_sizes};
//!
//! let sub = use_viewport_sizes(150);
//!
//! // Option 1: drive the loop yourself
//! while runtime::tick(Duration::from_millis(16))? {
//!     // Your logic here
//! }
//!
//! // Option 2: you already read crossterm events; forward them
//! let event = crossterm::event::read()?;
//! runtime::handle_event(&event);
//! ```

use std::time::Duration;

use crossterm::event::Event;

use crate::dispatcher;
use crate::environment;
use crate::error::Result;
use crate::registry;
use crate::timer;

/// Run one turn of the loop, waiting at most `timeout`.
///
/// Returns `Ok(false)` once there is nothing left to do: no subscribers and
/// no pending timers.
pub fn tick(timeout: Duration) -> Result<bool> {
    timer::run_due();

    let wait = match timer::time_until_next() {
        Some(until_timer) => timeout.min(until_timer),
        None => timeout,
    };

    if environment::current().wait_for_resize(wait)? && registry::is_watching() {
        dispatcher::on_resize();
    }

    timer::run_due();
    Ok(has_work())
}

/// Run the loop for `duration` of clock time, or until idle.
pub fn run_for(duration: Duration) -> Result<()> {
    let deadline = timer::now() + duration;
    loop {
        let now = timer::now();
        if now >= deadline {
            return Ok(());
        }
        if !tick((deadline - now).min(Duration::from_millis(16)))? {
            return Ok(());
        }
    }
}

/// Forward an event from a host-owned crossterm loop.
///
/// Returns `true` if it was a resize and subscribers were notified.
pub fn handle_event(event: &Event) -> bool {
    match event {
        Event::Resize(_, _) if registry::is_watching() => {
            dispatcher::on_resize();
            true
        }
        _ => false,
    }
}

/// Whether any subscriber or timer is alive.
pub fn has_work() -> bool {
    registry::is_watching() || timer::pending_count() > 0
}

/// Clear all subscriptions, timers, cached state and installed hosts
/// (for testing).
pub fn reset_viewport_state() {
    registry::reset_registry();
    dispatcher::reset_dispatcher();
    timer::reset_timers();
    environment::reset_environment();
}

// =============================================================================
// TESTS
// =============================================================================
