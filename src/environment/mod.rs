//! Host Environment
//!
//! Abstracts the thing that owns the viewport: a terminal, an embedding host
//! that pushes sizes, or nothing at all (render-only contexts).
//!
//! Exactly one environment is active per thread. The registry attaches it
//! when the first subscriber mounts and detaches it when the last one
//! unmounts, so nothing is monitored while no consumer is alive.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use spark_viewport::environment::{self, ManualEnvironment};
//!
//! let env = Rc::new(ManualEnvironment::new(640, 480));
//! environment::install(env.clone());
//!
//! // Later, when the host reports a new size:
//! env.resize(50, 100);
//! ```

mod headless;
mod manual;
mod terminal;

pub use headless::HeadlessEnvironment;
pub use manual::ManualEnvironment;
pub use terminal::TerminalEnvironment;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::error::Result;

// =============================================================================
// Environment Trait
// =============================================================================

/// Source of viewport dimensions and resize notifications.
pub trait Environment {
    /// Size of the content area, if the host has one.
    fn content_size(&self) -> Option<(u32, u32)>;

    /// Size of the outer window, if the host has one.
    fn outer_size(&self) -> Option<(u32, u32)>;

    /// Start delivering resize notifications.
    fn attach(&self) {}

    /// Stop delivering resize notifications.
    fn detach(&self) {}

    /// Block for up to `timeout` waiting for a resize.
    ///
    /// Returns `Ok(true)` if the viewport was resized. Hosts that push
    /// resizes themselves keep the default, which just sleeps.
    fn wait_for_resize(&self, timeout: Duration) -> Result<bool> {
        if !timeout.is_zero() {
            std::thread::sleep(timeout);
        }
        Ok(false)
    }
}

// =============================================================================
// Active Environment
// =============================================================================

thread_local! {
    static ACTIVE: RefCell<Rc<dyn Environment>> = RefCell::new(Rc::new(TerminalEnvironment::new()));
}

/// Install the environment used by this thread.
///
/// Install before the first subscriber mounts; an environment that is
/// already attached is not migrated.
pub fn install(env: Rc<dyn Environment>) {
    ACTIVE.with(|active| *active.borrow_mut() = env);
}

/// The environment currently active on this thread.
pub fn current() -> Rc<dyn Environment> {
    ACTIVE.with(|active| active.borrow().clone())
}

/// Restore the default terminal environment (for testing).
pub fn reset_environment() {
    install(Rc::new(TerminalEnvironment::new()));
}
