//! # spark-viewport
//!
//! Shared viewport size subscriptions for reactive UIs.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals): every
//! consumer gets a `Signal<Viewport>` that only changes when the part of the
//! viewport it cares about changes.
//!
//! ## Architecture
//!
//! Any number of consumers share a single resize watch. The watch is attached
//! when the first consumer mounts and detached when the last one unmounts.
//!
//! ```text
//! resize → dispatcher (read once) → registry → per-subscriber signature check
//!        → timing policy (debounce / throttle) → Signal::set → re-render
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Viewport snapshot, dimension filter, signatures
//! - [`environment`] - Terminal / host-driven / headless viewport sources
//! - [`reader`] - Live dimension reads
//! - [`registry`] - Subscriber registry and watch lifecycle
//! - [`dispatcher`] - Per-subscriber change dispatch
//! - [`hook`] - `use_viewport_sizes` and its timing policies
//! - [`timer`] - Cooperative timeouts and clocks
//! - [`runtime`] - Event loop glue

pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod hook;
pub mod reader;
pub mod registry;
pub mod runtime;
pub mod timer;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use error::{Result, ViewportError};

pub use environment::{
    Environment, HeadlessEnvironment, ManualEnvironment, TerminalEnvironment,
};

pub use reader::{current_height, current_viewport, current_width};

pub use registry::{Delivery, Hasher, ListenerId, SubscriberOptions};

pub use dispatcher::{dispatch, DispatchReport};

pub use hook::{
    use_viewport_sizes, Refresh, Sizes, ViewportConfig, ViewportInput, ViewportSubscription,
};

pub use timer::{Clock, ManualClock, SystemClock, TimerHandle};

pub use runtime::{handle_event, reset_viewport_state, run_for, tick};
