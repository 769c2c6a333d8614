//! Change Dispatcher - one resize, per-subscriber delivery
//!
//! Every cycle reads the viewport exactly once, caches it as the last-known
//! snapshot, and walks the registry. Each subscriber's signature is computed
//! from that shared snapshot and compared with the signature of the last
//! snapshot it was given; only subscribers whose signature moved are called.
//!
//! A breakpoint subscriber and a pixel subscriber share the same resize
//! notification but diverge here: the pixel one fires on every change, the
//! breakpoint one only when the bucket changes.
//!
//! # Failure isolation
//!
//! A panicking listener (or hasher) is caught, logged and reported; the rest
//! of the cycle still runs. Its stored signature is left alone, so it is
//! offered the next change again.
//!
//! # Re-entrancy
//!
//! No registry borrow is held while user code runs, so listeners may mount
//! or unmount subscriptions. A dispatch requested from inside a listener is
//! not nested: it is folded into one more full cycle after the current one.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{error, trace};

use crate::error::{panic_message, ViewportError};
use crate::reader;
use crate::registry::{self, Delivery, ListenerId};
use crate::types::Viewport;

// =============================================================================
// STATE
// =============================================================================

thread_local! {
    static LAST_KNOWN: Cell<Option<Viewport>> = const { Cell::new(None) };
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
    static RERUN: Cell<bool> = const { Cell::new(false) };
}

/// Snapshot read by the most recent cycle, if any cycle has run.
pub fn last_known() -> Option<Viewport> {
    LAST_KNOWN.with(|s| s.get())
}

/// Best available snapshot without running a cycle.
///
/// While the environment is watched the cached snapshot is current; otherwise
/// nothing has kept it fresh and the environment is read directly.
pub fn best_known() -> Viewport {
    match last_known() {
        Some(viewport) if registry::is_watching() => viewport,
        _ => reader::current_viewport(),
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Outcome of a dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Full cycles run (more than one if listeners requested a refresh).
    pub cycles: usize,
    /// Subscribers that were called.
    pub delivered: usize,
    /// Subscribers whose signature was unchanged.
    pub suppressed: usize,
    /// Subscribers that panicked.
    pub failures: Vec<ViewportError>,
    /// The request arrived mid-cycle and was folded into the running dispatch.
    pub deferred: bool,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct DispatchGuard;

impl DispatchGuard {
    fn enter() -> Option<Self> {
        DISPATCHING.with(|d| {
            if d.get() {
                None
            } else {
                d.set(true);
                Some(DispatchGuard)
            }
        })
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|d| d.set(false));
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Run a full dispatch cycle now.
pub fn dispatch() -> DispatchReport {
    let Some(_guard) = DispatchGuard::enter() else {
        RERUN.with(|r| r.set(true));
        return DispatchReport {
            deferred: true,
            ..Default::default()
        };
    };

    let mut report = DispatchReport::default();
    loop {
        RERUN.with(|r| r.set(false));
        run_cycle(&mut report);
        if !RERUN.with(|r| r.get()) {
            break;
        }
    }
    report
}

/// Resize notification entry point used by environments.
pub fn on_resize() {
    let report = dispatch();
    trace!(
        delivered = report.delivered,
        suppressed = report.suppressed,
        failed = report.failures.len(),
        "viewport resize dispatched"
    );
}

/// Offer the cached snapshot to a single subscriber.
///
/// Used when a consumer mounts while the watch is already running: it gets
/// the value everyone else has, without disturbing them.
pub fn dispatch_to(id: ListenerId) -> DispatchReport {
    let mut report = DispatchReport {
        cycles: 1,
        ..Default::default()
    };
    let snapshot = best_known();
    deliver(id, snapshot, &mut report);
    report
}

fn run_cycle(report: &mut DispatchReport) {
    let snapshot = reader::current_viewport();
    LAST_KNOWN.with(|s| s.set(Some(snapshot)));
    report.cycles += 1;

    let ids = registry::ids();
    trace!(
        width = snapshot.width,
        height = snapshot.height,
        subscribers = ids.len(),
        "viewport dispatch cycle"
    );

    for id in ids {
        deliver(id, snapshot, report);
    }
}

fn deliver(id: ListenerId, snapshot: Viewport, report: &mut DispatchReport) {
    // An earlier listener in this cycle may have unmounted this one
    let Some(entry) = registry::entry_view(id) else {
        return;
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let signature = entry.options.signature(snapshot);
        if entry.last_signature.as_ref() == Some(&signature) {
            return None;
        }
        (entry.listener)(&Delivery {
            viewport: snapshot,
            signature: signature.clone(),
        });
        Some(signature)
    }));

    match outcome {
        Ok(Some(signature)) => {
            registry::record_fired(id, signature);
            report.delivered += 1;
        }
        Ok(None) => report.suppressed += 1,
        Err(payload) => {
            let message = panic_message(&*payload);
            error!(listener = %id, %message, "viewport listener panicked");
            report.failures.push(ViewportError::ListenerPanicked(id, message));
        }
    }
}

/// Forget the cached snapshot (for testing).
pub fn reset_dispatcher() {
    LAST_KNOWN.with(|s| s.set(None));
    DISPATCHING.with(|d| d.set(false));
    RERUN.with(|r| r.set(false));
}

// =============================================================================
// TESTS
// =============================================================================
