//! Subscription Hook - `use_viewport_sizes`
//!
//! Connects one consumer to the shared registry for as long as the returned
//! [`ViewportSubscription`] lives. The consumer's rendered state is a
//! [`Signal<Viewport>`], so anything reading it inside an effect or derived
//! re-runs when a new value is committed.
//!
//! Deliveries from the dispatcher pass through the subscription's timing
//! policy before they are committed:
//!
//! - **none** - commit immediately
//! - **debounce** - restart a timer on every delivery; commit the last one
//!   once the viewport has been quiet for the full delay
//! - **throttle** - commit the first delivery immediately, then at most once
//!   per interval; a delivery inside the window schedules a single trailing
//!   commit of whatever arrived last
//! - **debounce + throttle** - debounce commits deliveries; a parallel
//!   throttle timer re-reads the viewport and commits early when the
//!   subscribed dimension moved
//!
//! # Example
//!
//! ```ignore
//! use spark_viewport::{use_viewport_sizes, Sizes, ViewportConfig, Dimension};
//! use spark_signals::effect;
//!
//! let sub = use_viewport_sizes(());
//! if let Sizes::Both(width, height, refresh) = sub.sizes() {
//!     println!("{width}x{height}");
//!     refresh.trigger();
//! }
//!
//! let columns = use_viewport_sizes(
//!     ViewportConfig::new().dimension(Dimension::Width).debounce_ms(150),
//! );
//! let stop = effect(move || {
//!     let _ = columns.viewport(); // re-runs on commit
//! });
//! ```

mod input;
mod timing;

pub use input::{ViewportConfig, ViewportInput};

use std::cell::Cell;
use std::rc::Rc;

use spark_signals::{signal, Signal};
use tracing::debug;

use crate::dispatcher::{self, DispatchReport};
use crate::reader;
use crate::registry::{self, Delivery, ListenerId, Listener, SubscriberOptions};
use crate::timer;
use crate::types::{Changed, Dimension, Signature, Viewport};
use timing::{Policy, Timing};

// =============================================================================
// RETURN VALUE
// =============================================================================

/// Manual refresh trigger returned with every [`Sizes`].
///
/// Runs one synchronous dispatch cycle for all subscribers, for when the
/// viewport changed without a resize notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Refresh;

impl Refresh {
    pub fn trigger(&self) -> DispatchReport {
        dispatcher::dispatch()
    }
}

/// Current value of a subscription, shaped by its dimension filter.
///
/// The refresh trigger is always the last element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizes {
    /// `[width, height, refresh]`
    Both(u32, u32, Refresh),
    /// `[width, refresh]`
    Width(u32, Refresh),
    /// `[height, refresh]`
    Height(u32, Refresh),
}

impl Sizes {
    fn from_viewport(viewport: Viewport, dimension: Dimension) -> Self {
        match dimension {
            Dimension::Both => Sizes::Both(viewport.width, viewport.height, Refresh),
            Dimension::Width => Sizes::Width(viewport.width, Refresh),
            Dimension::Height => Sizes::Height(viewport.height, Refresh),
        }
    }

    pub fn refresh(&self) -> Refresh {
        Refresh
    }

    /// Width, if this form carries it.
    pub fn width(&self) -> Option<u32> {
        match *self {
            Sizes::Both(width, _, _) | Sizes::Width(width, _) => Some(width),
            Sizes::Height(..) => None,
        }
    }

    /// Height, if this form carries it.
    pub fn height(&self) -> Option<u32> {
        match *self {
            Sizes::Both(_, height, _) | Sizes::Height(height, _) => Some(height),
            Sizes::Width(..) => None,
        }
    }
}

// =============================================================================
// SUBSCRIPTION STATE
// =============================================================================

struct HookState {
    id: Cell<Option<ListenerId>>,
    options: SubscriberOptions,
    state: Signal<Viewport>,
    signature: Signal<Option<Signature>>,
    timing: Timing,
}

impl HookState {
    fn commit(&self, viewport: Viewport, signature: &Signature) {
        self.state.set(viewport);
        if signature.is_custom() {
            self.signature.set(Some(signature.clone()));
        }
    }

    fn receive(this: &Rc<Self>, delivery: &Delivery) {
        match this.timing.policy() {
            Policy::Immediate => this.commit(delivery.viewport, &delivery.signature),
            Policy::Debounce => Self::debounce(this, delivery.clone()),
            Policy::Throttle => Self::throttle(this, delivery.clone()),
            Policy::DebounceAndThrottle => {
                Self::debounce(this, delivery.clone());
                Self::parallel_throttle(this);
            }
        }
    }

    fn debounce(this: &Rc<Self>, delivery: Delivery) {
        let weak = Rc::downgrade(this);
        let handle = timer::set_timeout(this.timing.debounce, move || {
            if let Some(this) = weak.upgrade() {
                this.timing.debounce_fired();
                this.commit(delivery.viewport, &delivery.signature);
            }
        });
        this.timing.restart_debounce(handle);
    }

    fn throttle(this: &Rc<Self>, delivery: Delivery) {
        let timing = &this.timing;

        // A trailing commit is already scheduled; it will take the newest value
        if timing.throttle_pending() {
            timing.stash(delivery);
            return;
        }

        let remaining = timing.throttle_remaining();
        if remaining.is_zero() {
            timing.mark_throttled_now();
            this.commit(delivery.viewport, &delivery.signature);
            return;
        }

        timing.stash(delivery);
        let weak = Rc::downgrade(this);
        let handle = timer::set_timeout(remaining, move || {
            if let Some(this) = weak.upgrade() {
                this.timing.throttle_fired();
                if let Some(latest) = this.timing.take_stashed() {
                    this.commit(latest.viewport, &latest.signature);
                }
            }
        });
        timing.set_throttle_timer(handle);
    }

    fn parallel_throttle(this: &Rc<Self>) {
        if this.timing.throttle_pending() {
            return;
        }

        let weak = Rc::downgrade(this);
        let handle = timer::set_timeout(this.timing.throttle_remaining(), move || {
            let Some(this) = weak.upgrade() else {
                return;
            };
            this.timing.throttle_fired();

            let live = reader::current_viewport();
            let committed = this.state.get();
            if Changed::between(committed, live).affects(this.options.dimension) {
                let signature = this.options.signature(live);
                this.commit(live, &signature);
            }
        });
        this.timing.set_throttle_timer(handle);
    }

    fn teardown(&self) {
        self.timing.cancel_all();
        if let Some(id) = self.id.take() {
            registry::unregister(id);
            debug!(listener = %id, "viewport subscription unmounted");
        }
    }
}

// =============================================================================
// SUBSCRIPTION HANDLE
// =============================================================================

/// A mounted viewport consumer.
///
/// Dropping it (or calling [`unmount`](Self::unmount)) cancels pending
/// timers and removes it from the registry.
pub struct ViewportSubscription {
    inner: Rc<HookState>,
}

impl ViewportSubscription {
    /// Current committed value in the shape selected by the dimension filter.
    pub fn sizes(&self) -> Sizes {
        Sizes::from_viewport(self.inner.state.get(), self.inner.options.dimension)
    }

    /// Current committed snapshot (both axes regardless of filter).
    pub fn viewport(&self) -> Viewport {
        self.inner.state.get()
    }

    /// The committed-state signal, for reactive tracking.
    pub fn signal(&self) -> Signal<Viewport> {
        self.inner.state.clone()
    }

    /// Last committed hasher output; `None` without a hasher.
    pub fn signature(&self) -> Option<Signature> {
        self.inner.signature.get()
    }

    pub fn signature_signal(&self) -> Signal<Option<Signature>> {
        self.inner.signature.clone()
    }

    pub fn dimension(&self) -> Dimension {
        self.inner.options.dimension
    }

    /// Registry token; `None` once unmounted.
    pub fn id(&self) -> Option<ListenerId> {
        self.inner.id.get()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.id.get().is_some()
    }

    /// Whether a debounce or throttle commit is waiting to fire.
    pub fn has_pending_commit(&self) -> bool {
        self.inner.timing.has_pending_timers()
    }

    /// Run a dispatch cycle now.
    pub fn refresh(&self) -> DispatchReport {
        dispatcher::dispatch()
    }

    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for ViewportSubscription {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

// =============================================================================
// HOOK
// =============================================================================

/// Mount a viewport consumer.
///
/// Accepts `()`, a throttle interval (integer milliseconds or `Duration`),
/// a [`ViewportInput::hasher`], or a [`ViewportConfig`]. The initial value is
/// read synchronously, so it is already live before the first dispatch.
pub fn use_viewport_sizes(input: impl Into<ViewportInput>) -> ViewportSubscription {
    let options = input.into().resolve();
    let initial = dispatcher::best_known();
    let initial_signature = options.hasher.as_ref().map(|hasher| hasher.call(&initial));

    let inner = Rc::new(HookState {
        id: Cell::new(None),
        timing: Timing::new(&options),
        options: options.clone(),
        state: signal(initial),
        signature: signal(initial_signature),
    });

    let weak = Rc::downgrade(&inner);
    let listener: Listener = Rc::new(move |delivery: &Delivery| {
        if let Some(state) = weak.upgrade() {
            HookState::receive(&state, delivery);
        }
    });

    let registration = registry::register(options, listener);
    inner.id.set(Some(registration.id));
    debug!(
        listener = %registration.id,
        dimension = %inner.options.dimension,
        "viewport subscription mounted"
    );

    let subscription = ViewportSubscription { inner };
    if registration.started {
        dispatcher::dispatch();
    } else {
        dispatcher::dispatch_to(registration.id);
    }
    subscription
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{install, ManualEnvironment};
    use crate::runtime::reset_viewport_state;
    use crate::timer::{install_clock, ManualClock};
    use spark_signals::effect;
    use std::time::Duration;

    fn setup(width: u32, height: u32) -> (Rc<ManualEnvironment>, Rc<ManualClock>) {
        reset_viewport_state();
        let env = Rc::new(ManualEnvironment::new(width, height));
        install(env.clone());
        let clock = Rc::new(ManualClock::new());
        install_clock(clock.clone());
        (env, clock)
    }

    /// Advance one millisecond at a time, running timers each turn.
    fn step(clock: &ManualClock, ms: u64) {
        for _ in 0..ms {
            clock.advance(Duration::from_millis(1));
            timer::run_due();
        }
    }

    fn breakpoint(vp: &Viewport) -> &'static str {
        match vp.width {
            0..=320 => "sm",
            321..=640 => "md",
            _ => "lg",
        }
    }

    #[test]
    fn test_default_reports_both() {
        let (env, _clock) = setup(640, 480);
        let sub = use_viewport_sizes(());
        assert_eq!(sub.sizes(), Sizes::Both(640, 480, Refresh));

        env.resize(50, 100);
        assert_eq!(sub.sizes(), Sizes::Both(50, 100, Refresh));
    }

    #[test]
    fn test_width_dimension() {
        let (env, _clock) = setup(640, 480);
        let sub = use_viewport_sizes(Dimension::Width);
        assert_eq!(sub.sizes(), Sizes::Width(640, Refresh));

        env.resize(44, 80);
        assert_eq!(sub.sizes(), Sizes::Width(44, Refresh));
    }

    #[test]
    fn test_height_dimension() {
        let (env, _clock) = setup(640, 480);
        let sub = use_viewport_sizes(ViewportConfig::new().dimension(Dimension::Height));
        assert_eq!(sub.sizes(), Sizes::Height(480, Refresh));

        env.resize(44, 80);
        assert_eq!(sub.sizes(), Sizes::Height(80, Refresh));
    }

    #[test]
    fn test_width_consumer_ignores_height_changes() {
        let (env, _clock) = setup(640, 480);
        let sub = use_viewport_sizes(Dimension::Width);

        let renders = Rc::new(Cell::new(0));
        let renders_clone = renders.clone();
        let state = sub.signal();
        let _effect = effect(move || {
            let _ = state.get();
            renders_clone.set(renders_clone.get() + 1);
        });
        assert_eq!(renders.get(), 1);

        env.resize(640, 100);
        env.resize(640, 900);
        assert_eq!(renders.get(), 1);
        // Committed state still carries the height seen at the last delivery
        assert_eq!(sub.viewport(), Viewport::new(640, 480));

        env.resize(641, 900);
        assert_eq!(renders.get(), 2);
        assert_eq!(sub.sizes(), Sizes::Width(641, Refresh));
    }

    #[test]
    fn test_breakpoint_hasher_suppresses_same_bucket() {
        let (env, _clock) = setup(640, 480);
        let sub = use_viewport_sizes(ViewportInput::hasher(breakpoint));
        assert_eq!(sub.signature(), Some(Signature::custom("md")));

        env.resize(639, 480);
        assert_eq!(sub.viewport().width, 640);

        env.resize(645, 480);
        assert_eq!(sub.viewport().width, 645);
        assert_eq!(sub.signature(), Some(Signature::custom("lg")));

        env.resize(700, 480);
        assert_eq!(sub.viewport().width, 645);
    }

    #[test]
    fn test_second_mount_sees_current_value() {
        let (env, _clock) = setup(640, 480);
        let first = use_viewport_sizes(());
        env.resize(300, 200);

        let second = use_viewport_sizes(Dimension::Height);
        assert_eq!(second.sizes(), Sizes::Height(200, Refresh));
        assert_eq!(first.sizes(), Sizes::Both(300, 200, Refresh));
        assert_eq!(env.attach_count(), 1);
    }

    #[test]
    fn test_manual_refresh_picks_up_silent_change() {
        let (env, _clock) = setup(640, 480);
        let sub = use_viewport_sizes(());

        env.set_silently(480, 640);
        assert_eq!(sub.sizes(), Sizes::Both(640, 480, Refresh));

        let report = sub.sizes().refresh().trigger();
        assert_eq!(report.delivered, 1);
        assert_eq!(sub.sizes(), Sizes::Both(480, 640, Refresh));
    }

    #[test]
    fn test_unmount_detaches_watch() {
        let (env, _clock) = setup(640, 480);
        let a = use_viewport_sizes(());
        let b = use_viewport_sizes(Dimension::Width);
        assert_eq!(registry::len(), 2);

        drop(a);
        assert_eq!(registry::len(), 1);
        assert!(env.is_attached());

        b.unmount();
        assert_eq!(registry::len(), 0);
        assert!(!env.is_attached());
    }

    #[test]
    fn test_debounce_commits_last_value_once() {
        let (env, clock) = setup(640, 480);
        let sub = use_viewport_sizes(ViewportConfig::new().debounce_ms(100));
        step(&clock, 150);

        let commits = Rc::new(Cell::new(0));
        let commits_clone = commits.clone();
        let state = sub.signal();
        let _effect = effect(move || {
            let _ = state.get();
            commits_clone.set(commits_clone.get() + 1);
        });
        let baseline = commits.get();

        env.resize(600, 480);
        step(&clock, 30);
        env.resize(550, 480);
        step(&clock, 30);
        env.resize(500, 480);

        step(&clock, 99);
        assert_eq!(sub.viewport(), Viewport::new(640, 480));
        assert!(sub.has_pending_commit());

        step(&clock, 1);
        assert_eq!(sub.viewport(), Viewport::new(500, 480));
        assert_eq!(commits.get(), baseline + 1);
        assert!(!sub.has_pending_commit());
    }

    #[test]
    fn test_throttle_leading_and_trailing() {
        let (env, clock) = setup(640, 480);
        let sub = use_viewport_sizes(100);

        step(&clock, 10);
        env.resize(600, 480);
        step(&clock, 10);
        env.resize(550, 480);
        step(&clock, 30);
        env.resize(500, 480);

        // Window opened by the mount commit at t=0
        step(&clock, 49);
        assert_eq!(sub.viewport(), Viewport::new(640, 480));
        step(&clock, 1);
        assert_eq!(sub.viewport(), Viewport::new(500, 480));

        // t=150: inside the window opened at t=100
        step(&clock, 50);
        env.resize(450, 480);
        step(&clock, 49);
        assert_eq!(sub.viewport(), Viewport::new(500, 480));
        step(&clock, 1);
        assert_eq!(sub.viewport(), Viewport::new(450, 480));

        // Quiet long enough: next delivery commits immediately
        step(&clock, 300);
        env.resize(300, 480);
        assert_eq!(sub.viewport(), Viewport::new(300, 480));
    }

    #[test]
    fn test_debounce_with_parallel_throttle() {
        let (env, clock) = setup(640, 480);
        let sub = use_viewport_sizes(ViewportConfig::new().debounce_ms(100).throttle_ms(50));

        step(&clock, 10);
        env.resize(600, 480);

        // The mount opened a throttle window at t=1; the throttle re-reads
        // the viewport when it closes at t=51, well before the debounce
        step(&clock, 39);
        assert_eq!(sub.viewport(), Viewport::new(640, 480));
        step(&clock, 2);
        assert_eq!(sub.viewport(), Viewport::new(600, 480));

        step(&clock, 10);
        env.resize(500, 480);
        step(&clock, 40);
        assert_eq!(sub.viewport(), Viewport::new(500, 480));

        // Debounce lands on the same value
        step(&clock, 100);
        assert_eq!(sub.viewport(), Viewport::new(500, 480));
        assert!(!sub.has_pending_commit());
    }

    #[test]
    fn test_unmount_cancels_pending_commit() {
        let (env, clock) = setup(640, 480);
        let sub = use_viewport_sizes(ViewportConfig::new().debounce_ms(100));
        let state = sub.signal();

        env.resize(10, 10);
        assert!(timer::pending_count() > 0);

        sub.unmount();
        assert_eq!(timer::pending_count(), 0);

        step(&clock, 200);
        assert_eq!(state.get(), Viewport::new(640, 480));
    }

    #[test]
    fn test_unmount_cancels_pending_throttle() {
        let (env, clock) = setup(640, 480);
        let sub = use_viewport_sizes(ViewportConfig::new().throttle_ms(100));
        let state = sub.signal();

        // Inside the window opened by the mount commit
        step(&clock, 10);
        env.resize(10, 10);
        assert!(sub.has_pending_commit());

        sub.unmount();
        assert_eq!(timer::pending_count(), 0);

        step(&clock, 200);
        assert_eq!(state.get(), Viewport::new(640, 480));
    }

    #[test]
    fn test_unmount_cancels_debounce_and_parallel_throttle() {
        let (env, clock) = setup(640, 480);
        let sub = use_viewport_sizes(ViewportConfig::new().debounce_ms(100).throttle_ms(50));
        let state = sub.signal();

        step(&clock, 10);
        env.resize(10, 10);
        assert!(timer::pending_count() >= 2);

        sub.unmount();
        assert_eq!(timer::pending_count(), 0);

        step(&clock, 200);
        assert_eq!(state.get(), Viewport::new(640, 480));
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_thread_exit_with_live_subscription() {
        let (_env, _clock) = setup(640, 480);
        std::mem::forget(use_viewport_sizes(()));
        assert!(logs_contain("viewport subscription mounted"));
        // The registry is torn down by the thread-local destructor
    }

    #[test]
    fn test_headless_mount_reports_zero() {
        reset_viewport_state();
        install(Rc::new(crate::environment::HeadlessEnvironment));
        let sub = use_viewport_sizes(());
        assert_eq!(sub.sizes(), Sizes::Both(0, 0, Refresh));
    }

    #[test]
    fn test_sizes_accessors() {
        let both = Sizes::Both(3, 4, Refresh);
        assert_eq!((both.width(), both.height()), (Some(3), Some(4)));
        assert_eq!(Sizes::Width(3, Refresh).height(), None);
        assert_eq!(Sizes::Height(4, Refresh).width(), None);
    }
}
