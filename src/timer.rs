//! Cooperative Timers - one-shot timeouts driven by the event loop
//!
//! Timers never fire on their own. The event loop (see [`crate::runtime`])
//! calls [`run_due`] each turn and every expired timer runs then, in deadline
//! order. A timer scheduled while `run_due` is running waits for the next
//! turn even if its deadline has already passed, so firing is never
//! synchronous with scheduling.
//!
//! Time comes from a [`Clock`]. The default is the monotonic system clock;
//! tests install a [`ManualClock`] and step it.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use spark_viewport::timer;
//!
//! let handle = timer::set_timeout(Duration::from_millis(150), || {
//!     println!("quiet for 150ms");
//! });
//!
//! // Changed our mind
//! handle.cancel();
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::{Duration, Instant};

// =============================================================================
// CLOCK
// =============================================================================

/// Monotonic time source, measured from an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

thread_local! {
    static CLOCK: RefCell<Rc<dyn Clock>> = RefCell::new(Rc::new(SystemClock::new()));
}

/// Install the clock used by timers on this thread.
pub fn install_clock(clock: Rc<dyn Clock>) {
    CLOCK.with(|c| *c.borrow_mut() = clock);
}

/// Current time on this thread's clock.
pub fn now() -> Duration {
    CLOCK.with(|c| c.borrow().now())
}

// =============================================================================
// TIMER QUEUE
// =============================================================================

type TimerCallback = Box<dyn FnOnce()>;

struct TimerQueue {
    /// Keyed by (deadline, id) so iteration is deadline order, FIFO on ties
    timers: BTreeMap<(Duration, u64), TimerCallback>,
    deadlines: HashMap<u64, Duration>,
    next_id: u64,
}

impl TimerQueue {
    fn new() -> Self {
        Self {
            timers: BTreeMap::new(),
            deadlines: HashMap::new(),
            next_id: 0,
        }
    }

    fn insert(&mut self, deadline: Duration, callback: TimerCallback) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.timers.insert((deadline, id), callback);
        self.deadlines.insert(id, deadline);
        id
    }

    fn remove(&mut self, id: u64) -> Option<TimerCallback> {
        let deadline = self.deadlines.remove(&id)?;
        self.timers.remove(&(deadline, id))
    }

    /// Earliest timer that is due at `now` and was scheduled before `limit`.
    fn next_due(&self, now: Duration, limit: u64) -> Option<u64> {
        self.timers
            .range(..=(now, u64::MAX))
            .map(|((_, id), _)| *id)
            .find(|id| *id < limit)
    }
}

thread_local! {
    static QUEUE: RefCell<TimerQueue> = RefCell::new(TimerQueue::new());
}

/// Handle to a scheduled timeout.
///
/// Dropping the handle does not cancel the timer; call [`cancel`](Self::cancel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
}

impl TimerHandle {
    /// Cancel the timer. Safe to call after it fired or was already cancelled.
    pub fn cancel(&self) {
        // Drop the callback outside the borrow: it may own Rcs whose Drop
        // touches the queue again.
        let callback = QUEUE.with(|q| q.borrow_mut().remove(self.id));
        drop(callback);
    }

    /// Whether the timer is still waiting to fire.
    pub fn is_pending(&self) -> bool {
        QUEUE.with(|q| q.borrow().deadlines.contains_key(&self.id))
    }
}

/// Run `callback` once, no earlier than `delay` from now.
pub fn set_timeout<F>(delay: Duration, callback: F) -> TimerHandle
where
    F: FnOnce() + 'static,
{
    let deadline = now() + delay;
    let id = QUEUE.with(|q| q.borrow_mut().insert(deadline, Box::new(callback)));
    TimerHandle { id }
}

/// Fire every timer whose deadline has passed. Returns how many ran.
pub fn run_due() -> usize {
    let now = now();
    let limit = QUEUE.with(|q| q.borrow().next_id);
    let mut fired = 0;

    loop {
        let callback = QUEUE.with(|q| {
            let mut q = q.borrow_mut();
            let id = q.next_due(now, limit)?;
            q.remove(id)
        });

        match callback {
            Some(callback) => {
                callback();
                fired += 1;
            }
            None => break,
        }
    }

    fired
}

/// Deadline of the earliest pending timer.
pub fn next_deadline() -> Option<Duration> {
    QUEUE.with(|q| q.borrow().timers.keys().next().map(|(deadline, _)| *deadline))
}

/// Time until the earliest pending timer is due (zero if already due).
pub fn time_until_next() -> Option<Duration> {
    next_deadline().map(|deadline| deadline.saturating_sub(now()))
}

/// Number of pending timers.
pub fn pending_count() -> usize {
    QUEUE.with(|q| q.borrow().timers.len())
}

/// Drop all pending timers and restore the system clock (for testing).
pub fn reset_timers() {
    let drained = QUEUE.with(|q| std::mem::replace(&mut *q.borrow_mut(), TimerQueue::new()));
    drop(drained);
    install_clock(Rc::new(SystemClock::new()));
}

// =============================================================================
// TESTS
// =============================================================================
