// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared frame clock.
//!
//! [`FrameClock`] multiplexes one platform frame callback (a [`FrameSource`],
//! e.g. `requestAnimationFrame`) into any number of ordered subscriber
//! callbacks. Each subscriber receives a [`FrameTime`] carrying the clamped
//! frame delta and the accumulated elapsed time.
//!
//! The clock is an explicit service object: construct it once at startup and
//! hand clones to every consumer. Clones share the same subscriber table and
//! running state.
//!
//! # Running state
//!
//! The loop runs only while all of these hold:
//!
//! - at least one subscriber is registered and not paused,
//! - the [`MotionPreference`] does not report reduced motion,
//! - [`pause_all`](FrameClock::pause_all) is not in effect,
//! - the document is [`Visibility::Visible`].
//!
//! Each input change is a discrete event that re-resolves [`ClockState`]. The
//! platform source is started on entry to [`ClockState::Running`] and stopped
//! on exit, so the clock never consumes frames while idle.
//!
//! # Ordering and faults
//!
//! Subscribers fire in registration order, once per tick. A tick works on a
//! snapshot of the table taken when it begins: removing or pausing a
//! subscriber mid-tick takes effect from the next tick, and subscribers added
//! mid-tick first fire on the next tick.
//!
//! A subscriber registered with [`FrameClock::subscribe_fallible`] reports
//! failure by returning `Err`; the error is logged and the remaining
//! subscribers and all later ticks are unaffected. This works on every
//! target, including `wasm32-unknown-unknown` where panics abort. On targets
//! that unwind, a panicking subscriber is isolated the same way.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::listener::ListenerId;
use crate::motion::MotionPreference;
use crate::time::{Duration, HostTime};

/// Upper bound on the delta delivered to subscribers.
///
/// Large gaps (a backgrounded tab, a debugger pause) are clamped so animated
/// values do not jump.
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(100);

/// A platform mechanism that delivers one callback per display frame.
///
/// Implementations call [`FrameTicker::tick`] on each frame between
/// [`start`](Self::start) and [`stop`](Self::stop). Only the owning
/// [`FrameClock`] calls `start` and `stop`, and it never calls either twice
/// in a row.
pub trait FrameSource {
    /// Begins requesting frames.
    fn start(&mut self);
    /// Cancels any pending frame request.
    fn stop(&mut self);
    /// Reads the current host time from the same clock as frame timestamps.
    fn now(&self) -> HostTime;
}

/// Identifies a subscriber in a [`FrameClock`].
///
/// Ids are assigned monotonically and never reused by the same clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub u64);

/// Timing information passed to every subscriber on a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameTime {
    /// Time since the previous tick, clamped to [`MAX_FRAME_DELTA`].
    pub delta: Duration,
    /// Sum of all deltas delivered so far. Monotonic.
    pub elapsed: Duration,
    /// Counter of ticks delivered by this clock.
    pub frame_index: u64,
}

impl FrameTime {
    /// Frame delta in seconds.
    #[must_use]
    pub fn delta_secs(&self) -> f64 {
        self.delta.as_secs_f64()
    }

    /// Elapsed time in seconds.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Document visibility as reported by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// The page is on screen.
    #[default]
    Visible,
    /// The page is hidden (background tab, minimized window).
    Hidden,
}

/// Resolved state of the frame loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClockState {
    /// Frames are being requested and delivered to subscribers.
    Running,
    /// Subscribers are waiting, but the document is hidden.
    PausedByVisibility,
    /// No active, unpaused subscriber exists.
    PausedByEmptyTable,
    /// Motion is reduced or every subscriber was paused with
    /// [`FrameClock::pause_all`].
    Stopped,
}

/// Discrete inputs that can move the clock between states.
#[derive(Clone, Copy, Debug)]
enum ClockEvent {
    Created,
    SubscriberAdded,
    SubscriberRemoved,
    SubscriberPaused,
    SubscriberResumed,
    VisibilityChanged(Visibility),
    MotionChanged,
    PauseAll,
    ResumeAll,
}

#[derive(Clone, Copy, Debug)]
struct ClockInputs {
    motion_reduced: bool,
    globally_paused: bool,
    visibility: Visibility,
    active: usize,
}

impl ClockInputs {
    fn resolve(self) -> ClockState {
        if self.motion_reduced || self.globally_paused {
            ClockState::Stopped
        } else if self.visibility == Visibility::Hidden {
            ClockState::PausedByVisibility
        } else if self.active == 0 {
            ClockState::PausedByEmptyTable
        } else {
            ClockState::Running
        }
    }
}

/// Error a fallible subscriber returns to report a failed frame.
pub type SubscriberError = Box<dyn core::error::Error>;

type TickCallback = Rc<RefCell<dyn FnMut(FrameTime) -> Result<(), SubscriberError>>>;

struct Entry {
    callback: TickCallback,
    paused: bool,
}

struct ClockInner {
    entries: RefCell<BTreeMap<SubscriberId, Entry>>,
    next_id: Cell<u64>,
    source: RefCell<Box<dyn FrameSource>>,
    motion: MotionPreference,
    motion_listener: Cell<Option<ListenerId>>,
    state: Cell<ClockState>,
    visibility: Cell<Visibility>,
    globally_paused: Cell<bool>,
    last_timestamp: Cell<Option<HostTime>>,
    elapsed: Cell<Duration>,
    frame_index: Cell<u64>,
    ticking: Cell<bool>,
}

impl ClockInner {
    fn inputs(&self) -> ClockInputs {
        ClockInputs {
            motion_reduced: self.motion.is_reduced(),
            globally_paused: self.globally_paused.get(),
            visibility: self.visibility.get(),
            active: self.entries.borrow().values().filter(|e| !e.paused).count(),
        }
    }

    fn reconcile(&self, event: ClockEvent) {
        match event {
            ClockEvent::VisibilityChanged(visibility) => self.visibility.set(visibility),
            ClockEvent::PauseAll => self.globally_paused.set(true),
            ClockEvent::ResumeAll => self.globally_paused.set(false),
            _ => {}
        }

        let next = self.inputs().resolve();
        let prev = self.state.replace(next);
        if prev == next {
            return;
        }
        tracing::debug!(?prev, ?next, ?event, "frame clock state change");

        if next == ClockState::Running {
            // Re-anchor so the first delta after a pause measures one frame,
            // not the whole pause.
            let now = self.source.borrow().now();
            self.last_timestamp.set(Some(now));
            self.source.borrow_mut().start();
        } else if prev == ClockState::Running {
            self.source.borrow_mut().stop();
        }
    }

    fn tick(&self, now: HostTime) {
        if self.state.get() != ClockState::Running || self.ticking.replace(true) {
            return;
        }

        let delta = self
            .last_timestamp
            .get()
            .map_or(Duration::ZERO, |prev| now.saturating_duration_since(prev))
            .min(MAX_FRAME_DELTA);
        self.last_timestamp.set(Some(now));
        let elapsed = self.elapsed.get().saturating_add(delta);
        self.elapsed.set(elapsed);
        let frame_index = self.frame_index.get();
        self.frame_index.set(frame_index + 1);

        let time = FrameTime {
            delta,
            elapsed,
            frame_index,
        };

        // Snapshot so callbacks can freely subscribe, unsubscribe and pause.
        let batch: Vec<(SubscriberId, TickCallback)> = self
            .entries
            .borrow()
            .iter()
            .filter(|(_, entry)| !entry.paused)
            .map(|(id, entry)| (*id, Rc::clone(&entry.callback)))
            .collect();

        for (id, callback) in batch {
            let Ok(mut callback) = callback.try_borrow_mut() else {
                continue;
            };
            match panic::catch_unwind(AssertUnwindSafe(|| (&mut *callback)(time))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(
                        subscriber = id.0,
                        frame = frame_index,
                        error = %err,
                        "frame subscriber failed; continuing with remaining subscribers"
                    );
                }
                Err(payload) => {
                    tracing::error!(
                        subscriber = id.0,
                        frame = frame_index,
                        panic = panic_message(payload.as_ref()),
                        "frame subscriber panicked; continuing with remaining subscribers"
                    );
                }
            }
        }

        self.ticking.set(false);
    }

    fn set_paused(&self, id: SubscriberId, paused: bool) {
        let changed = match self.entries.borrow_mut().get_mut(&id) {
            Some(entry) if entry.paused != paused => {
                entry.paused = paused;
                true
            }
            _ => false,
        };
        if changed {
            self.reconcile(if paused {
                ClockEvent::SubscriberPaused
            } else {
                ClockEvent::SubscriberResumed
            });
        }
    }

    fn is_paused(&self, id: SubscriberId) -> Option<bool> {
        self.entries.borrow().get(&id).map(|entry| entry.paused)
    }

    fn unsubscribe(&self, id: SubscriberId) {
        let removed = self.entries.borrow_mut().remove(&id);
        if removed.is_some() {
            self.reconcile(ClockEvent::SubscriberRemoved);
        }
    }
}

impl Drop for ClockInner {
    fn drop(&mut self) {
        if let Some(id) = self.motion_listener.take() {
            self.motion.remove_listener(id);
        }
        if self.state.get() == ClockState::Running {
            self.source.get_mut().stop();
        }
    }
}

fn panic_message(payload: &(dyn core::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// The shared per-frame callback multiplexer.
///
/// Cloning is cheap and yields another handle to the same clock.
#[derive(Clone)]
pub struct FrameClock {
    inner: Rc<ClockInner>,
}

impl FrameClock {
    /// Creates a clock driven by the source that `make_source` builds.
    ///
    /// The factory receives the [`FrameTicker`] the source must call on each
    /// frame. The clock starts in [`ClockState::PausedByEmptyTable`] (or
    /// [`ClockState::Stopped`] if motion is already reduced).
    pub fn new<S, F>(motion: &MotionPreference, make_source: F) -> Self
    where
        S: FrameSource + 'static,
        F: FnOnce(FrameTicker) -> S,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<ClockInner>| {
            let source: Box<dyn FrameSource> = Box::new(make_source(FrameTicker {
                inner: weak.clone(),
            }));
            ClockInner {
                entries: RefCell::new(BTreeMap::new()),
                next_id: Cell::new(0),
                source: RefCell::new(source),
                motion: motion.clone(),
                motion_listener: Cell::new(None),
                state: Cell::new(ClockState::PausedByEmptyTable),
                visibility: Cell::new(Visibility::Visible),
                globally_paused: Cell::new(false),
                last_timestamp: Cell::new(None),
                elapsed: Cell::new(Duration::ZERO),
                frame_index: Cell::new(0),
                ticking: Cell::new(false),
            }
        });

        let weak = Rc::downgrade(&inner);
        let listener = motion.on_change(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.reconcile(ClockEvent::MotionChanged);
            }
        });
        inner.motion_listener.set(Some(listener));
        inner.reconcile(ClockEvent::Created);

        Self { inner }
    }

    /// Registers `callback` to run on every tick, starting the loop if needed.
    pub fn subscribe(&self, callback: impl FnMut(FrameTime) + 'static) -> Subscription {
        self.subscribe_with(callback, true)
    }

    /// Registers `callback`; a disabled subscription starts paused and does
    /// not start the loop until resumed.
    pub fn subscribe_with(
        &self,
        mut callback: impl FnMut(FrameTime) + 'static,
        enabled: bool,
    ) -> Subscription {
        self.insert(
            Rc::new(RefCell::new(move |time: FrameTime| -> Result<(), SubscriberError> {
                callback(time);
                Ok(())
            })),
            enabled,
        )
    }

    /// Registers a callback that reports failure through its return value.
    ///
    /// An `Err` is logged with the subscriber id and frame index; the
    /// subscriber stays registered and runs again on the next tick.
    pub fn subscribe_fallible(
        &self,
        callback: impl FnMut(FrameTime) -> Result<(), SubscriberError> + 'static,
    ) -> Subscription {
        self.insert(Rc::new(RefCell::new(callback)), true)
    }

    fn insert(&self, callback: TickCallback, enabled: bool) -> Subscription {
        let id = SubscriberId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);

        self.inner.entries.borrow_mut().insert(
            id,
            Entry {
                callback,
                paused: !enabled,
            },
        );
        self.inner.reconcile(ClockEvent::SubscriberAdded);

        Subscription {
            handle: SubscriberHandle {
                id,
                clock: Rc::downgrade(&self.inner),
            },
        }
    }

    /// Removes a subscriber. Unknown or already-removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.unsubscribe(id);
    }

    /// Stops the loop regardless of subscribers until
    /// [`resume_all`](Self::resume_all).
    pub fn pause_all(&self) {
        self.inner.reconcile(ClockEvent::PauseAll);
    }

    /// Lifts a previous [`pause_all`](Self::pause_all).
    pub fn resume_all(&self) {
        self.inner.reconcile(ClockEvent::ResumeAll);
    }

    /// Applies a document visibility change from the host.
    pub fn set_visibility(&self, visibility: Visibility) {
        self.inner.reconcile(ClockEvent::VisibilityChanged(visibility));
    }

    /// Returns a ticker for delivering frames to this clock.
    #[must_use]
    pub fn ticker(&self) -> FrameTicker {
        FrameTicker {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns the resolved loop state.
    #[must_use]
    pub fn state(&self) -> ClockState {
        self.inner.state.get()
    }

    /// Returns `true` if the loop is requesting frames.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == ClockState::Running
    }

    /// Number of registered subscribers, paused or not.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    /// Number of registered subscribers that are not paused.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.inputs().active
    }

    /// Total time delivered to subscribers so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.inner.elapsed.get()
    }

    /// The motion preference gating this clock.
    #[must_use]
    pub fn motion(&self) -> &MotionPreference {
        &self.inner.motion
    }
}

impl core::fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameClock")
            .field("state", &self.inner.state.get())
            .field("subscribers", &self.inner.entries.borrow().len())
            .field("elapsed", &self.inner.elapsed.get())
            .field("frame_index", &self.inner.frame_index.get())
            .finish()
    }
}

/// Non-owning handle used by a [`FrameSource`] to deliver frames.
#[derive(Clone)]
pub struct FrameTicker {
    inner: Weak<ClockInner>,
}

impl FrameTicker {
    /// Runs one tick at host time `now`.
    ///
    /// Ignored if the clock is gone, not running, or already mid-tick.
    pub fn tick(&self, now: HostTime) {
        if let Some(inner) = self.inner.upgrade() {
            inner.tick(now);
        }
    }
}

impl core::fmt::Debug for FrameTicker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameTicker")
            .field("attached", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Clonable, non-owning control for one subscriber.
///
/// Every method is idempotent and becomes a no-op once the subscriber is
/// removed or the clock is dropped.
#[derive(Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    clock: Weak<ClockInner>,
}

impl SubscriberHandle {
    /// The subscriber's id.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Skips this subscriber on subsequent ticks.
    pub fn pause(&self) {
        if let Some(inner) = self.clock.upgrade() {
            inner.set_paused(self.id, true);
        }
    }

    /// Re-enables this subscriber.
    pub fn resume(&self) {
        if let Some(inner) = self.clock.upgrade() {
            inner.set_paused(self.id, false);
        }
    }

    /// Returns `true` if the subscriber is paused or no longer registered.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.clock
            .upgrade()
            .and_then(|inner| inner.is_paused(self.id))
            .unwrap_or(true)
    }

    /// Returns `true` while the subscriber is still registered.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.clock
            .upgrade()
            .is_some_and(|inner| inner.is_paused(self.id).is_some())
    }

    /// Removes the subscriber.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.clock.upgrade() {
            inner.unsubscribe(self.id);
        }
    }
}

impl core::fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

/// Owning registration returned by [`FrameClock::subscribe`].
///
/// Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
#[derive(Debug)]
pub struct Subscription {
    handle: SubscriberHandle,
}

impl Subscription {
    /// The subscriber's id.
    pub fn id(&self) -> SubscriberId {
        self.handle.id
    }

    /// Returns a non-owning handle to this subscriber.
    pub fn handle(&self) -> SubscriberHandle {
        self.handle.clone()
    }

    /// See [`SubscriberHandle::pause`].
    pub fn pause(&self) {
        self.handle.pause();
    }

    /// See [`SubscriberHandle::resume`].
    pub fn resume(&self) {
        self.handle.resume();
    }

    /// See [`SubscriberHandle::is_paused`].
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.handle.is_paused()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.unsubscribe();
    }
}

/// A [`FrameSource`] driven explicitly by the host.
///
/// Useful for tests and for embedding the clock in an existing loop. Clone
/// the `ManualFrames` controller before handing [`source`](Self::source) to
/// [`FrameClock::new`], then call [`advance`](Self::advance) to deliver
/// frames.
///
/// ```rust
/// use tempo_core::clock::{FrameClock, ManualFrames};
/// use tempo_core::motion::MotionPreference;
/// use tempo_core::time::Duration;
///
/// let frames = ManualFrames::new();
/// let clock = FrameClock::new(&MotionPreference::constant(false), frames.source());
/// let _sub = clock.subscribe(|time| assert!(time.delta_secs() <= 0.1));
/// assert!(frames.is_requested());
/// assert!(frames.advance(Duration::from_millis(16)));
/// ```
#[derive(Clone, Default)]
pub struct ManualFrames {
    shared: Rc<ManualShared>,
}

#[derive(Default)]
struct ManualShared {
    now: Cell<HostTime>,
    requested: Cell<bool>,
    ticker: RefCell<Option<FrameTicker>>,
}

impl ManualFrames {
    /// Creates a controller whose host time starts at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the source factory to pass to [`FrameClock::new`].
    pub fn source(&self) -> impl FnOnce(FrameTicker) -> ManualFrameSource + 'static {
        let shared = Rc::clone(&self.shared);
        move |ticker| {
            *shared.ticker.borrow_mut() = Some(ticker);
            ManualFrameSource { shared }
        }
    }

    /// Current host time.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.shared.now.get()
    }

    /// Returns `true` while the clock has frames requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.shared.requested.get()
    }

    /// Moves host time forward by `by` and delivers a frame if one is
    /// requested. Returns whether a frame was delivered.
    pub fn advance(&self, by: Duration) -> bool {
        let now = self.shared.now.get().saturating_add(by);
        self.shared.now.set(now);
        if !self.shared.requested.get() {
            return false;
        }
        let ticker = self.shared.ticker.borrow().clone();
        if let Some(ticker) = ticker {
            ticker.tick(now);
        }
        true
    }

    /// Delivers `count` frames spaced `interval` apart.
    pub fn run(&self, count: usize, interval: Duration) {
        for _ in 0..count {
            self.advance(interval);
        }
    }
}

impl core::fmt::Debug for ManualFrames {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ManualFrames")
            .field("now", &self.shared.now.get())
            .field("requested", &self.shared.requested.get())
            .finish()
    }
}

/// The [`FrameSource`] half of [`ManualFrames`].
pub struct ManualFrameSource {
    shared: Rc<ManualShared>,
}

impl FrameSource for ManualFrameSource {
    fn start(&mut self) {
        self.shared.requested.set(true);
    }

    fn stop(&mut self) {
        self.shared.requested.set(false);
    }

    fn now(&self) -> HostTime {
        self.shared.now.get()
    }
}

impl core::fmt::Debug for ManualFrameSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ManualFrameSource")
            .field("requested", &self.shared.requested.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MotionWriter;

    const FRAME: Duration = Duration::from_millis(16);

    fn setup() -> (FrameClock, ManualFrames, MotionWriter) {
        let (motion, writer) = MotionPreference::new(false);
        let frames = ManualFrames::new();
        let clock = FrameClock::new(&motion, frames.source());
        (clock, frames, writer)
    }

    fn recorder(
        log: &Rc<RefCell<Vec<&'static str>>>,
        name: &'static str,
    ) -> impl FnMut(FrameTime) + 'static {
        let log = Rc::clone(log);
        move |_| log.borrow_mut().push(name)
    }

    #[test]
    fn subscribers_fire_in_registration_order() {
        let (clock, frames, _writer) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let _a = clock.subscribe(recorder(&log, "A"));
        let _b = clock.subscribe(recorder(&log, "B"));
        let _c = clock.subscribe(recorder(&log, "C"));

        frames.run(2, FRAME);
        assert_eq!(*log.borrow(), ["A", "B", "C", "A", "B", "C"]);
    }

    #[test]
    fn panicking_subscriber_is_isolated() {
        let (clock, frames, _writer) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let _a = clock.subscribe(recorder(&log, "A"));
        let b_log = Rc::clone(&log);
        let _b = clock.subscribe(move |_| {
            b_log.borrow_mut().push("B");
            panic!("subscriber B always fails");
        });
        let _c = clock.subscribe(recorder(&log, "C"));

        frames.run(3, FRAME);
        assert_eq!(*log.borrow(), ["A", "B", "C", "A", "B", "C", "A", "B", "C"]);
        assert!(clock.is_running(), "a faulting subscriber must not stop the loop");
    }

    #[test]
    fn failing_subscriber_is_isolated() {
        let (clock, frames, _writer) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let _a = clock.subscribe(recorder(&log, "A"));
        let b_log = Rc::clone(&log);
        let _b = clock.subscribe_fallible(move |time| {
            b_log.borrow_mut().push("B");
            Err(format!("layout read failed on frame {}", time.frame_index).into())
        });
        let _c = clock.subscribe(recorder(&log, "C"));

        frames.run(3, FRAME);
        assert_eq!(*log.borrow(), ["A", "B", "C", "A", "B", "C", "A", "B", "C"]);
        assert!(clock.is_running());
        assert_eq!(clock.subscriber_count(), 3);
    }

    #[test]
    fn fallible_subscriber_succeeding_runs_every_tick() {
        let (clock, frames, _writer) = setup();
        let ticks = Rc::new(Cell::new(0_u32));
        let sink = Rc::clone(&ticks);
        let _sub = clock.subscribe_fallible(move |_| {
            sink.set(sink.get() + 1);
            Ok(())
        });

        frames.run(4, FRAME);
        assert_eq!(ticks.get(), 4);
    }

    #[test]
    fn unsubscribe_between_ticks_takes_effect_next_tick() {
        let (clock, frames, _writer) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let _a = clock.subscribe(recorder(&log, "A"));
        let b = clock.subscribe(recorder(&log, "B"));
        let _c = clock.subscribe(recorder(&log, "C"));

        frames.advance(FRAME);
        clock.unsubscribe(b.id());
        frames.advance(FRAME);
        assert_eq!(*log.borrow(), ["A", "B", "C", "A", "C"]);

        // Dropping the already-removed subscription is harmless.
        drop(b);
        assert_eq!(clock.subscriber_count(), 2);
    }

    #[test]
    fn unsubscribe_mid_tick_completes_current_pass() {
        let (clock, frames, _writer) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim: Rc<Cell<Option<SubscriberId>>> = Rc::new(Cell::new(None));

        let killer_clock = clock.clone();
        let killer_victim = Rc::clone(&victim);
        let killer_log = Rc::clone(&log);
        let _a = clock.subscribe(move |_| {
            killer_log.borrow_mut().push("A");
            if let Some(id) = killer_victim.get() {
                killer_clock.unsubscribe(id);
            }
        });
        let b = clock.subscribe(recorder(&log, "B"));
        victim.set(Some(b.id()));

        frames.run(2, FRAME);
        assert_eq!(*log.borrow(), ["A", "B", "A"]);
    }

    #[test]
    fn subscribe_mid_tick_starts_next_tick() {
        let (clock, frames, _writer) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let late: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

        let spawn_clock = clock.clone();
        let spawn_log = Rc::clone(&log);
        let spawned = Rc::clone(&late);
        let _a = clock.subscribe(move |time| {
            spawn_log.borrow_mut().push("A");
            if time.frame_index == 0 {
                let sub = spawn_clock.subscribe(recorder(&spawn_log, "late"));
                spawned.borrow_mut().push(sub);
            }
        });

        frames.run(2, FRAME);
        assert_eq!(*log.borrow(), ["A", "A", "late"]);
    }

    #[test]
    fn delta_is_clamped_after_long_gap() {
        let (clock, frames, _writer) = setup();
        let deltas = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&deltas);
        let _sub = clock.subscribe(move |time| sink.borrow_mut().push(time.delta));

        frames.advance(FRAME);
        frames.advance(Duration::from_millis(2_000));
        assert_eq!(*deltas.borrow(), [FRAME, MAX_FRAME_DELTA]);
        assert_eq!(clock.elapsed(), FRAME + MAX_FRAME_DELTA);
    }

    #[test]
    fn frame_time_reports_seconds() {
        let (clock, frames, _writer) = setup();
        let seen = Rc::new(Cell::new((0.0, 0.0)));
        let sink = Rc::clone(&seen);
        let _sub = clock.subscribe(move |time| sink.set((time.delta_secs(), time.elapsed_secs())));

        frames.run(3, Duration::from_millis(20));
        let (delta, elapsed) = seen.get();
        assert!((delta - 0.02).abs() < 1e-9, "delta {delta}");
        assert!((elapsed - 0.06).abs() < 1e-9, "elapsed {elapsed}");
    }

    #[test]
    fn loop_runs_only_while_table_non_empty() {
        let (clock, frames, _writer) = setup();
        assert_eq!(clock.state(), ClockState::PausedByEmptyTable);
        assert!(!frames.is_requested());

        let sub = clock.subscribe(|_| {});
        assert!(clock.is_running());
        assert!(frames.is_requested());

        drop(sub);
        assert_eq!(clock.state(), ClockState::PausedByEmptyTable);
        assert!(!frames.is_requested());
    }

    #[test]
    fn each_condition_toggles_running_state() {
        let (clock, frames, writer) = setup();
        let sub = clock.subscribe(|_| {});
        assert!(clock.is_running());

        writer.update(true);
        assert_eq!(clock.state(), ClockState::Stopped);
        assert!(!frames.is_requested());
        writer.update(false);
        assert!(clock.is_running());

        clock.set_visibility(Visibility::Hidden);
        assert_eq!(clock.state(), ClockState::PausedByVisibility);
        assert!(!frames.is_requested());
        clock.set_visibility(Visibility::Visible);
        assert!(clock.is_running());

        sub.pause();
        assert_eq!(clock.state(), ClockState::PausedByEmptyTable);
        sub.resume();
        assert!(clock.is_running());
        assert!(frames.is_requested());
    }

    #[test]
    fn hidden_and_empty_must_both_clear() {
        let (clock, frames, _writer) = setup();
        clock.set_visibility(Visibility::Hidden);
        let _sub = clock.subscribe(|_| {});
        assert_eq!(clock.state(), ClockState::PausedByVisibility);
        assert!(!frames.advance(FRAME), "no frames while hidden");
        clock.set_visibility(Visibility::Visible);
        assert!(clock.is_running());
    }

    #[test]
    fn resume_after_pause_does_not_catch_up() {
        let (clock, frames, _writer) = setup();
        let deltas = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&deltas);
        let _sub = clock.subscribe(move |time| sink.borrow_mut().push(time.delta));

        frames.advance(FRAME);
        clock.set_visibility(Visibility::Hidden);
        frames.advance(Duration::from_millis(5_000));
        clock.set_visibility(Visibility::Visible);
        frames.advance(FRAME);
        assert_eq!(*deltas.borrow(), [FRAME, FRAME]);
    }

    #[test]
    fn pause_all_overrides_active_subscribers() {
        let (clock, frames, _writer) = setup();
        let count = Rc::new(Cell::new(0));
        let sink = Rc::clone(&count);
        let _sub = clock.subscribe(move |_| sink.set(sink.get() + 1));

        clock.pause_all();
        clock.pause_all();
        assert_eq!(clock.state(), ClockState::Stopped);
        frames.run(3, FRAME);
        assert_eq!(count.get(), 0);

        clock.resume_all();
        frames.run(3, FRAME);
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn disabled_subscription_starts_paused() {
        let (clock, frames, _writer) = setup();
        let sub = clock.subscribe_with(|_| {}, false);
        assert!(sub.is_paused());
        assert_eq!(clock.subscriber_count(), 1);
        assert_eq!(clock.active_count(), 0);
        assert!(!frames.is_requested());
        sub.resume();
        assert!(frames.is_requested());
    }

    #[test]
    fn handle_operations_are_idempotent_after_removal() {
        let (clock, _frames, _writer) = setup();
        let sub = clock.subscribe(|_| {});
        let handle = sub.handle();
        handle.pause();
        handle.pause();
        assert!(handle.is_paused());
        handle.resume();
        handle.resume();
        assert!(!handle.is_paused());

        handle.unsubscribe();
        handle.unsubscribe();
        clock.unsubscribe(handle.id());
        assert!(!handle.is_subscribed());
        assert!(handle.is_paused(), "removed subscribers report paused");
        handle.resume();
        assert_eq!(clock.subscriber_count(), 0);
        assert!(!clock.is_running());
    }

    #[test]
    fn ids_are_never_reused() {
        let (clock, _frames, _writer) = setup();
        let a = clock.subscribe(|_| {});
        let a_id = a.id();
        drop(a);
        let b = clock.subscribe(|_| {});
        assert!(b.id() > a_id);
    }

    #[test]
    fn subscribing_while_reduced_keeps_loop_stopped() {
        let (motion, writer) = MotionPreference::new(true);
        let frames = ManualFrames::new();
        let clock = FrameClock::new(&motion, frames.source());
        let _sub = clock.subscribe(|_| {});
        assert_eq!(clock.state(), ClockState::Stopped);
        assert!(!frames.is_requested());
        writer.update(false);
        assert!(frames.is_requested());
    }

    #[test]
    fn dropping_clock_stops_source_and_detaches_ticker() {
        let (clock, frames, _writer) = setup();
        let ticker = clock.ticker();
        let sub = clock.subscribe(|_| {});
        assert!(frames.is_requested());
        drop(sub);
        drop(clock);
        assert!(!frames.is_requested());
        ticker.tick(HostTime(1_000_000));
    }
}
