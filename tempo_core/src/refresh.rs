// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layout refresh coordination.
//!
//! Layout mutations (fonts finishing loading, window and content resizes,
//! orientation changes) invalidate the geometry a trigger engine computed for
//! its pins and thresholds. [`LayoutRefreshCoordinator`] turns those signals
//! into calls to [`RefreshTarget::refresh`]:
//!
//! | Reason | Policy |
//! |--------|--------|
//! | [`FontsReady`](RefreshReason::FontsReady) | immediate, at most once |
//! | [`WindowResize`](RefreshReason::WindowResize) | trailing debounce, 150 ms |
//! | [`ContentResize`](RefreshReason::ContentResize) | trailing debounce, 100 ms, non-zero heights only |
//! | [`OrientationChange`](RefreshReason::OrientationChange) | fixed 200 ms delay per event |
//!
//! Timers come from a [`TimerHost`], which runs on a coarser clock than the
//! frame clock. Every pending timer is cancelled when the coordinator is
//! dropped, so no refresh can fire after teardown.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::time::{Duration, HostTime};

/// Identifies a pending timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

/// One-shot timeout service.
pub trait TimerHost {
    /// Runs `callback` once after `delay`.
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId;

    /// Cancels a pending timeout. Unknown or already-fired ids are ignored.
    fn clear_timeout(&self, id: TimerId);
}

/// Something whose cached layout can be recomputed.
pub trait RefreshTarget {
    /// Recomputes layout-derived state.
    fn refresh(&self);
}

/// Why a refresh was requested.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RefreshReason {
    /// Web fonts finished loading.
    FontsReady,
    /// The window was resized.
    WindowResize,
    /// The observed content region changed size.
    ContentResize {
        /// New content height in pixels.
        height: f64,
    },
    /// The device orientation changed.
    OrientationChange,
}

/// Delays applied per [`RefreshReason`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Quiet period after the last window resize.
    pub window_resize_debounce: Duration,
    /// Quiet period after the last content resize.
    pub content_resize_debounce: Duration,
    /// Settle time after each orientation change.
    pub orientation_delay: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            window_resize_debounce: Duration::from_millis(150),
            content_resize_debounce: Duration::from_millis(100),
            orientation_delay: Duration::from_millis(200),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Debounced {
    Window,
    Content,
}

#[derive(Debug, Default)]
struct Pending {
    window: Option<TimerId>,
    content: Option<TimerId>,
    orientation: BTreeMap<u64, TimerId>,
    next_token: u64,
}

impl Pending {
    fn slot(&mut self, which: Debounced) -> &mut Option<TimerId> {
        match which {
            Debounced::Window => &mut self.window,
            Debounced::Content => &mut self.content,
        }
    }

    fn len(&self) -> usize {
        usize::from(self.window.is_some())
            + usize::from(self.content.is_some())
            + self.orientation.len()
    }

    fn drain(&mut self) -> Vec<TimerId> {
        let mut ids: Vec<TimerId> = self.window.take().into_iter().collect();
        ids.extend(self.content.take());
        ids.extend(std::mem::take(&mut self.orientation).into_values());
        ids
    }
}

struct CoordinatorInner {
    target: Rc<dyn RefreshTarget>,
    timers: Box<dyn TimerHost>,
    policy: RefreshPolicy,
    pending: RefCell<Pending>,
    fonts_ready: Cell<bool>,
    refresh_count: Cell<u64>,
}

impl CoordinatorInner {
    fn refresh(&self, reason: Option<RefreshReason>) {
        let count = self.refresh_count.get() + 1;
        self.refresh_count.set(count);
        tracing::debug!(?reason, count, "layout refresh");
        self.target.refresh();
    }

    fn debounce(self: &Rc<Self>, which: Debounced, delay: Duration, reason: RefreshReason) {
        let previous = self.pending.borrow_mut().slot(which).take();
        if let Some(id) = previous {
            self.timers.clear_timeout(id);
        }
        let weak = Rc::downgrade(self);
        let id = self.timers.set_timeout(
            delay,
            Box::new(move || fire_debounced(&weak, which, reason)),
        );
        *self.pending.borrow_mut().slot(which) = Some(id);
    }

    fn delay(self: &Rc<Self>, delay: Duration, reason: RefreshReason) {
        let token = {
            let mut pending = self.pending.borrow_mut();
            let token = pending.next_token;
            pending.next_token += 1;
            token
        };
        let weak = Rc::downgrade(self);
        let id = self.timers.set_timeout(
            delay,
            Box::new(move || fire_delayed(&weak, token, reason)),
        );
        self.pending.borrow_mut().orientation.insert(token, id);
    }

    fn cancel_pending(&self) {
        let ids = self.pending.borrow_mut().drain();
        for id in ids {
            self.timers.clear_timeout(id);
        }
    }
}

fn fire_debounced(inner: &Weak<CoordinatorInner>, which: Debounced, reason: RefreshReason) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    *inner.pending.borrow_mut().slot(which) = None;
    inner.refresh(Some(reason));
}

fn fire_delayed(inner: &Weak<CoordinatorInner>, token: u64, reason: RefreshReason) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    inner.pending.borrow_mut().orientation.remove(&token);
    inner.refresh(Some(reason));
}

/// Schedules layout refreshes for a [`RefreshTarget`].
pub struct LayoutRefreshCoordinator {
    inner: Rc<CoordinatorInner>,
}

impl LayoutRefreshCoordinator {
    /// Creates a coordinator refreshing `target` on `timers`.
    pub fn new(
        target: Rc<dyn RefreshTarget>,
        timers: impl TimerHost + 'static,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            inner: Rc::new(CoordinatorInner {
                target,
                timers: Box::new(timers),
                policy,
                pending: RefCell::new(Pending::default()),
                fonts_ready: Cell::new(false),
                refresh_count: Cell::new(0),
            }),
        }
    }

    /// Requests a refresh for `reason` according to the policy.
    ///
    /// Returns `false` if the request was dropped: a repeated
    /// [`FontsReady`](RefreshReason::FontsReady), or a
    /// [`ContentResize`](RefreshReason::ContentResize) to a zero height.
    pub fn schedule_refresh(&self, reason: RefreshReason) -> bool {
        let policy = self.inner.policy;
        match reason {
            RefreshReason::FontsReady => {
                if self.inner.fonts_ready.replace(true) {
                    return false;
                }
                self.inner.refresh(Some(reason));
            }
            RefreshReason::WindowResize => {
                self.inner
                    .debounce(Debounced::Window, policy.window_resize_debounce, reason);
            }
            RefreshReason::ContentResize { height } => {
                if height.is_nan() || height <= 0.0 {
                    return false;
                }
                self.inner
                    .debounce(Debounced::Content, policy.content_resize_debounce, reason);
            }
            RefreshReason::OrientationChange => {
                self.inner.delay(policy.orientation_delay, reason);
            }
        }
        true
    }

    /// Refreshes immediately, leaving pending timers in place.
    pub fn refresh_now(&self) {
        self.inner.refresh(None);
    }

    /// Cancels every pending timer without refreshing.
    pub fn cancel_pending(&self) {
        self.inner.cancel_pending();
    }

    /// Number of timers waiting to fire.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Number of refreshes performed so far.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh_count.get()
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> RefreshPolicy {
        self.inner.policy
    }
}

impl Drop for LayoutRefreshCoordinator {
    fn drop(&mut self) {
        self.inner.cancel_pending();
    }
}

impl core::fmt::Debug for LayoutRefreshCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayoutRefreshCoordinator")
            .field("policy", &self.inner.policy)
            .field("pending", &self.pending_count())
            .field("refresh_count", &self.refresh_count())
            .field("fonts_ready", &self.inner.fonts_ready.get())
            .finish_non_exhaustive()
    }
}

type TimerCallback = Box<dyn FnOnce()>;

#[derive(Default)]
struct TimerQueue {
    now: HostTime,
    next_id: u64,
    queue: BTreeMap<(HostTime, TimerId), TimerCallback>,
}

/// A [`TimerHost`] driven explicitly by the host.
///
/// Clones share one queue. Timeouts fire from [`advance`](Self::advance) in
/// due order; timeouts due at the same instant fire in scheduling order.
#[derive(Clone, Default)]
pub struct ManualTimers {
    shared: Rc<RefCell<TimerQueue>>,
}

impl ManualTimers {
    /// Creates an empty queue at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.shared.borrow().now
    }

    /// Number of timeouts waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.borrow().queue.len()
    }

    /// Moves time forward by `by`, firing every timeout that comes due.
    ///
    /// Returns the number of timeouts fired.
    pub fn advance(&self, by: Duration) -> usize {
        let deadline = self.now().saturating_add(by);
        let mut fired = 0;
        loop {
            let next = {
                let mut queue = self.shared.borrow_mut();
                match queue.queue.first_key_value() {
                    Some((&(due, _), _)) if due <= deadline => {
                        queue.now = due;
                        queue.queue.pop_first()
                    }
                    _ => None,
                }
            };
            let Some((_, callback)) = next else {
                break;
            };
            callback();
            fired += 1;
        }
        self.shared.borrow_mut().now = deadline;
        fired
    }
}

impl TimerHost for ManualTimers {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let mut queue = self.shared.borrow_mut();
        let id = TimerId(queue.next_id);
        queue.next_id += 1;
        let due = queue.now.saturating_add(delay);
        queue.queue.insert((due, id), callback);
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        self.shared
            .borrow_mut()
            .queue
            .retain(|&(_, entry), _| entry != id);
    }
}

impl core::fmt::Debug for ManualTimers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let queue = self.shared.borrow();
        f.debug_struct("ManualTimers")
            .field("now", &queue.now)
            .field("pending", &queue.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        timers: RefCell<Option<ManualTimers>>,
        at: RefCell<Vec<HostTime>>,
    }

    impl RefreshTarget for Recorder {
        fn refresh(&self) {
            let now = self.timers.borrow().as_ref().map_or(HostTime(0), ManualTimers::now);
            self.at.borrow_mut().push(now);
        }
    }

    fn coordinator() -> (LayoutRefreshCoordinator, ManualTimers, Rc<Recorder>) {
        let timers = ManualTimers::new();
        let recorder = Rc::new(Recorder::default());
        *recorder.timers.borrow_mut() = Some(timers.clone());
        let coordinator =
            LayoutRefreshCoordinator::new(recorder.clone(), timers.clone(), RefreshPolicy::default());
        (coordinator, timers, recorder)
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn at_ms(ms: u64) -> HostTime {
        HostTime(ms * 1_000)
    }

    #[test]
    fn resize_burst_refreshes_once_after_quiet_period() {
        let (coordinator, timers, recorder) = coordinator();
        for _ in 0..10 {
            coordinator.schedule_refresh(RefreshReason::WindowResize);
            timers.advance(ms(10));
        }
        // last event at 90 ms
        assert_eq!(coordinator.pending_count(), 1);
        timers.advance(ms(139));
        assert!(recorder.at.borrow().is_empty());
        timers.advance(ms(1));
        assert_eq!(*recorder.at.borrow(), vec![at_ms(240)]);
        assert_eq!(coordinator.refresh_count(), 1);
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[test]
    fn content_resize_ignores_zero_height() {
        let (coordinator, timers, recorder) = coordinator();
        assert!(!coordinator.schedule_refresh(RefreshReason::ContentResize { height: 0.0 }));
        assert!(!coordinator.schedule_refresh(RefreshReason::ContentResize { height: f64::NAN }));
        assert_eq!(coordinator.pending_count(), 0);

        assert!(coordinator.schedule_refresh(RefreshReason::ContentResize { height: 900.0 }));
        timers.advance(ms(50));
        coordinator.schedule_refresh(RefreshReason::ContentResize { height: 950.0 });
        timers.advance(ms(200));
        assert_eq!(*recorder.at.borrow(), vec![at_ms(150)]);
    }

    #[test]
    fn window_and_content_debounce_independently() {
        let (coordinator, timers, recorder) = coordinator();
        coordinator.schedule_refresh(RefreshReason::WindowResize);
        coordinator.schedule_refresh(RefreshReason::ContentResize { height: 10.0 });
        assert_eq!(coordinator.pending_count(), 2);
        timers.advance(ms(200));
        assert_eq!(*recorder.at.borrow(), vec![at_ms(100), at_ms(150)]);
    }

    #[test]
    fn orientation_changes_are_delayed_not_debounced() {
        let (coordinator, timers, recorder) = coordinator();
        coordinator.schedule_refresh(RefreshReason::OrientationChange);
        timers.advance(ms(50));
        coordinator.schedule_refresh(RefreshReason::OrientationChange);
        assert_eq!(coordinator.pending_count(), 2);
        timers.advance(ms(300));
        assert_eq!(*recorder.at.borrow(), vec![at_ms(200), at_ms(250)]);
    }

    #[test]
    fn fonts_ready_refreshes_immediately_and_once() {
        let (coordinator, timers, recorder) = coordinator();
        assert!(coordinator.schedule_refresh(RefreshReason::FontsReady));
        assert!(!coordinator.schedule_refresh(RefreshReason::FontsReady));
        assert_eq!(coordinator.refresh_count(), 1);
        assert_eq!(timers.pending(), 0);
        assert_eq!(recorder.at.borrow().len(), 1);
    }

    #[test]
    fn refresh_now_bypasses_timers() {
        let (coordinator, timers, recorder) = coordinator();
        coordinator.schedule_refresh(RefreshReason::WindowResize);
        coordinator.refresh_now();
        assert_eq!(recorder.at.borrow().len(), 1);
        assert_eq!(timers.pending(), 1);
    }

    #[test]
    fn cancel_clears_timers_without_refreshing() {
        let (coordinator, timers, recorder) = coordinator();
        coordinator.schedule_refresh(RefreshReason::WindowResize);
        coordinator.schedule_refresh(RefreshReason::OrientationChange);
        coordinator.cancel_pending();
        coordinator.cancel_pending();
        assert_eq!(coordinator.pending_count(), 0);
        assert_eq!(timers.pending(), 0);
        timers.advance(ms(1_000));
        assert!(recorder.at.borrow().is_empty());
    }

    #[test]
    fn drop_cancels_pending_timers() {
        let (coordinator, timers, recorder) = coordinator();
        coordinator.schedule_refresh(RefreshReason::WindowResize);
        coordinator.schedule_refresh(RefreshReason::ContentResize { height: 1.0 });
        coordinator.schedule_refresh(RefreshReason::OrientationChange);
        drop(coordinator);
        assert_eq!(timers.pending(), 0);
        timers.advance(ms(1_000));
        assert!(recorder.at.borrow().is_empty());
    }

    struct Rescheduler {
        coordinator: RefCell<Option<Weak<LayoutRefreshCoordinator>>>,
        calls: Cell<u32>,
    }

    impl RefreshTarget for Rescheduler {
        fn refresh(&self) {
            self.calls.set(self.calls.get() + 1);
            let coordinator = self.coordinator.borrow().as_ref().and_then(Weak::upgrade);
            if let Some(coordinator) = coordinator
                && self.calls.get() == 1
            {
                coordinator.schedule_refresh(RefreshReason::WindowResize);
            }
        }
    }

    #[test]
    fn target_may_schedule_from_inside_refresh() {
        let timers = ManualTimers::new();
        let target = Rc::new(Rescheduler {
            coordinator: RefCell::new(None),
            calls: Cell::new(0),
        });
        let coordinator = Rc::new(LayoutRefreshCoordinator::new(
            target.clone(),
            timers.clone(),
            RefreshPolicy::default(),
        ));
        *target.coordinator.borrow_mut() = Some(Rc::downgrade(&coordinator));

        coordinator.schedule_refresh(RefreshReason::WindowResize);
        timers.advance(ms(150));
        assert_eq!(target.calls.get(), 1);
        assert_eq!(coordinator.pending_count(), 1);
        timers.advance(ms(150));
        assert_eq!(target.calls.get(), 2);
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[test]
    fn manual_timers_fire_in_due_order() {
        let timers = ManualTimers::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, tag) in [(30, 'c'), (10, 'a'), (10, 'b')] {
            let log = Rc::clone(&log);
            timers.set_timeout(ms(delay), Box::new(move || log.borrow_mut().push(tag)));
        }
        assert_eq!(timers.advance(ms(20)), 2);
        assert_eq!(timers.now(), at_ms(20));
        assert_eq!(timers.advance(ms(20)), 1);
        assert_eq!(*log.borrow(), vec!['a', 'b', 'c']);
    }

    #[test]
    fn huge_delay_saturates_instead_of_overflowing() {
        let timers = ManualTimers::new();
        timers.advance(ms(5));
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        timers.set_timeout(Duration(u64::MAX), Box::new(move || flag.set(true)));

        assert_eq!(timers.advance(ms(1_000)), 0);
        assert_eq!(timers.pending(), 1);
        assert_eq!(timers.advance(Duration(u64::MAX)), 1);
        assert!(fired.get());
        assert_eq!(timers.now(), HostTime(u64::MAX));
    }
}
