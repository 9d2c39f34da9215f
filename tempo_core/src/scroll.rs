// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Inertial virtual scroll engine.
//!
//! [`VirtualScroll`] intercepts raw input (wheel deltas, touch drags, key
//! presses) and produces an eased *virtual* offset that is distinct from the
//! native scroll position. The host writes that offset back to the page each
//! frame; scroll-linked effects read it through a
//! [`ScrollPositionAdapter`](crate::adapter::ScrollPositionAdapter).
//!
//! The engine has no timing source of its own. It advances from a
//! [`FrameClock`] subscription that is resumed when input arrives and paused
//! again once the offset rests on its target.
//!
//! Under reduced motion the engine is not created at all
//! ([`VirtualScroll::new`] returns `Ok(None)`) and native scrolling is left
//! alone.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::clock::{FrameClock, FrameTime, SubscriberHandle, Subscription};
use crate::damping::{Dampable, damp_factor};
use crate::ease::Easing;
use crate::error::ConfigError;
use crate::listener::{ListenerId, ListenerSet};
use crate::motion::MotionPreference;
use crate::time::Duration;

/// Pixels per line for line-mode wheel deltas.
pub const LINE_HEIGHT: f64 = 100.0 / 6.0;

/// Distance under which a lerped offset snaps to its target, in pixels.
pub const SETTLE_DISTANCE: f64 = 0.5;

/// How the offset travels toward a new target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScrollAnimation {
    /// Exponential approach with the given per-reference-frame factor.
    ///
    /// Uses the same frame-rate normalization as
    /// [`damping`](crate::damping).
    Lerp(f64),
    /// Fixed-length tween with an easing curve.
    Timed {
        /// Tween length.
        duration: Duration,
        /// Progress curve.
        easing: Easing,
    },
}

/// Virtual scroll configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollConfig {
    /// Motion toward targets set by input.
    pub animation: ScrollAnimation,
    /// Scale applied to wheel deltas.
    pub wheel_multiplier: f64,
    /// Scale applied to touch drag distances.
    pub touch_multiplier: f64,
    /// Seconds of release velocity carried after a touch drag ends.
    pub touch_inertia: f64,
    /// Distance moved by an arrow key, in pixels.
    pub key_step: f64,
    /// Fraction of the viewport moved by page keys and space.
    pub page_fraction: f64,
}

impl ScrollConfig {
    /// Lerp-driven scrolling (the default).
    #[must_use]
    pub const fn lerp(factor: f64) -> Self {
        Self {
            animation: ScrollAnimation::Lerp(factor),
            wheel_multiplier: 1.0,
            touch_multiplier: 1.0,
            touch_inertia: 0.6,
            key_step: 40.0,
            page_fraction: 0.9,
        }
    }

    /// Tween-driven scrolling.
    #[must_use]
    pub const fn timed(duration: Duration, easing: Easing) -> Self {
        Self {
            animation: ScrollAnimation::Timed { duration, easing },
            ..Self::lerp(0.1)
        }
    }

    /// Checks every field, returning the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let ScrollAnimation::Lerp(factor) = self.animation
            && !(factor > 0.0 && factor < 1.0)
        {
            return Err(ConfigError::Lerp(factor));
        }
        for (name, value) in [
            ("wheel_multiplier", self.wheel_multiplier),
            ("touch_multiplier", self.touch_multiplier),
            ("touch_inertia", self.touch_inertia),
            ("key_step", self.key_step),
            ("page_fraction", self.page_fraction),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Scale { name, value });
            }
        }
        Ok(())
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self::lerp(0.1)
    }
}

/// Unit of a wheel delta.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeltaMode {
    /// Pixels.
    #[default]
    Pixel,
    /// Lines of text.
    Line,
    /// Whole viewports.
    Page,
}

/// One wheel event.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WheelDelta {
    /// Vertical delta; positive scrolls down.
    pub dy: f64,
    /// Unit of `dy`.
    pub mode: DeltaMode,
}

impl WheelDelta {
    /// Pixel delta.
    #[must_use]
    pub const fn pixels(dy: f64) -> Self {
        Self {
            dy,
            mode: DeltaMode::Pixel,
        }
    }

    /// Converts to pixels for a viewport of `viewport` pixels.
    #[must_use]
    pub fn to_pixels(self, viewport: f64) -> f64 {
        match self.mode {
            DeltaMode::Pixel => self.dy,
            DeltaMode::Line => self.dy * LINE_HEIGHT,
            DeltaMode::Page => self.dy * viewport,
        }
    }
}

/// Keys the engine scrolls for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScrollKey {
    /// Up arrow.
    ArrowUp,
    /// Down arrow.
    ArrowDown,
    /// Page Up.
    PageUp,
    /// Page Down.
    PageDown,
    /// Space bar.
    Space,
    /// Shift + space bar.
    ShiftSpace,
    /// Home.
    Home,
    /// End.
    End,
}

/// Last direction of travel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    /// No movement yet.
    #[default]
    Idle,
    /// Increasing offset.
    Down,
    /// Decreasing offset.
    Up,
}

/// Delivered to change listeners whenever the virtual offset moves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollEvent {
    /// Virtual offset in pixels.
    pub offset: f64,
    /// Velocity in pixels per second.
    pub velocity: f64,
    /// Last direction of travel.
    pub direction: ScrollDirection,
    /// `offset / limit`, or 0 when nothing can scroll.
    pub progress: f64,
}

/// Options for [`VirtualScroll::scroll_to`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollToOptions {
    /// Jump without easing.
    pub immediate: bool,
    /// Added to the requested position before clamping.
    pub offset: f64,
    /// Tween length overriding the configured animation.
    pub duration: Option<Duration>,
}

impl ScrollToOptions {
    /// Options for an immediate jump.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Tween {
    from: f64,
    to: f64,
    elapsed: Duration,
    duration: Duration,
    easing: Easing,
}

impl Tween {
    fn advance(&mut self, delta: Duration) -> (f64, bool) {
        self.elapsed += delta;
        if self.elapsed >= self.duration {
            return (self.to, true);
        }
        let eased = self
            .easing
            .apply(self.elapsed.as_secs_f64() / self.duration.as_secs_f64());
        (self.from + (self.to - self.from) * eased, false)
    }
}

#[derive(Debug)]
struct ScrollState {
    config: ScrollConfig,
    offset: f64,
    target: f64,
    sampled: f64,
    velocity: f64,
    direction: ScrollDirection,
    viewport: f64,
    limit: f64,
    tween: Option<Tween>,
    touch_y: Option<f64>,
    scrolling: bool,
    stopped: bool,
    handle: Option<SubscriberHandle>,
}

impl ScrollState {
    fn clamp(&self, value: f64) -> f64 {
        value.clamp(0.0, self.limit)
    }

    fn event(&self) -> ScrollEvent {
        ScrollEvent {
            offset: self.offset,
            velocity: self.velocity,
            direction: self.direction,
            progress: if self.limit > 0.0 {
                self.offset / self.limit
            } else {
                0.0
            },
        }
    }

    fn note_travel(&mut self, from: f64) {
        if self.offset > from {
            self.direction = ScrollDirection::Down;
        } else if self.offset < from {
            self.direction = ScrollDirection::Up;
        }
    }

    fn jump(&mut self, value: f64) {
        let from = self.offset;
        self.offset = value;
        self.target = value;
        self.tween = None;
        self.note_travel(from);
    }

    fn animate_to(&mut self, value: f64, duration: Option<Duration>) {
        let value = self.clamp(value);
        self.target = value;
        let timed = match (duration, self.config.animation) {
            (Some(duration), ScrollAnimation::Timed { easing, .. }) => Some((duration, easing)),
            (Some(duration), ScrollAnimation::Lerp(_)) => Some((duration, Easing::default())),
            (None, ScrollAnimation::Timed { duration, easing }) => Some((duration, easing)),
            (None, ScrollAnimation::Lerp(_)) => None,
        };
        self.tween = timed.map(|(duration, easing)| Tween {
            from: self.offset,
            to: value,
            elapsed: Duration::ZERO,
            duration,
            easing,
        });
        self.scrolling = true;
    }

    fn settle(&mut self) {
        self.target = self.offset;
        self.sampled = self.offset;
        self.tween = None;
        self.touch_y = None;
        self.velocity = 0.0;
        self.scrolling = false;
    }

    /// Advances one frame. Returns whether the offset moved.
    fn advance(&mut self, delta: Duration) -> bool {
        let delta_secs = delta.as_secs_f64();
        let from = self.offset;
        if let Some(mut tween) = self.tween.take() {
            let (value, done) = tween.advance(delta);
            self.offset = value;
            if !done {
                self.tween = Some(tween);
            }
        } else if self.offset != self.target {
            self.offset = match self.config.animation {
                ScrollAnimation::Lerp(factor) => {
                    self.offset.approach(self.target, damp_factor(factor, delta_secs))
                }
                ScrollAnimation::Timed { .. } => self.target,
            };
            if (self.target - self.offset).abs() < SETTLE_DISTANCE {
                self.offset = self.target;
            }
        }
        self.note_travel(from);

        let travelled = self.offset - self.sampled;
        self.sampled = self.offset;
        self.velocity = if delta_secs > 0.0 {
            travelled / delta_secs
        } else {
            0.0
        };

        if self.tween.is_none() && self.offset == self.target && self.touch_y.is_none() {
            self.velocity = 0.0;
            self.scrolling = false;
        }
        self.offset != from || travelled != 0.0
    }
}

type ScrollListener = dyn Fn(&ScrollEvent);

struct ScrollShared {
    state: RefCell<ScrollState>,
    listeners: RefCell<ListenerSet<ScrollListener>>,
    motion: MotionPreference,
}

impl ScrollShared {
    fn emit(&self) {
        let event = self.state.borrow().event();
        let listeners = self.listeners.borrow().snapshot();
        for listener in listeners {
            listener(&event);
        }
    }

    /// Resumes the clock subscription while there is motion to produce.
    ///
    /// If motion became reduced after construction the clock is stopped, so
    /// the offset jumps straight to its target instead.
    fn wake(&self) {
        if self.motion.is_reduced() {
            let moved = {
                let mut state = self.state.borrow_mut();
                let from = state.offset;
                let target = state.target;
                state.jump(target);
                state.sampled = target;
                state.velocity = 0.0;
                if state.touch_y.is_none() {
                    state.scrolling = false;
                }
                state.offset != from
            };
            if moved {
                self.emit();
            }
            return;
        }
        let handle = {
            let state = self.state.borrow();
            if state.scrolling {
                state.handle.clone()
            } else {
                None
            }
        };
        if let Some(handle) = handle {
            handle.resume();
        }
    }

    fn sleep(&self) {
        let handle = self.state.borrow().handle.clone();
        if let Some(handle) = handle {
            handle.pause();
        }
    }
}

/// The inertial scroll emulator.
pub struct VirtualScroll {
    shared: Rc<ScrollShared>,
    subscription: Subscription,
}

impl VirtualScroll {
    /// Creates an engine ticking from `clock`.
    ///
    /// Returns `Ok(None)` when motion is reduced: the page keeps native
    /// scrolling and nothing is intercepted.
    pub fn new(clock: &FrameClock, config: ScrollConfig) -> Result<Option<Self>, ConfigError> {
        config.validate()?;
        if clock.motion().is_reduced() {
            tracing::debug!("reduced motion: virtual scroll disabled");
            return Ok(None);
        }

        let shared = Rc::new(ScrollShared {
            state: RefCell::new(ScrollState {
                config,
                offset: 0.0,
                target: 0.0,
                sampled: 0.0,
                velocity: 0.0,
                direction: ScrollDirection::Idle,
                viewport: 0.0,
                limit: 0.0,
                tween: None,
                touch_y: None,
                scrolling: false,
                stopped: false,
                handle: None,
            }),
            listeners: RefCell::new(ListenerSet::new()),
            motion: clock.motion().clone(),
        });

        let weak = Rc::downgrade(&shared);
        let subscription = clock.subscribe_with(move |time| tick(&weak, time), false);
        shared.state.borrow_mut().handle = Some(subscription.handle());

        Ok(Some(Self {
            shared,
            subscription,
        }))
    }

    /// Updates the viewport and content heights, clamping the offset into
    /// the new scrollable range.
    pub fn set_dimensions(&self, viewport: f64, content: f64) {
        let moved = {
            let mut state = self.shared.state.borrow_mut();
            state.viewport = viewport.max(0.0);
            state.limit = (content - viewport).max(0.0);
            let limit = state.limit;
            state.target = state.target.min(limit);
            if let Some(tween) = state.tween.as_mut() {
                tween.to = tween.to.min(limit);
            }
            let moved = state.offset > limit;
            if moved {
                state.offset = limit;
                state.sampled = limit;
            }
            moved
        };
        if moved {
            self.shared.emit();
        }
    }

    /// Scrolls to `position`.
    ///
    /// Immediate jumps always apply, even while [stopped](Self::stop), since
    /// they come from systems that own the position. Animated requests are
    /// ignored while stopped.
    pub fn scroll_to(&self, position: f64, options: ScrollToOptions) {
        {
            let mut state = self.shared.state.borrow_mut();
            let value = state.clamp(position + options.offset);
            if options.immediate {
                state.jump(value);
                state.settle();
            } else if state.stopped {
                return;
            } else {
                state.animate_to(value, options.duration);
            }
        }
        if options.immediate {
            self.shared.sleep();
            self.shared.emit();
        } else {
            self.shared.wake();
        }
    }

    /// Applies a wheel event. Returns `false` if it was ignored.
    pub fn on_wheel(&self, delta: WheelDelta) -> bool {
        {
            let mut state = self.shared.state.borrow_mut();
            if state.stopped {
                return false;
            }
            let pixels = delta.to_pixels(state.viewport) * state.config.wheel_multiplier;
            let base = state.target;
            state.animate_to(base + pixels, None);
        }
        self.shared.wake();
        true
    }

    /// Begins a touch drag at client coordinate `y`.
    pub fn on_touch_start(&self, y: f64) -> bool {
        {
            let mut state = self.shared.state.borrow_mut();
            if state.stopped {
                return false;
            }
            let offset = state.offset;
            state.jump(offset);
            state.touch_y = Some(y);
            state.scrolling = true;
        }
        self.shared.wake();
        true
    }

    /// Moves a touch drag to client coordinate `y`. The offset follows the
    /// finger without easing.
    pub fn on_touch_move(&self, y: f64) -> bool {
        {
            let mut state = self.shared.state.borrow_mut();
            if state.stopped {
                return false;
            }
            let Some(last_y) = state.touch_y.replace(y) else {
                return false;
            };
            let delta = (last_y - y) * state.config.touch_multiplier;
            let value = state.clamp(state.offset + delta);
            state.jump(value);
        }
        self.shared.emit();
        true
    }

    /// Ends a touch drag, carrying the release velocity as inertia.
    pub fn on_touch_end(&self) -> bool {
        {
            let mut state = self.shared.state.borrow_mut();
            if state.touch_y.take().is_none() {
                return false;
            }
            let fling = state.offset + state.velocity * state.config.touch_inertia;
            state.animate_to(fling, None);
        }
        self.shared.wake();
        true
    }

    /// Applies a navigation key. Returns `false` if the key was ignored.
    pub fn on_key(&self, key: ScrollKey) -> bool {
        let destination = {
            let state = self.shared.state.borrow();
            if state.stopped {
                return false;
            }
            let page = state.viewport * state.config.page_fraction;
            match key {
                ScrollKey::ArrowDown => state.target + state.config.key_step,
                ScrollKey::ArrowUp => state.target - state.config.key_step,
                ScrollKey::PageDown | ScrollKey::Space => state.target + page,
                ScrollKey::PageUp | ScrollKey::ShiftSpace => state.target - page,
                ScrollKey::Home => 0.0,
                ScrollKey::End => state.limit,
            }
        };
        self.scroll_to(destination, ScrollToOptions::default());
        true
    }

    /// Halts motion where it is and ignores input until
    /// [`start`](Self::start).
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.borrow_mut();
            state.stopped = true;
            state.settle();
        }
        self.shared.sleep();
    }

    /// Accepts input again after [`stop`](Self::stop).
    pub fn start(&self) {
        self.shared.state.borrow_mut().stopped = false;
    }

    /// Current virtual offset in pixels.
    #[must_use]
    pub fn offset(&self) -> f64 {
        self.shared.state.borrow().offset
    }

    /// Offset being approached.
    #[must_use]
    pub fn target(&self) -> f64 {
        self.shared.state.borrow().target
    }

    /// Velocity in pixels per second, measured over the last frame.
    #[must_use]
    pub fn velocity(&self) -> f64 {
        self.shared.state.borrow().velocity
    }

    /// Largest reachable offset.
    #[must_use]
    pub fn limit(&self) -> f64 {
        self.shared.state.borrow().limit
    }

    /// `offset / limit`, or 0 when nothing can scroll.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.shared.state.borrow().event().progress
    }

    /// Last direction of travel.
    #[must_use]
    pub fn direction(&self) -> ScrollDirection {
        self.shared.state.borrow().direction
    }

    /// Returns `true` while the offset is moving or a drag is in progress.
    #[must_use]
    pub fn is_scrolling(&self) -> bool {
        self.shared.state.borrow().scrolling
    }

    /// Returns `true` between [`stop`](Self::stop) and
    /// [`start`](Self::start).
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.state.borrow().stopped
    }

    /// Registers a listener called whenever the offset moves.
    pub fn on_change(&self, listener: impl Fn(&ScrollEvent) + 'static) -> ListenerId {
        self.shared.listeners.borrow_mut().add(Rc::new(listener))
    }

    /// Removes a change listener. Unknown ids are ignored.
    pub fn remove_listener(&self, id: ListenerId) {
        self.shared.listeners.borrow_mut().remove(id);
    }
}

impl core::fmt::Debug for VirtualScroll {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("VirtualScroll")
            .field("offset", &state.offset)
            .field("target", &state.target)
            .field("velocity", &state.velocity)
            .field("limit", &state.limit)
            .field("stopped", &state.stopped)
            .field("subscriber", &self.subscription.id())
            .finish()
    }
}

fn tick(shared: &Weak<ScrollShared>, time: FrameTime) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let (moved, idle) = {
        let mut state = shared.state.borrow_mut();
        let moved = state.advance(time.delta);
        (moved, !state.scrolling)
    };
    if moved {
        shared.emit();
    }
    if idle {
        shared.sleep();
    }
}
