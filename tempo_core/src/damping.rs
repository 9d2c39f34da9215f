// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame-rate independent exponential smoothing.
//!
//! A [`SmoothedValue`] converts a rapidly changing *target* (scroll progress,
//! pointer position) into a visually settled *current* value. Each tick moves
//! the current value toward the target by
//!
//! ```text
//! factor  = 1 - (1 - coefficient) ^ (delta_secs * 60)
//! current = current + (target - current) * factor
//! ```
//!
//! The exponent normalizes the coefficient to a 60 Hz reference frame, so a
//! 120 Hz display converges at the same wall-clock speed as a 60 Hz one.
//!
//! Once every component is within the settle threshold, the value snaps to
//! the target exactly and its clock subscription pauses until the target
//! changes again. Under reduced motion the value is the target, always.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use kurbo::{Point, Vec2};

use crate::clock::{FrameClock, FrameTime, SubscriberHandle, Subscription};
use crate::error::ConfigError;
use crate::motion::MotionPreference;

/// Reference frame rate the coefficient is expressed against.
pub const REFERENCE_FPS: f64 = 60.0;

/// A value the damping law can be applied to.
///
/// Vector implementations settle jointly: no axis snaps until every axis is
/// within the threshold.
pub trait Dampable: Copy + PartialEq + core::fmt::Debug {
    /// Moves `self` toward `target` by `factor` of the remaining distance.
    #[must_use]
    fn approach(self, target: Self, factor: f64) -> Self;

    /// Returns `true` if every component is closer than `threshold`.
    fn is_within(self, target: Self, threshold: f64) -> bool;
}

impl Dampable for f64 {
    fn approach(self, target: Self, factor: f64) -> Self {
        self + (target - self) * factor
    }

    fn is_within(self, target: Self, threshold: f64) -> bool {
        (target - self).abs() < threshold
    }
}

impl Dampable for Vec2 {
    fn approach(self, target: Self, factor: f64) -> Self {
        self + (target - self) * factor
    }

    fn is_within(self, target: Self, threshold: f64) -> bool {
        let diff = target - self;
        diff.x.abs() < threshold && diff.y.abs() < threshold
    }
}

impl Dampable for Point {
    fn approach(self, target: Self, factor: f64) -> Self {
        self.to_vec2().approach(target.to_vec2(), factor).to_point()
    }

    fn is_within(self, target: Self, threshold: f64) -> bool {
        self.to_vec2().is_within(target.to_vec2(), threshold)
    }
}

/// Validated smoothing parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Smoothing {
    coefficient: f64,
    threshold: f64,
}

impl Smoothing {
    /// Smallest coefficient accepted by [`clamped`](Self::clamped).
    pub const MIN_COEFFICIENT: f64 = 1e-4;
    /// Largest coefficient accepted by [`clamped`](Self::clamped).
    pub const MAX_COEFFICIENT: f64 = 1.0 - 1e-4;

    /// Creates smoothing parameters, rejecting a coefficient outside (0, 1)
    /// or a non-positive threshold.
    pub fn new(coefficient: f64, threshold: f64) -> Result<Self, ConfigError> {
        if !(coefficient > 0.0 && coefficient < 1.0) {
            return Err(ConfigError::Coefficient(coefficient));
        }
        if !(threshold > 0.0 && threshold.is_finite()) {
            return Err(ConfigError::Threshold(threshold));
        }
        Ok(Self {
            coefficient,
            threshold,
        })
    }

    /// Creates smoothing parameters, clamping out-of-range input into the
    /// valid range instead of rejecting it. NaN falls back to the defaults.
    #[must_use]
    pub fn clamped(coefficient: f64, threshold: f64) -> Self {
        let defaults = Self::default();
        let coefficient = if coefficient.is_nan() {
            defaults.coefficient
        } else {
            coefficient.clamp(Self::MIN_COEFFICIENT, Self::MAX_COEFFICIENT)
        };
        let threshold = if threshold > 0.0 && threshold.is_finite() {
            threshold
        } else {
            defaults.threshold
        };
        Self {
            coefficient,
            threshold,
        }
    }

    /// Fraction of the remaining distance covered per 60 Hz reference frame.
    #[must_use]
    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    /// Distance below which the value snaps to its target.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Blend factor for a frame of `delta_secs`.
    #[must_use]
    pub fn factor(&self, delta_secs: f64) -> f64 {
        damp_factor(self.coefficient, delta_secs)
    }
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            coefficient: 0.1,
            threshold: 0.001,
        }
    }
}

/// Blend factor for one frame: `1 - (1 - coefficient) ^ (delta_secs * 60)`.
#[must_use]
pub fn damp_factor(coefficient: f64, delta_secs: f64) -> f64 {
    1.0 - (1.0 - coefficient).powf(delta_secs * REFERENCE_FPS)
}

/// Applies one tick of the damping law.
///
/// Snaps to `target` when already within the threshold; otherwise moves
/// toward it by the frame-normalized factor.
#[must_use]
pub fn step<T: Dampable>(current: T, target: T, smoothing: &Smoothing, delta_secs: f64) -> T {
    if current.is_within(target, smoothing.threshold) {
        target
    } else {
        current.approach(target, smoothing.factor(delta_secs))
    }
}

#[derive(Debug)]
struct SmoothState<T> {
    target: T,
    current: T,
    smoothing: Smoothing,
    settled: bool,
    handle: Option<SubscriberHandle>,
}

impl<T: Dampable> SmoothState<T> {
    fn advance(&mut self, delta_secs: f64) {
        if self.settled {
            return;
        }
        self.current = step(self.current, self.target, &self.smoothing, delta_secs);
        self.settled = self.current == self.target;
    }
}

/// A value eased toward its target once per clock tick.
#[derive(Debug)]
pub struct SmoothedValue<T: Dampable> {
    state: Rc<RefCell<SmoothState<T>>>,
    motion: MotionPreference,
    subscription: Option<Subscription>,
}

impl<T: Dampable + 'static> SmoothedValue<T> {
    /// Creates a value resting at `target`.
    ///
    /// If motion is reduced at construction the value never subscribes to
    /// `clock` and always reports its target.
    pub fn new(clock: &FrameClock, target: T, smoothing: Smoothing) -> Self {
        let motion = clock.motion().clone();
        let state = Rc::new(RefCell::new(SmoothState {
            target,
            current: target,
            smoothing,
            settled: true,
            handle: None,
        }));

        let subscription = if motion.is_reduced() {
            None
        } else {
            let weak = Rc::downgrade(&state);
            // Starts paused: nothing to do until the target moves.
            let subscription = clock.subscribe_with(move |time| tick(&weak, time), false);
            state.borrow_mut().handle = Some(subscription.handle());
            Some(subscription)
        };

        Self {
            state,
            motion,
            subscription,
        }
    }

    /// Starts the displayed value at `initial` instead of the target.
    #[must_use]
    pub fn with_initial(self, initial: T) -> Self {
        if self.subscription.is_some() {
            let mut state = self.state.borrow_mut();
            state.current = initial;
            state.settled = initial == state.target;
        }
        self.wake();
        self
    }

    /// Sets a new target. Ticks resume if the value was settled.
    pub fn set_target(&self, target: T) {
        {
            let mut state = self.state.borrow_mut();
            if state.target == target {
                return;
            }
            state.target = target;
            if self.subscription.is_none() {
                state.current = target;
                return;
            }
            state.settled = state.current == target;
        }
        self.wake();
    }

    /// Sets the target and returns the value to display this frame.
    pub fn smooth(&self, target: T) -> T {
        self.set_target(target);
        self.current()
    }

    /// The value to display.
    ///
    /// Returns the target verbatim while motion is reduced.
    pub fn current(&self) -> T {
        let mut state = self.state.borrow_mut();
        if self.motion.is_reduced() {
            state.current = state.target;
            state.settled = true;
        }
        state.current
    }

    /// The value being approached.
    pub fn target(&self) -> T {
        self.state.borrow().target
    }

    /// Returns `true` once the value rests exactly on its target.
    pub fn is_settled(&self) -> bool {
        let state = self.state.borrow();
        state.settled || self.motion.is_reduced()
    }

    /// Returns `true` if this value holds a clock subscription.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    fn wake(&self) {
        let handle = {
            let state = self.state.borrow();
            if state.settled {
                None
            } else {
                state.handle.clone()
            }
        };
        if let Some(handle) = handle {
            handle.resume();
        }
    }
}

fn tick<T: Dampable>(state: &Weak<RefCell<SmoothState<T>>>, time: FrameTime) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let to_pause = {
        let mut state = state.borrow_mut();
        state.advance(time.delta_secs());
        if state.settled {
            state.handle.clone()
        } else {
            None
        }
    };
    if let Some(handle) = to_pause {
        handle.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ClockState, ManualFrames};
    use crate::time::Duration;

    const FRAME: Duration = Duration::from_millis(16);

    fn clock(reduced: bool) -> (FrameClock, ManualFrames) {
        let frames = ManualFrames::new();
        let clock = FrameClock::new(&MotionPreference::constant(reduced), frames.source());
        (clock, frames)
    }

    #[test]
    fn distance_strictly_decreases_then_settles_exactly() {
        for coefficient in [0.01, 0.1, 0.5, 0.9, 0.99] {
            let smoothing = Smoothing::new(coefficient, 0.01).unwrap();
            let target = 100.0_f64;
            let mut current = 0.0_f64;
            let mut distance = (target - current).abs();
            let mut ticks = 0;
            while !current.is_within(target, smoothing.threshold()) {
                current = step(current, target, &smoothing, 1.0 / 60.0);
                let next = (target - current).abs();
                assert!(next < distance, "c={coefficient}: {next} !< {distance}");
                distance = next;
                ticks += 1;
                assert!(ticks < 10_000, "c={coefficient} failed to converge");
            }
            for _ in 0..5 {
                current = step(current, target, &smoothing, 1.0 / 60.0);
                assert_eq!(current, target, "settled value is idempotent");
            }
        }
    }

    #[test]
    fn convergence_is_frame_rate_independent() {
        let smoothing = Smoothing::new(0.1, 1e-9).unwrap();
        let mut at_60 = 0.0_f64;
        for _ in 0..60 {
            at_60 = step(at_60, 1.0, &smoothing, 1.0 / 60.0);
        }
        let mut at_30 = 0.0_f64;
        for _ in 0..30 {
            at_30 = step(at_30, 1.0, &smoothing, 1.0 / 30.0);
        }
        let mut at_144 = 0.0_f64;
        for _ in 0..144 {
            at_144 = step(at_144, 1.0, &smoothing, 1.0 / 144.0);
        }
        assert!((at_60 - at_30).abs() < 1e-9, "{at_60} vs {at_30}");
        assert!((at_60 - at_144).abs() < 1e-9, "{at_60} vs {at_144}");
    }

    #[test]
    fn one_reference_frame_covers_coefficient_fraction() {
        let factor = damp_factor(0.25, 1.0 / 60.0);
        assert!((factor - 0.25).abs() < 1e-12, "factor {factor}");
        assert_eq!(damp_factor(0.25, 0.0), 0.0);
    }

    #[test]
    fn out_of_range_configuration_is_rejected() {
        assert_eq!(Smoothing::new(0.0, 0.1), Err(ConfigError::Coefficient(0.0)));
        assert_eq!(Smoothing::new(1.0, 0.1), Err(ConfigError::Coefficient(1.0)));
        assert!(matches!(
            Smoothing::new(f64::NAN, 0.1),
            Err(ConfigError::Coefficient(_))
        ));
        assert_eq!(Smoothing::new(0.5, 0.0), Err(ConfigError::Threshold(0.0)));
        assert_eq!(Smoothing::new(0.5, -1.0), Err(ConfigError::Threshold(-1.0)));
    }

    #[test]
    fn clamped_configuration_stays_in_range() {
        let s = Smoothing::clamped(3.0, -2.0);
        assert_eq!(s.coefficient(), Smoothing::MAX_COEFFICIENT);
        assert_eq!(s.threshold(), Smoothing::default().threshold());
        let s = Smoothing::clamped(-3.0, 0.5);
        assert_eq!(s.coefficient(), Smoothing::MIN_COEFFICIENT);
        assert_eq!(s.threshold(), 0.5);
        let s = Smoothing::clamped(f64::NAN, 0.5);
        assert_eq!(s.coefficient(), Smoothing::default().coefficient());
    }

    #[test]
    fn vector_axes_settle_jointly() {
        let smoothing = Smoothing::new(0.5, 0.01).unwrap();
        let target = Vec2::new(10.0, 10.0);
        let current = Vec2::new(9.995, 0.0);

        let next = step(current, target, &smoothing, 1.0 / 60.0);
        assert!(next.x != target.x, "x keeps easing while y is far");
        assert!(next.y > 0.0);

        let mut v = next;
        for _ in 0..100 {
            v = step(v, target, &smoothing, 1.0 / 60.0);
        }
        assert_eq!(v, target, "both axes snap together");
    }

    #[test]
    fn point_uses_same_law_as_vec2() {
        let smoothing = Smoothing::default();
        let p = step(Point::new(0.0, 0.0), Point::new(4.0, 8.0), &smoothing, 1.0 / 60.0);
        let v = step(Vec2::ZERO, Vec2::new(4.0, 8.0), &smoothing, 1.0 / 60.0);
        assert_eq!(p.to_vec2(), v);
    }

    #[test]
    fn reduced_motion_returns_target_without_subscribing() {
        let (clock, _frames) = clock(true);
        let value = SmoothedValue::new(&clock, 0.0, Smoothing::default());
        assert_eq!(value.smooth(5.0), 5.0);
        assert_eq!(clock.subscriber_count(), 0);
        assert!(!value.is_subscribed());

        let value = SmoothedValue::new(&clock, 0.0, Smoothing::default()).with_initial(-3.0);
        assert_eq!(value.current(), 0.0);
        assert_eq!(clock.subscriber_count(), 0);
    }

    #[test]
    fn value_eases_on_clock_ticks() {
        let (clock, frames) = clock(false);
        let value = SmoothedValue::new(&clock, 0.0, Smoothing::new(0.2, 0.01).unwrap());
        assert!(value.is_settled());
        assert_eq!(clock.state(), ClockState::PausedByEmptyTable);

        value.set_target(10.0);
        assert!(clock.is_running());
        assert_eq!(value.current(), 0.0, "no movement before the first tick");

        frames.advance(FRAME);
        let first = value.current();
        assert!(first > 0.0 && first < 10.0, "first tick moved to {first}");
        frames.advance(FRAME);
        assert!(value.current() > first);
    }

    #[test]
    fn settled_value_releases_the_clock() {
        let (clock, frames) = clock(false);
        let value = SmoothedValue::new(&clock, 0.0, Smoothing::new(0.5, 0.01).unwrap());
        value.set_target(1.0);

        let mut ticks = 0;
        while frames.advance(FRAME) {
            ticks += 1;
            assert!(ticks < 1_000, "value never settled");
        }
        assert_eq!(value.current(), 1.0);
        assert!(value.is_settled());
        assert_eq!(clock.state(), ClockState::PausedByEmptyTable);

        value.set_target(2.0);
        assert!(clock.is_running(), "new target wakes the clock");
    }

    #[test]
    fn initial_value_animates_toward_target() {
        let (clock, frames) = clock(false);
        let value = SmoothedValue::new(&clock, 1.0, Smoothing::default()).with_initial(0.0);
        assert_eq!(value.current(), 0.0);
        assert!(clock.is_running());
        frames.advance(FRAME);
        assert!(value.current() > 0.0);
    }

    #[test]
    fn reduced_motion_after_creation_snaps_to_target() {
        let (motion, writer) = MotionPreference::new(false);
        let frames = ManualFrames::new();
        let clock = FrameClock::new(&motion, frames.source());
        let value = SmoothedValue::new(&clock, Vec2::ZERO, Smoothing::default());
        value.set_target(Vec2::new(3.0, 4.0));
        frames.advance(FRAME);
        assert_ne!(value.current(), Vec2::new(3.0, 4.0));

        writer.update(true);
        assert_eq!(value.current(), Vec2::new(3.0, 4.0));
        assert!(value.is_settled());
        assert!(!clock.is_running());
    }

    #[test]
    fn dropping_value_unsubscribes() {
        let (clock, _frames) = clock(false);
        let value = SmoothedValue::new(&clock, 0.0, Smoothing::default());
        assert_eq!(clock.subscriber_count(), 1);
        drop(value);
        assert_eq!(clock.subscriber_count(), 0);
    }
}
