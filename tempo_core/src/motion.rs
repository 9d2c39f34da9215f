// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reduced-motion accessibility gate.
//!
//! [`MotionPreference`] reflects the system-level "reduce motion" setting
//! (`prefers-reduced-motion` on the web). It is a shared, read-only capability:
//! consumers hold a clone and query it whenever they need the value, never a
//! copy taken at one instant.
//!
//! The value is written only through the paired [`MotionWriter`], which is
//! handed to the environment listener that watches the system setting. Changes
//! reach every listener synchronously, without polling or debouncing.
//!
//! ```rust
//! use tempo_core::motion::MotionPreference;
//!
//! let (motion, writer) = MotionPreference::new(false);
//! assert!(motion.should_animate());
//!
//! writer.update(true);
//! assert_eq!(motion.motion_scale(), 0.0);
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::listener::{ListenerId, ListenerSet};

type MotionListener = dyn Fn(bool);

struct MotionInner {
    reduced: Cell<bool>,
    listeners: RefCell<ListenerSet<MotionListener>>,
}

/// Shared read handle to the reduced-motion preference.
#[derive(Clone)]
pub struct MotionPreference {
    inner: Rc<MotionInner>,
}

/// Write handle for a [`MotionPreference`].
///
/// Only the system listener owns this. Dropping it freezes the preference at
/// its last value.
pub struct MotionWriter {
    inner: Rc<MotionInner>,
}

impl MotionPreference {
    /// Creates a preference with the value read synchronously from the system
    /// at startup, plus the writer used to apply later system changes.
    #[must_use]
    pub fn new(reduced: bool) -> (Self, MotionWriter) {
        let inner = Rc::new(MotionInner {
            reduced: Cell::new(reduced),
            listeners: RefCell::new(ListenerSet::new()),
        });
        (
            Self {
                inner: Rc::clone(&inner),
            },
            MotionWriter { inner },
        )
    }

    /// Creates a preference that never changes.
    #[must_use]
    pub fn constant(reduced: bool) -> Self {
        Self::new(reduced).0
    }

    /// Returns `true` if the user asked for reduced motion.
    #[must_use]
    pub fn is_reduced(&self) -> bool {
        self.inner.reduced.get()
    }

    /// Returns `true` if animations should run.
    #[must_use]
    pub fn should_animate(&self) -> bool {
        !self.is_reduced()
    }

    /// Multiplier for animation amplitudes: `0.0` when reduced, else `1.0`.
    #[must_use]
    pub fn motion_scale(&self) -> f64 {
        if self.is_reduced() { 0.0 } else { 1.0 }
    }

    /// Registers a listener called with the new value on every change.
    pub fn on_change(&self, listener: impl Fn(bool) + 'static) -> ListenerId {
        self.inner.listeners.borrow_mut().add(Rc::new(listener))
    }

    /// Removes a listener. Unknown ids are ignored.
    pub fn remove_listener(&self, id: ListenerId) {
        self.inner.listeners.borrow_mut().remove(id);
    }
}

impl MotionWriter {
    /// Applies a new system value and notifies listeners if it changed.
    pub fn update(&self, reduced: bool) {
        if self.inner.reduced.replace(reduced) == reduced {
            return;
        }
        tracing::debug!(reduced, "motion preference changed");
        let listeners = self.inner.listeners.borrow().snapshot();
        for listener in listeners {
            listener(reduced);
        }
    }
}

impl core::fmt::Debug for MotionPreference {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotionPreference")
            .field("reduced", &self.inner.reduced.get())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

impl core::fmt::Debug for MotionWriter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotionWriter")
            .field("reduced", &self.inner.reduced.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_helpers_follow_value() {
        let (motion, writer) = MotionPreference::new(false);
        assert!(!motion.is_reduced());
        assert!(motion.should_animate());
        assert_eq!(motion.motion_scale(), 1.0);

        writer.update(true);
        assert!(motion.is_reduced());
        assert!(!motion.should_animate());
        assert_eq!(motion.motion_scale(), 0.0);
    }

    #[test]
    fn clones_observe_later_updates() {
        let (motion, writer) = MotionPreference::new(false);
        let held = motion.clone();
        writer.update(true);
        assert!(held.is_reduced(), "clone shares state, not a snapshot");
    }

    #[test]
    fn listeners_fire_only_on_change() {
        let (motion, writer) = MotionPreference::new(false);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        motion.on_change(move |reduced| sink.borrow_mut().push(reduced));

        writer.update(false);
        writer.update(true);
        writer.update(true);
        writer.update(false);
        assert_eq!(*seen.borrow(), [true, false]);
    }

    #[test]
    fn removed_listener_is_silent() {
        let (motion, writer) = MotionPreference::new(false);
        let count = Rc::new(Cell::new(0));
        let sink = Rc::clone(&count);
        let id = motion.on_change(move |_| sink.set(sink.get() + 1));
        motion.remove_listener(id);
        motion.remove_listener(id);
        writer.update(true);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn constant_preference_reports_initial_value() {
        assert!(MotionPreference::constant(true).is_reduced());
        assert!(MotionPreference::constant(false).should_animate());
    }
}
