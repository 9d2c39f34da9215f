// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend-neutral view of a scroll position.
//!
//! A trigger engine reads and writes scroll through this interface only, so it
//! never depends on the shape of a particular virtual-scroll backend.

use std::rc::Rc;

use crate::listener::ListenerId;
use crate::scroll::{ScrollToOptions, VirtualScroll};

/// Listener receiving the new position, in pixels.
pub type PositionListener = Rc<dyn Fn(f64)>;

/// A scroll position owned by something other than the native scroller.
pub trait ScrollPositionAdapter {
    /// Current position in pixels.
    fn get(&self) -> f64;

    /// Moves to `value`. `immediate` skips any easing.
    fn set(&self, value: f64, immediate: bool);

    /// Registers a listener called whenever the position moves.
    fn on_change(&self, listener: PositionListener) -> ListenerId;

    /// Removes a listener. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);
}

impl ScrollPositionAdapter for VirtualScroll {
    fn get(&self) -> f64 {
        self.offset()
    }

    fn set(&self, value: f64, immediate: bool) {
        self.scroll_to(
            value,
            ScrollToOptions {
                immediate,
                ..ScrollToOptions::default()
            },
        );
    }

    fn on_change(&self, listener: PositionListener) -> ListenerId {
        VirtualScroll::on_change(self, move |event| listener(event.offset))
    }

    fn remove_listener(&self, id: ListenerId) {
        VirtualScroll::remove_listener(self, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FrameClock, ManualFrames};
    use crate::motion::MotionPreference;
    use crate::scroll::ScrollConfig;
    use crate::time::Duration;
    use std::cell::RefCell;

    fn adapter() -> (Rc<dyn ScrollPositionAdapter>, ManualFrames, FrameClock) {
        let frames = ManualFrames::new();
        let clock = FrameClock::new(&MotionPreference::constant(false), frames.source());
        let scroll = VirtualScroll::new(&clock, ScrollConfig::default())
            .unwrap()
            .unwrap();
        scroll.set_dimensions(500.0, 3_000.0);
        (Rc::new(scroll), frames, clock)
    }

    #[test]
    fn immediate_set_is_visible_to_get() {
        let (adapter, _frames, _clock) = adapter();
        adapter.set(750.0, true);
        assert_eq!(adapter.get(), 750.0);
    }

    #[test]
    fn animated_set_reports_each_frame() {
        let (adapter, frames, _clock) = adapter();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = adapter.on_change(Rc::new(move |value| sink.borrow_mut().push(value)));

        adapter.set(200.0, false);
        frames.run(3, Duration::from_millis(16));
        let seen_now = seen.borrow().clone();
        assert_eq!(seen_now.len(), 3);
        assert!(seen_now.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(adapter.get(), seen_now[2]);

        adapter.remove_listener(id);
        frames.run(3, Duration::from_millis(16));
        assert_eq!(seen.borrow().len(), 3);
    }
}
