// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `setTimeout` timer host.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::Window;

use tempo_core::refresh::{TimerHost, TimerId};
use tempo_core::time::Duration;

type TimeoutClosure = Closure<dyn FnMut()>;

#[derive(Default)]
struct TimersInner {
    next_id: Cell<u64>,
    /// Browser handle and closure of each pending timeout.
    live: RefCell<BTreeMap<TimerId, (i32, TimeoutClosure)>>,
    /// Closures that already ran. A closure cannot be freed while it is
    /// executing, so these are dropped on the next call into the host.
    spent: RefCell<Vec<TimeoutClosure>>,
}

impl TimersInner {
    fn reap(&self) {
        self.spent.borrow_mut().clear();
    }
}

/// A [`TimerHost`] backed by `window.setTimeout`.
///
/// Clones share their pending timeouts. Dropping the last clone clears every
/// timeout still pending.
#[derive(Clone)]
pub struct WindowTimers {
    window: Window,
    inner: Rc<TimersInner>,
}

impl WindowTimers {
    /// Creates a timer host on `window`.
    #[must_use]
    pub fn new(window: &Window) -> Self {
        Self {
            window: window.clone(),
            inner: Rc::new(TimersInner::default()),
        }
    }

    /// Number of timeouts waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.live.borrow().len()
    }
}

impl TimerHost for WindowTimers {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        self.inner.reap();
        let id = TimerId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);

        let weak = Rc::downgrade(&self.inner);
        let mut callback = Some(callback);
        let closure = Closure::wrap(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                let entry = inner.live.borrow_mut().remove(&id);
                if let Some((_, closure)) = entry {
                    inner.spent.borrow_mut().push(closure);
                }
            }
            if let Some(callback) = callback.take() {
                callback();
            }
        }) as Box<dyn FnMut()>);

        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                timeout_millis(delay),
            ) {
            Ok(handle) => {
                self.inner.live.borrow_mut().insert(id, (handle, closure));
            }
            Err(err) => {
                tracing::warn!(?err, "setTimeout failed; timeout dropped");
            }
        }
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        self.inner.reap();
        let entry = self.inner.live.borrow_mut().remove(&id);
        if let Some((handle, _closure)) = entry {
            self.window.clear_timeout_with_handle(handle);
        }
    }
}

impl Drop for TimersInner {
    fn drop(&mut self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        for (handle, _) in self.live.get_mut().values() {
            window.clear_timeout_with_handle(*handle);
        }
    }
}

impl core::fmt::Debug for WindowTimers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WindowTimers")
            .field("pending", &self.pending())
            .field("next_id", &self.inner.next_id.get())
            .finish_non_exhaustive()
    }
}

/// Converts a delay to the whole milliseconds `setTimeout` expects,
/// rounding up and saturating at `i32::MAX`.
pub(crate) fn timeout_millis(delay: Duration) -> i32 {
    let millis = delay.ticks().div_ceil(1_000);
    i32::try_from(millis).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_round_up_to_whole_millis() {
        assert_eq!(timeout_millis(Duration::ZERO), 0);
        assert_eq!(timeout_millis(Duration(1)), 1);
        assert_eq!(timeout_millis(Duration::from_millis(150)), 150);
        assert_eq!(timeout_millis(Duration(150_001)), 151);
    }

    #[test]
    fn huge_delays_saturate() {
        assert_eq!(timeout_millis(Duration(u64::MAX)), i32::MAX);
    }
}
