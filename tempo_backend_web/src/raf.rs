// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `requestAnimationFrame` frame source.
//!
//! [`RafFrameSource`] delivers browser animation frames to a
//! [`FrameClock`](tempo_core::clock::FrameClock). Each callback receives a
//! [`DOMHighResTimeStamp`][mdn] (milliseconds on the `performance.now()`
//! timeline), which is converted to microsecond [`HostTime`] ticks.
//!
//! The clock decides when the source runs. Only one frame request is ever
//! outstanding, even if the clock stops and restarts the source from inside a
//! frame callback.
//!
//! [mdn]: https://developer.mozilla.org/en-US/docs/Web/API/DOMHighResTimeStamp

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

use tempo_core::clock::{FrameSource, FrameTicker};
use tempo_core::time::HostTime;

// Direct global bindings instead of `web_sys::Window` methods, so no Window
// or Performance object is fetched on every frame.
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = performance, js_name = "now")]
    pub(crate) fn performance_now() -> f64;

    #[wasm_bindgen(js_name = "requestAnimationFrame")]
    fn request_animation_frame(callback: &JsValue) -> i32;

    #[wasm_bindgen(js_name = "cancelAnimationFrame")]
    fn cancel_animation_frame(id: i32);
}

type RafClosure = Closure<dyn FnMut(f64)>;

struct RafInner {
    /// Registered with every `requestAnimationFrame` call. Created once and
    /// never replaced while the source lives.
    closure: RefCell<Option<RafClosure>>,

    ticker: FrameTicker,

    /// Whether the clock wants frames.
    running: Cell<bool>,

    /// Id of the outstanding request, if any.
    pending: Cell<Option<i32>>,

    frames: Cell<u64>,
}

impl RafInner {
    fn request(&self) {
        if self.pending.get().is_some() {
            return;
        }
        if let Some(closure) = self.closure.borrow().as_ref() {
            let id = request_animation_frame(closure.as_ref().unchecked_ref());
            self.pending.set(Some(id));
        }
    }

    fn on_frame(&self, timestamp_ms: f64) {
        self.pending.set(None);
        if !self.running.get() {
            return;
        }
        self.frames.set(self.frames.get() + 1);
        self.ticker.tick(HostTime::from_millis_f64(timestamp_ms));
        if self.running.get() {
            self.request();
        }
    }
}

/// A [`FrameSource`] backed by `requestAnimationFrame`.
///
/// Pass [`RafFrameSource::new`] as the source factory of
/// [`FrameClock::new`](tempo_core::clock::FrameClock::new).
pub struct RafFrameSource {
    inner: Rc<RafInner>,
}

impl RafFrameSource {
    /// Creates a source delivering frames to `ticker`. It stays idle until
    /// the clock starts it.
    pub fn new(ticker: FrameTicker) -> Self {
        let inner = Rc::new(RafInner {
            closure: RefCell::new(None),
            ticker,
            running: Cell::new(false),
            pending: Cell::new(None),
            frames: Cell::new(0),
        });

        let weak: Weak<RafInner> = Rc::downgrade(&inner);
        let closure = Closure::wrap(Box::new(move |timestamp_ms: f64| {
            if let Some(inner) = weak.upgrade() {
                inner.on_frame(timestamp_ms);
            }
        }) as Box<dyn FnMut(f64)>);
        *inner.closure.borrow_mut() = Some(closure);

        Self { inner }
    }

    /// Returns `true` while frames are requested.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Number of frames delivered so far.
    #[must_use]
    pub fn frames_delivered(&self) -> u64 {
        self.inner.frames.get()
    }
}

impl FrameSource for RafFrameSource {
    fn start(&mut self) {
        if self.inner.running.replace(true) {
            return;
        }
        self.inner.request();
    }

    fn stop(&mut self) {
        self.inner.running.set(false);
        if let Some(id) = self.inner.pending.take() {
            cancel_animation_frame(id);
        }
    }

    fn now(&self) -> HostTime {
        crate::now()
    }
}

impl Drop for RafFrameSource {
    fn drop(&mut self) {
        self.stop();
        // Drop the JS closure so it doesn't leak.
        self.inner.closure.borrow_mut().take();
    }
}

impl core::fmt::Debug for RafFrameSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RafFrameSource")
            .field("running", &self.inner.running.get())
            .field("pending", &self.inner.pending.get())
            .field("frames", &self.inner.frames.get())
            .finish_non_exhaustive()
    }
}
