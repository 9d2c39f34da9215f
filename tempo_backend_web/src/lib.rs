// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Web backend for tempo.
//!
//! This crate connects `tempo_core` to browser APIs:
//!
//! - [`RafFrameSource`]: `requestAnimationFrame` frame source
//! - [`ReducedMotionWatcher`]: `prefers-reduced-motion` media query
//! - [`VisibilityWatcher`]: `visibilitychange` forwarding
//! - [`WindowTimers`]: `setTimeout` timer host
//! - [`LayoutWatcher`]: resize, orientation, font and content-size signals
//! - [`ScrollInput`]: wheel, touch and key capture with native write-back
//!
//! [`WebRuntime`] assembles the always-on pieces. Everything else is opt-in:
//!
//! ```rust,ignore
//! let runtime = WebRuntime::install(&window)?;
//! if let Some(scroll) = VirtualScroll::new(runtime.clock(), ScrollConfig::default())? {
//!     let input = ScrollInput::attach(&window, Rc::new(scroll))?;
//! }
//! ```

mod events;
mod input;
mod layout;
mod media;
mod raf;
mod timers;
mod visibility;

pub use events::EventListener;
pub use input::ScrollInput;
pub use layout::LayoutWatcher;
pub use media::{REDUCED_MOTION_QUERY, ReducedMotionWatcher};
pub use raf::RafFrameSource;
pub use timers::WindowTimers;
pub use visibility::VisibilityWatcher;

use wasm_bindgen::prelude::*;
use web_sys::Window;

use tempo_core::clock::FrameClock;
use tempo_core::motion::MotionPreference;
use tempo_core::time::HostTime;

/// Returns the current host time from `performance.now()`, in microsecond
/// ticks.
#[must_use]
pub fn now() -> HostTime {
    HostTime::from_millis_f64(raf::performance_now())
}

/// The page-wide timing authority: one frame clock fed by
/// `requestAnimationFrame`, gated by the reduce-motion preference and the
/// document's visibility.
#[derive(Debug)]
pub struct WebRuntime {
    clock: FrameClock,
    motion: ReducedMotionWatcher,
    _visibility: VisibilityWatcher,
}

impl WebRuntime {
    /// Reads the motion preference and visibility of `window` and builds the
    /// frame clock.
    pub fn install(window: &Window) -> Result<Self, JsValue> {
        let motion = ReducedMotionWatcher::new(window)?;
        let clock = FrameClock::new(motion.preference(), RafFrameSource::new);
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("window has no document"))?;
        let visibility = VisibilityWatcher::new(&document, &clock)?;
        tracing::debug!(
            reduced = motion.preference().is_reduced(),
            state = ?clock.state(),
            "web runtime installed"
        );
        Ok(Self {
            clock,
            motion,
            _visibility: visibility,
        })
    }

    /// The shared frame clock.
    #[must_use]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// The live reduce-motion preference.
    #[must_use]
    pub fn motion(&self) -> &MotionPreference {
        self.motion.preference()
    }
}
