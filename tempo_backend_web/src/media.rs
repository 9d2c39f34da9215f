// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `prefers-reduced-motion` media query watcher.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{MediaQueryListEvent, Window};

use tempo_core::motion::{MotionPreference, MotionWriter};

use crate::events::EventListener;

/// Media query matching the system reduce-motion setting.
pub const REDUCED_MOTION_QUERY: &str = "(prefers-reduced-motion: reduce)";

/// Keeps a [`MotionPreference`] in sync with the system setting.
///
/// The initial value is read synchronously at construction. Afterwards the
/// media query's `change` event is the only writer. Dropping the watcher
/// freezes the preference at its last value.
#[derive(Debug)]
pub struct ReducedMotionWatcher {
    preference: MotionPreference,
    _listener: Option<EventListener>,
}

impl ReducedMotionWatcher {
    /// Reads the system preference and starts following its changes.
    ///
    /// Browsers without `matchMedia` support get a constant, non-reduced
    /// preference.
    pub fn new(window: &Window) -> Result<Self, JsValue> {
        let Some(query) = window.match_media(REDUCED_MOTION_QUERY)? else {
            tracing::warn!("matchMedia unavailable; assuming motion is allowed");
            return Ok(Self {
                preference: MotionPreference::constant(false),
                _listener: None,
            });
        };

        let (preference, writer) = MotionPreference::new(query.matches());
        tracing::debug!(reduced = query.matches(), "reduce-motion preference read");
        let listener = EventListener::new(&query, "change", move |event| {
            apply_change(&writer, &event);
        })?;

        Ok(Self {
            preference,
            _listener: Some(listener),
        })
    }

    /// The live preference. Clones observe every later change.
    #[must_use]
    pub fn preference(&self) -> &MotionPreference {
        &self.preference
    }
}

fn apply_change(writer: &MotionWriter, event: &web_sys::Event) {
    if let Some(event) = event.dyn_ref::<MediaQueryListEvent>() {
        writer.update(event.matches());
    }
}
