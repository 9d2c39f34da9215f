// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DOM event listener that unregisters itself on drop.

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{AddEventListenerOptions, Event, EventTarget};

type EventClosure = Closure<dyn FnMut(Event)>;

/// A registered DOM event listener.
///
/// The JS closure lives as long as this value; dropping it removes the
/// listener from its target, so teardown is always safe to repeat.
pub struct EventListener {
    target: EventTarget,
    event: &'static str,
    closure: EventClosure,
}

impl EventListener {
    /// Registers a passive listener for `event` on `target`.
    pub fn new(
        target: &EventTarget,
        event: &'static str,
        callback: impl FnMut(Event) + 'static,
    ) -> Result<Self, JsValue> {
        Self::with_passive(target, event, true, callback)
    }

    /// Registers a listener that may call `preventDefault`.
    pub fn active(
        target: &EventTarget,
        event: &'static str,
        callback: impl FnMut(Event) + 'static,
    ) -> Result<Self, JsValue> {
        Self::with_passive(target, event, false, callback)
    }

    fn with_passive(
        target: &EventTarget,
        event: &'static str,
        passive: bool,
        callback: impl FnMut(Event) + 'static,
    ) -> Result<Self, JsValue> {
        let closure = Closure::wrap(Box::new(callback) as Box<dyn FnMut(Event)>);
        let options = AddEventListenerOptions::new();
        options.set_passive(passive);
        target.add_event_listener_with_callback_and_add_event_listener_options(
            event,
            closure.as_ref().unchecked_ref(),
            &options,
        )?;
        Ok(Self {
            target: target.clone(),
            event,
            closure,
        })
    }

    /// The event type this listener is registered for.
    #[must_use]
    pub fn event(&self) -> &'static str {
        self.event
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        if let Err(err) = self
            .target
            .remove_event_listener_with_callback(self.event, self.closure.as_ref().unchecked_ref())
        {
            tracing::warn!(event = self.event, ?err, "failed to remove event listener");
        }
    }
}

impl core::fmt::Debug for EventListener {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventListener")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}
