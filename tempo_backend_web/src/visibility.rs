// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Document visibility watcher.

use wasm_bindgen::prelude::*;
use web_sys::Document;

use tempo_core::clock::{FrameClock, Visibility};

use crate::events::EventListener;

/// Forwards `visibilitychange` to a [`FrameClock`].
#[derive(Debug)]
pub struct VisibilityWatcher {
    _listener: EventListener,
}

impl VisibilityWatcher {
    /// Applies the current visibility to `clock` and follows changes.
    pub fn new(document: &Document, clock: &FrameClock) -> Result<Self, JsValue> {
        clock.set_visibility(visibility_of(document));

        let doc = document.clone();
        let clock = clock.clone();
        let listener = EventListener::new(document, "visibilitychange", move |_| {
            clock.set_visibility(visibility_of(&doc));
        })?;
        Ok(Self {
            _listener: listener,
        })
    }
}

fn visibility_of(document: &Document) -> Visibility {
    if document.hidden() {
        Visibility::Hidden
    } else {
        Visibility::Visible
    }
}
