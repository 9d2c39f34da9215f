// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layout mutation signals feeding a [`LayoutRefreshCoordinator`].

use std::rc::{Rc, Weak};

use js_sys::Array;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{Element, ResizeObserver, ResizeObserverEntry, Window};

use tempo_core::refresh::{LayoutRefreshCoordinator, RefreshReason};

use crate::events::EventListener;

type ObserverClosure = Closure<dyn FnMut(Array)>;

/// Listens for resizes, orientation changes, font loading and content size
/// changes, and schedules refreshes for each.
///
/// Dropping the watcher removes every listener and disconnects the size
/// observer. Pending timers belong to the coordinator and are cancelled when
/// it is dropped.
pub struct LayoutWatcher {
    _resize: EventListener,
    _orientation: EventListener,
    observer: Option<(ResizeObserver, ObserverClosure)>,
}

impl LayoutWatcher {
    /// Attaches to `window`, observing `content` for size changes if given.
    pub fn attach(
        window: &Window,
        content: Option<&Element>,
        coordinator: &Rc<LayoutRefreshCoordinator>,
    ) -> Result<Self, JsValue> {
        let resize = {
            let coordinator = Rc::downgrade(coordinator);
            EventListener::new(window, "resize", move |_| {
                schedule(&coordinator, RefreshReason::WindowResize);
            })?
        };
        let orientation = {
            let coordinator = Rc::downgrade(coordinator);
            EventListener::new(window, "orientationchange", move |_| {
                schedule(&coordinator, RefreshReason::OrientationChange);
            })?
        };

        watch_fonts(window, coordinator);

        let observer = match content {
            Some(element) => Some(observe_content(element, coordinator)?),
            None => None,
        };

        Ok(Self {
            _resize: resize,
            _orientation: orientation,
            observer,
        })
    }
}

impl Drop for LayoutWatcher {
    fn drop(&mut self) {
        if let Some((observer, _closure)) = self.observer.take() {
            observer.disconnect();
        }
    }
}

impl core::fmt::Debug for LayoutWatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayoutWatcher")
            .field("observing_content", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

fn schedule(coordinator: &Weak<LayoutRefreshCoordinator>, reason: RefreshReason) {
    if let Some(coordinator) = coordinator.upgrade() {
        coordinator.schedule_refresh(reason);
    }
}

/// Schedules a [`RefreshReason::FontsReady`] once `document.fonts.ready`
/// resolves.
fn watch_fonts(window: &Window, coordinator: &Rc<LayoutRefreshCoordinator>) {
    let ready = window
        .document()
        .map(|document| document.fonts())
        .map(|fonts| fonts.ready());
    let promise = match ready {
        Some(Ok(promise)) => promise,
        Some(Err(err)) => {
            tracing::warn!(?err, "document.fonts.ready unavailable");
            return;
        }
        None => {
            tracing::warn!("no document; font readiness not tracked");
            return;
        }
    };

    let coordinator = Rc::downgrade(coordinator);
    let on_ready = Closure::wrap(Box::new(move |_: JsValue| {
        schedule(&coordinator, RefreshReason::FontsReady);
    }) as Box<dyn FnMut(JsValue)>);
    let _ = promise.then(&on_ready);
    // Leaked: `fonts.ready` settles once per document and may outlive us.
    on_ready.forget();
}

fn observe_content(
    element: &Element,
    coordinator: &Rc<LayoutRefreshCoordinator>,
) -> Result<(ResizeObserver, ObserverClosure), JsValue> {
    let coordinator = Rc::downgrade(coordinator);
    let closure = Closure::wrap(Box::new(move |entries: Array| {
        let height = entries
            .iter()
            .filter_map(|entry| entry.dyn_into::<ResizeObserverEntry>().ok())
            .map(|entry| entry.content_rect().height())
            .next_back();
        if let Some(height) = height {
            schedule(&coordinator, RefreshReason::ContentResize { height });
        }
    }) as Box<dyn FnMut(Array)>);

    let observer = ResizeObserver::new(closure.as_ref().unchecked_ref())?;
    observer.observe(element);
    Ok((observer, closure))
}
