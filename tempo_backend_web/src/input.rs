// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raw input capture for [`VirtualScroll`].
//!
//! [`ScrollInput`] turns wheel, touch and keyboard events on the window into
//! engine input and writes the virtual offset back to the native scroll
//! position whenever it moves. Native scrolls the engine did not cause
//! (scrollbar drags, fragment navigation, find-in-page) are read back into
//! the engine, and content size changes re-measure the scroll limit.

use std::rc::Rc;

use js_sys::Array;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{Element, Event, KeyboardEvent, ResizeObserver, TouchEvent, WheelEvent, Window};

use tempo_core::ListenerId;
use tempo_core::scroll::{DeltaMode, ScrollKey, ScrollToOptions, VirtualScroll, WheelDelta};

use crate::events::EventListener;

/// Native and virtual offsets closer than this are considered in sync.
/// Browsers round `scrollY` to device pixels.
const RESYNC_TOLERANCE_PX: f64 = 1.0;

type ObserverClosure = Closure<dyn FnMut(Array)>;

/// Wires a [`VirtualScroll`] to the window.
///
/// Dropping it detaches every listener, disconnects the content observer and
/// stops the write-back, leaving the native scroll position where it was.
pub struct ScrollInput {
    window: Window,
    scroll: Rc<VirtualScroll>,
    write_back: ListenerId,
    listeners: Vec<EventListener>,
    observer: Option<(ResizeObserver, ObserverClosure)>,
}

impl ScrollInput {
    /// Attaches input listeners to `window`.
    ///
    /// The engine starts from the current native scroll position and the
    /// current document dimensions. The document body is observed so the
    /// scroll limit follows content that grows after load.
    pub fn attach(window: &Window, scroll: Rc<VirtualScroll>) -> Result<Self, JsValue> {
        measure(window, &scroll)?;
        scroll.scroll_to(window.scroll_y()?, ScrollToOptions::immediate());

        let write_back = {
            let window = window.clone();
            scroll.on_change(move |event| {
                window.scroll_to_with_x_and_y(0.0, event.offset);
            })
        };

        let listeners = vec![
            {
                let scroll = Rc::clone(&scroll);
                EventListener::active(window, "wheel", move |event| on_wheel(&scroll, &event))?
            },
            {
                let scroll = Rc::clone(&scroll);
                EventListener::new(window, "touchstart", move |event| {
                    if let Some(y) = first_touch_y(&event) {
                        scroll.on_touch_start(y);
                    }
                })?
            },
            {
                let scroll = Rc::clone(&scroll);
                EventListener::active(window, "touchmove", move |event| {
                    if let Some(y) = first_touch_y(&event)
                        && scroll.on_touch_move(y)
                    {
                        event.prevent_default();
                    }
                })?
            },
            {
                let scroll = Rc::clone(&scroll);
                EventListener::new(window, "touchend", move |_| {
                    scroll.on_touch_end();
                })?
            },
            {
                let scroll = Rc::clone(&scroll);
                EventListener::active(window, "keydown", move |event| on_key(&scroll, &event))?
            },
            {
                let scroll = Rc::clone(&scroll);
                let win = window.clone();
                EventListener::new(window, "resize", move |_| remeasure(&win, &scroll))?
            },
            {
                let scroll = Rc::clone(&scroll);
                let win = window.clone();
                EventListener::new(window, "scroll", move |_| {
                    let Ok(native) = win.scroll_y() else {
                        return;
                    };
                    if let Some(offset) =
                        native_resync(native, scroll.offset(), scroll.is_scrolling())
                    {
                        scroll.scroll_to(offset, ScrollToOptions::immediate());
                    }
                })?
            },
        ];

        let observer = match content_root(window) {
            Some(element) => Some(observe_content(window, &element, &scroll)?),
            None => {
                tracing::warn!("no document body; scroll limit follows window resizes only");
                None
            }
        };

        Ok(Self {
            window: window.clone(),
            scroll,
            write_back,
            listeners,
            observer,
        })
    }

    /// The driven engine.
    #[must_use]
    pub fn scroll(&self) -> &Rc<VirtualScroll> {
        &self.scroll
    }

    /// Re-reads viewport and content heights, e.g. after a layout refresh.
    pub fn measure(&self) -> Result<(), JsValue> {
        measure(&self.window, &self.scroll)
    }
}

impl Drop for ScrollInput {
    fn drop(&mut self) {
        if let Some((observer, _closure)) = self.observer.take() {
            observer.disconnect();
        }
        self.scroll.remove_listener(self.write_back);
    }
}

impl core::fmt::Debug for ScrollInput {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScrollInput")
            .field("scroll", &self.scroll)
            .field("write_back", &self.write_back)
            .field("listeners", &self.listeners.len())
            .field("observing_content", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

fn measure(window: &Window, scroll: &VirtualScroll) -> Result<(), JsValue> {
    let viewport = window.inner_height()?.as_f64().unwrap_or(0.0);
    let content = window
        .document()
        .and_then(|document| document.document_element())
        .map_or(0.0, |root| f64::from(root.scroll_height()));
    scroll.set_dimensions(viewport, content);
    Ok(())
}

fn remeasure(window: &Window, scroll: &VirtualScroll) {
    if let Err(err) = measure(window, scroll) {
        tracing::warn!(?err, "failed to measure scroll dimensions");
    }
}

fn content_root(window: &Window) -> Option<Element> {
    let document = window.document()?;
    document
        .body()
        .map(Element::from)
        .or_else(|| document.document_element())
}

fn observe_content(
    window: &Window,
    element: &Element,
    scroll: &Rc<VirtualScroll>,
) -> Result<(ResizeObserver, ObserverClosure), JsValue> {
    let window = window.clone();
    let scroll = Rc::downgrade(scroll);
    let closure = Closure::wrap(Box::new(move |_entries: Array| {
        if let Some(scroll) = scroll.upgrade() {
            remeasure(&window, &scroll);
        }
    }) as Box<dyn FnMut(Array)>);

    let observer = ResizeObserver::new(closure.as_ref().unchecked_ref())?;
    observer.observe(element);
    Ok((observer, closure))
}

/// Returns the offset to adopt when the native position moved without the
/// engine, or `None` while the engine is animating or already in sync.
pub(crate) fn native_resync(native: f64, offset: f64, scrolling: bool) -> Option<f64> {
    if scrolling || !native.is_finite() || (native - offset).abs() < RESYNC_TOLERANCE_PX {
        None
    } else {
        Some(native)
    }
}

fn on_wheel(scroll: &VirtualScroll, event: &Event) {
    let Some(wheel) = event.dyn_ref::<WheelEvent>() else {
        return;
    };
    // Pinch zoom arrives as ctrl+wheel.
    if wheel.ctrl_key() {
        return;
    }
    let delta = WheelDelta {
        dy: wheel.delta_y(),
        mode: delta_mode_from_dom(wheel.delta_mode()),
    };
    if scroll.on_wheel(delta) {
        event.prevent_default();
    }
}

fn on_key(scroll: &VirtualScroll, event: &Event) {
    let Some(key) = event.dyn_ref::<KeyboardEvent>() else {
        return;
    };
    if key.default_prevented() || key.ctrl_key() || key.alt_key() || key.meta_key() {
        return;
    }
    if event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok())
        .is_some_and(|element| is_editable(&element.tag_name()))
    {
        return;
    }
    let Some(key) = key_from_dom(&key.key(), key.shift_key()) else {
        return;
    };
    if scroll.on_key(key) {
        event.prevent_default();
    }
}

fn first_touch_y(event: &Event) -> Option<f64> {
    let touch = event.dyn_ref::<TouchEvent>()?.touches().get(0)?;
    Some(f64::from(touch.client_y()))
}

/// Maps `WheelEvent.deltaMode` to a [`DeltaMode`]. Unknown values are treated
/// as pixels.
pub(crate) fn delta_mode_from_dom(mode: u32) -> DeltaMode {
    match mode {
        WheelEvent::DOM_DELTA_LINE => DeltaMode::Line,
        WheelEvent::DOM_DELTA_PAGE => DeltaMode::Page,
        _ => DeltaMode::Pixel,
    }
}

/// Maps a `KeyboardEvent.key` value to a [`ScrollKey`].
pub(crate) fn key_from_dom(key: &str, shift: bool) -> Option<ScrollKey> {
    Some(match key {
        "ArrowUp" => ScrollKey::ArrowUp,
        "ArrowDown" => ScrollKey::ArrowDown,
        "PageUp" => ScrollKey::PageUp,
        "PageDown" => ScrollKey::PageDown,
        " " | "Spacebar" if shift => ScrollKey::ShiftSpace,
        " " | "Spacebar" => ScrollKey::Space,
        "Home" => ScrollKey::Home,
        "End" => ScrollKey::End,
        _ => return None,
    })
}

fn is_editable(tag_name: &str) -> bool {
    matches!(
        tag_name.to_ascii_uppercase().as_str(),
        "INPUT" | "TEXTAREA" | "SELECT"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_modes_follow_dom_constants() {
        assert_eq!(delta_mode_from_dom(0), DeltaMode::Pixel);
        assert_eq!(delta_mode_from_dom(1), DeltaMode::Line);
        assert_eq!(delta_mode_from_dom(2), DeltaMode::Page);
        assert_eq!(delta_mode_from_dom(7), DeltaMode::Pixel);
    }

    #[test]
    fn navigation_keys_are_mapped() {
        assert_eq!(key_from_dom("ArrowDown", false), Some(ScrollKey::ArrowDown));
        assert_eq!(key_from_dom("PageUp", true), Some(ScrollKey::PageUp));
        assert_eq!(key_from_dom(" ", false), Some(ScrollKey::Space));
        assert_eq!(key_from_dom(" ", true), Some(ScrollKey::ShiftSpace));
        assert_eq!(key_from_dom("End", false), Some(ScrollKey::End));
        assert_eq!(key_from_dom("a", false), None);
        assert_eq!(key_from_dom("Tab", false), None);
    }

    #[test]
    fn native_scroll_is_adopted_only_when_idle_and_apart() {
        assert_eq!(native_resync(1_200.0, 300.0, false), Some(1_200.0));
        assert_eq!(native_resync(0.0, 850.0, false), Some(0.0));
        assert_eq!(native_resync(1_200.0, 300.0, true), None, "engine is animating");
        assert_eq!(native_resync(300.4, 300.0, false), None, "device pixel rounding");
        assert_eq!(native_resync(f64::NAN, 300.0, false), None);
    }

    #[test]
    fn form_fields_keep_their_keys() {
        assert!(is_editable("INPUT"));
        assert!(is_editable("textarea"));
        assert!(!is_editable("DIV"));
    }
}
