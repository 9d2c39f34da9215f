// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding a scroll-linked trigger engine to a virtual scroll position.
//!
//! While bound, the trigger engine reads the position from a
//! [`ScrollPositionAdapter`] instead of the native scroller, recomputes
//! whenever that position changes, and has its own lag smoothing switched
//! off so the virtual scroll engine is the only timing authority.
//!
//! Only one binding can drive an engine at a time. [`ScrollTriggerBridge::bind`]
//! consumes the bridge and hands it back from [`Binding::unbind`], and the
//! engine itself is claimed for the lifetime of the binding, so a second
//! bridge built over another `Rc` to the same engine is refused with
//! [`BindError::AlreadyBound`]. Teardown lives in `Drop`, so the engine's
//! prior lag smoothing is restored even when a binding is dropped during
//! unwinding.

use std::cell::RefCell;
use std::rc::Rc;

use crate::adapter::ScrollPositionAdapter;
use crate::error::BindError;
use crate::listener::ListenerId;
use crate::refresh::RefreshTarget;
use crate::time::Duration;

/// A trigger engine's lag compensation settings.
///
/// When a frame takes longer than `threshold`, the engine pretends only
/// `adjusted_lag` passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LagSmoothing {
    /// Frame time that counts as a lag spike. Zero disables compensation.
    pub threshold: Duration,
    /// Frame time substituted for a spike.
    pub adjusted_lag: Duration,
}

impl LagSmoothing {
    /// No lag compensation.
    pub const DISABLED: Self = Self {
        threshold: Duration::ZERO,
        adjusted_lag: Duration::ZERO,
    };

    /// Returns `true` if compensation is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.threshold.is_zero()
    }
}

impl Default for LagSmoothing {
    fn default() -> Self {
        Self {
            threshold: Duration::from_millis(500),
            adjusted_lag: Duration::from_millis(33),
        }
    }
}

/// The scroll-linked trigger engine being driven.
pub trait TriggerEngine: RefreshTarget {
    /// Current lag compensation.
    fn lag_smoothing(&self) -> LagSmoothing;

    /// Replaces lag compensation.
    fn set_lag_smoothing(&self, settings: LagSmoothing);

    /// Installs or removes the position source that replaces native scroll.
    fn set_scroller_proxy(&self, proxy: Option<Rc<dyn ScrollPositionAdapter>>);

    /// Recomputes trigger state from the current position.
    fn update(&self);
}

thread_local! {
    /// Addresses of engines that currently have a live [`Binding`].
    static CLAIMED: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Claims `key`, returning `false` if it is already claimed.
fn claim(key: usize) -> bool {
    CLAIMED.with(|claimed| {
        let mut claimed = claimed.borrow_mut();
        if claimed.contains(&key) {
            false
        } else {
            claimed.push(key);
            true
        }
    })
}

fn release(key: usize) {
    // Thread-local storage may already be gone during thread teardown.
    let _ = CLAIMED.try_with(|claimed| claimed.borrow_mut().retain(|&k| k != key));
}

/// An unbound bridge owning access to one trigger engine.
#[derive(Debug)]
pub struct ScrollTriggerBridge<E: TriggerEngine + 'static> {
    engine: Rc<E>,
}

impl<E: TriggerEngine + 'static> ScrollTriggerBridge<E> {
    /// Creates a bridge for `engine`.
    pub fn new(engine: Rc<E>) -> Self {
        Self { engine }
    }

    /// The driven engine.
    #[must_use]
    pub fn engine(&self) -> &Rc<E> {
        &self.engine
    }

    /// Returns `true` while some [`Binding`] drives this bridge's engine.
    #[must_use]
    pub fn is_engine_bound(&self) -> bool {
        let key = engine_key(&self.engine);
        CLAIMED.with(|claimed| claimed.borrow().contains(&key))
    }

    /// Makes `adapter` the engine's source of truth.
    ///
    /// Installs the proxy, forwards every position change to
    /// [`TriggerEngine::update`], and disables lag smoothing until the
    /// binding is torn down.
    ///
    /// Fails with [`BindError::AlreadyBound`] without touching the engine if
    /// another binding is already driving it.
    pub fn bind(self, adapter: Rc<dyn ScrollPositionAdapter>) -> Result<Binding<E>, BindError> {
        let engine = self.engine;
        let key = engine_key(&engine);
        if !claim(key) {
            tracing::debug!("scroll trigger bridge refused: engine already bound");
            return Err(BindError::AlreadyBound);
        }
        let restore = engine.lag_smoothing();
        engine.set_scroller_proxy(Some(Rc::clone(&adapter)));

        let weak = Rc::downgrade(&engine);
        let listener = adapter.on_change(Rc::new(move |_| {
            if let Some(engine) = weak.upgrade() {
                engine.update();
            }
        }));

        engine.set_lag_smoothing(LagSmoothing::DISABLED);
        tracing::debug!(?restore, "scroll trigger bridge bound");
        engine.refresh();

        Ok(Binding {
            engine,
            adapter,
            listener,
            restore,
            key,
        })
    }
}

fn engine_key<E>(engine: &Rc<E>) -> usize {
    Rc::as_ptr(engine).addr()
}

/// An active binding. Dropping it tears the binding down.
#[must_use = "dropping a Binding unbinds it immediately"]
pub struct Binding<E: TriggerEngine + 'static> {
    engine: Rc<E>,
    adapter: Rc<dyn ScrollPositionAdapter>,
    listener: ListenerId,
    restore: LagSmoothing,
    key: usize,
}

impl<E: TriggerEngine + 'static> Binding<E> {
    /// The driven engine.
    #[must_use]
    pub fn engine(&self) -> &Rc<E> {
        &self.engine
    }

    /// The bound position source.
    #[must_use]
    pub fn adapter(&self) -> &Rc<dyn ScrollPositionAdapter> {
        &self.adapter
    }

    /// Lag smoothing that teardown will restore.
    #[must_use]
    pub fn saved_lag_smoothing(&self) -> LagSmoothing {
        self.restore
    }

    /// Tears down the binding and returns the bridge for rebinding.
    pub fn unbind(self) -> ScrollTriggerBridge<E> {
        ScrollTriggerBridge {
            engine: Rc::clone(&self.engine),
        }
    }
}

impl<E: TriggerEngine + 'static> Drop for Binding<E> {
    fn drop(&mut self) {
        self.adapter.remove_listener(self.listener);
        self.engine.set_scroller_proxy(None);
        self.engine.set_lag_smoothing(self.restore);
        release(self.key);
        tracing::debug!(restored = ?self.restore, "scroll trigger bridge unbound");
    }
}

impl<E: TriggerEngine + 'static> core::fmt::Debug for Binding<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Binding")
            .field("listener", &self.listener)
            .field("restore", &self.restore)
            .field("position", &self.adapter.get())
            .finish_non_exhaustive()
    }
}
