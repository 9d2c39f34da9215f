// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame clock, damping and scroll synchronization for animated pages.
//!
//! `tempo_core` is the platform-independent half of Tempo. It owns the single
//! per-frame timing authority of a page and the engines that hang off it.
//! Browser glue lives in `tempo_backend_web`.
//!
//! # Architecture
//!
//! ```text
//!   FrameSource (rAF, manual)
//!       │ FrameTicker::tick(now)
//!       ▼
//!   FrameClock ──► SmoothedValue ...  (damping)
//!       │
//!       └────────► VirtualScroll ──► ScrollPositionAdapter
//!                        ▲                    │
//!        wheel/touch/key │                    ▼
//!                                   Binding ──► TriggerEngine::update()
//!                                                     ▲
//!   resize / fonts / orientation ──► LayoutRefreshCoordinator
//! ```
//!
//! **[`clock`]**: One [`FrameClock`](clock::FrameClock) multiplexes a frame
//! source across ordered subscribers. An explicit state machine keeps the
//! source running only while there is an unpaused subscriber, the document is
//! visible and motion is not reduced.
//!
//! **[`motion`]**: The reduce-motion preference, readable everywhere and
//! writable only through its [`MotionWriter`](motion::MotionWriter).
//!
//! **[`damping`]**: Frame-rate independent exponential smoothing for scalars
//! and 2D values.
//!
//! **[`scroll`]**: Inertial virtual scroll driven by raw input.
//!
//! **[`adapter`]** and **[`bridge`]**: Make an external scroll-linked trigger
//! engine read the virtual position, with at most one binding per engine
//! that restores the engine's lag smoothing on teardown.
//!
//! **[`refresh`]**: Debounced layout refresh scheduling.
//!
//! **[`time`]**: Host time and durations in microseconds.
//!
//! Logging goes through `tracing`. Nothing here installs a subscriber.

pub mod adapter;
pub mod bridge;
pub mod clock;
pub mod damping;
pub mod ease;
pub mod error;
mod listener;
pub mod motion;
pub mod refresh;
pub mod scroll;
pub mod time;

pub use listener::ListenerId;
