// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Construction-time errors.
//!
//! Runtime faults (failing subscribers, late refreshes) are absorbed where
//! they happen and never surface as errors. Only invalid configuration and
//! conflicting bindings are reported, and only when the value is built.

use thiserror::Error;

/// Rejected configuration value.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// A smoothing coefficient outside the open interval (0, 1).
    #[error("smoothing coefficient {0} is outside (0, 1)")]
    Coefficient(f64),
    /// A settle threshold that is zero, negative or NaN.
    #[error("settle threshold {0} must be positive")]
    Threshold(f64),
    /// A scroll lerp factor outside the open interval (0, 1).
    #[error("scroll lerp factor {0} is outside (0, 1)")]
    Lerp(f64),
    /// An input multiplier or step that is negative or not finite.
    #[error("{name} must be finite and non-negative, got {value}")]
    Scale {
        /// Which field was rejected.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// A scroll-trigger binding could not be established.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum BindError {
    /// Another binding is already driving this trigger engine.
    #[error("trigger engine already has an active binding")]
    AlreadyBound,
}
