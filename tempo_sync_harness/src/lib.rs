// Copyright 2026 the Tempo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pin-drift metrics and grading for virtual scroll harnesses.
//!
//! Pin drift is the distance between the virtual scroll offset and the
//! position a trigger engine last computed from. Any non-zero value shows up
//! as pinned elements jumping. [`DriftTracker`] grades a rolling window of
//! samples for HUD display.

use tempo_core::clock::FrameTime;

/// Drift at or above this many pixels counts as a drifted frame.
pub const DRIFT_TOLERANCE_PX: f64 = 1.0;

/// Frame deltas at or above this many milliseconds (two 60 Hz frames) count
/// as long frames.
pub const LONG_FRAME_MS: f64 = 2.0 * 1000.0 / 60.0;

/// Per-frame sample fed into [`DriftTracker::observe`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriftSample {
    /// Virtual offset minus the trigger engine's observed offset, in pixels.
    pub drift_px: f64,
    /// Frame delta in milliseconds.
    pub frame_delta_ms: f64,
    /// Whether a pinned element is on screen this frame.
    pub pinned: bool,
}

impl DriftSample {
    /// Builds a sample from a clock tick and the two positions.
    #[must_use]
    pub fn from_frame(time: &FrameTime, virtual_offset: f64, observed: f64, pinned: bool) -> Self {
        Self {
            drift_px: virtual_offset - observed,
            frame_delta_ms: time.delta.as_millis_f64(),
            pinned,
        }
    }
}

/// Letter grade for scroll synchronization quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriftGrade {
    /// No visible drift.
    A,
    /// Occasional sub-pixel to pixel drift.
    B,
    /// Visible but bounded drift.
    C,
    /// Pins visibly jump.
    D,
}

impl DriftGrade {
    /// Returns a short label for HUD rendering.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Aggregated report returned by [`DriftTracker::observe`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriftReport {
    /// Current grade.
    pub grade: DriftGrade,
    /// Drifted frames per 1000 observed frames.
    pub drift_rate_per_1000: f64,
    /// Current frame's signed drift in pixels.
    pub drift_px: f64,
    /// Largest absolute drift seen so far.
    pub max_drift_px: f64,
    /// Total frames observed.
    pub total_frames: u64,
    /// Frames whose drift reached [`DRIFT_TOLERANCE_PX`].
    pub drifted_frames: u64,
    /// Frames whose delta reached [`LONG_FRAME_MS`].
    pub long_frames: u64,
    /// Drifted frames that were also long frames. Drift that only shows up
    /// on long frames points at frame pacing rather than the binding.
    pub drifted_long_frames: u64,
}

/// Rolling drift tracker with a fixed-size history of absolute drift.
///
/// The history must hold at least one sample:
///
/// ```rust,compile_fail
/// let _ = tempo_sync_harness::DriftTracker::<0>::new();
/// ```
#[derive(Debug)]
pub struct DriftTracker<const N: usize> {
    drift_px: [f64; N],
    cursor: usize,
    total_frames: u64,
    drifted_frames: u64,
    long_frames: u64,
    drifted_long_frames: u64,
    max_drift_px: f64,
}

impl<const N: usize> Default for DriftTracker<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DriftTracker<N> {
    /// Creates an empty tracker.
    #[must_use]
    pub const fn new() -> Self {
        const { assert!(N > 0, "DriftTracker needs a history of at least one sample") };
        Self {
            drift_px: [0.0; N],
            cursor: 0,
            total_frames: 0,
            drifted_frames: 0,
            long_frames: 0,
            drifted_long_frames: 0,
            max_drift_px: 0.0,
        }
    }

    /// Observes one frame and returns an updated report.
    #[must_use]
    pub fn observe(&mut self, sample: DriftSample) -> DriftReport {
        let magnitude = sample.drift_px.abs();
        self.total_frames = self.total_frames.saturating_add(1);
        self.drift_px[self.cursor] = magnitude;
        self.cursor = (self.cursor + 1) % N;
        self.max_drift_px = self.max_drift_px.max(magnitude);

        let drifted = magnitude >= DRIFT_TOLERANCE_PX;
        let long = sample.frame_delta_ms >= LONG_FRAME_MS;
        if drifted {
            self.drifted_frames = self.drifted_frames.saturating_add(1);
        }
        if long {
            self.long_frames = self.long_frames.saturating_add(1);
        }
        if drifted && long {
            self.drifted_long_frames = self.drifted_long_frames.saturating_add(1);
        }

        let drift_rate = self.drifted_frames as f64 * 1000.0 / self.total_frames as f64;

        DriftReport {
            grade: grade_for(sample.pinned, magnitude, drift_rate),
            drift_rate_per_1000: drift_rate,
            drift_px: sample.drift_px,
            max_drift_px: self.max_drift_px,
            total_frames: self.total_frames,
            drifted_frames: self.drifted_frames,
            long_frames: self.long_frames,
            drifted_long_frames: self.drifted_long_frames,
        }
    }

    /// Returns the absolute drift history oldest to newest.
    #[must_use]
    pub fn history(&self) -> [f64; N] {
        core::array::from_fn(|i| self.drift_px[(self.cursor + i) % N])
    }

    /// Returns an ASCII sparkline over [`history`](Self::history), with
    /// `max_px` mapping to the tallest glyph.
    #[must_use]
    pub fn sparkline_ascii(&self, max_px: f64) -> String {
        const LEVELS: &[u8] = b" .:-=+*#%@";
        self.history()
            .iter()
            .map(|&px| {
                let t = if max_px > 0.0 {
                    (px / max_px).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "index is clamped to ASCII level count"
                )]
                let level = (t * (LEVELS.len() as f64 - 1.0) + 0.5) as usize;
                char::from(LEVELS[level])
            })
            .collect()
    }
}

fn grade_for(pinned: bool, drift_abs_px: f64, drift_rate_per_1000: f64) -> DriftGrade {
    // Pinned elements get stricter thresholds.
    let (a_px, b_px, c_px, a_rate, b_rate, c_rate) = if pinned {
        (0.5, 1.0, 2.0, 5.0, 20.0, 60.0)
    } else {
        (1.0, 2.0, 4.0, 10.0, 40.0, 100.0)
    };

    if drift_abs_px < a_px && drift_rate_per_1000 < a_rate {
        DriftGrade::A
    } else if drift_abs_px < b_px && drift_rate_per_1000 < b_rate {
        DriftGrade::B
    } else if drift_abs_px < c_px && drift_rate_per_1000 < c_rate {
        DriftGrade::C
    } else {
        DriftGrade::D
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_core::time::Duration;

    fn sample(drift_px: f64, pinned: bool) -> DriftSample {
        DriftSample {
            drift_px,
            frame_delta_ms: 16.7,
            pinned,
        }
    }

    #[test]
    fn drift_rate_accumulates() {
        let mut t = DriftTracker::<8>::new();
        let mut last = None;
        for i in 0..10 {
            last = Some(t.observe(sample(if i < 2 { 3.0 } else { 0.0 }, false)));
        }
        let report = last.unwrap();
        assert!((report.drift_rate_per_1000 - 200.0).abs() < 1e-6);
        assert_eq!(report.drifted_frames, 2);
        assert_eq!(report.max_drift_px, 3.0);
    }

    #[test]
    fn pinned_thresholds_are_stricter() {
        let mut t = DriftTracker::<4>::new();
        assert_eq!(t.observe(sample(0.7, true)).grade, DriftGrade::B);
        let mut t = DriftTracker::<4>::new();
        assert_eq!(t.observe(sample(0.7, false)).grade, DriftGrade::A);
    }

    #[test]
    fn negative_drift_grades_by_magnitude() {
        let mut t = DriftTracker::<4>::new();
        let report = t.observe(sample(-5.0, false));
        assert_eq!(report.grade, DriftGrade::D);
        assert_eq!(report.drift_px, -5.0);
        assert_eq!(report.grade.as_str(), "D");
    }

    #[test]
    fn history_is_oldest_first() {
        let mut t = DriftTracker::<3>::new();
        for px in [1.0, 2.0, 3.0, 4.0] {
            let _ = t.observe(sample(px, false));
        }
        assert_eq!(t.history(), [2.0, 3.0, 4.0]);
        assert_eq!(t.sparkline_ascii(4.0), "+#@");
    }

    #[test]
    fn long_frames_are_counted_from_frame_delta() {
        let mut t = DriftTracker::<4>::new();
        let mut frame = |drift_px, frame_delta_ms| {
            t.observe(DriftSample {
                drift_px,
                frame_delta_ms,
                pinned: false,
            })
        };
        let _ = frame(0.0, 16.7);
        let _ = frame(2.0, 16.7);
        let _ = frame(0.0, 50.0);
        let report = frame(3.0, 40.0);
        assert_eq!(report.long_frames, 2);
        assert_eq!(report.drifted_frames, 2);
        assert_eq!(report.drifted_long_frames, 1);
    }

    #[test]
    fn single_slot_history_keeps_latest() {
        let mut t = DriftTracker::<1>::new();
        let _ = t.observe(sample(1.0, false));
        let _ = t.observe(sample(-2.5, false));
        assert_eq!(t.history(), [2.5]);
    }

    #[test]
    fn sample_from_frame_uses_clock_delta() {
        let time = FrameTime {
            delta: Duration::from_millis(16),
            elapsed: Duration::from_millis(160),
            frame_index: 10,
        };
        let s = DriftSample::from_frame(&time, 120.0, 118.5, true);
        assert_eq!(s.drift_px, 1.5);
        assert_eq!(s.frame_delta_ms, 16.0);
        assert!(s.pinned);
    }
}
