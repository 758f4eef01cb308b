// src/engine/speed_filter.rs
//
// Rolling speed window with IQR outlier rejection. Averages only the top
// of the surviving samples, so genuine acceleration shows up quickly while
// single GPS spikes are dropped.

use std::collections::VecDeque;
use tracing::trace;

/// Number of raw speeds kept in the window
pub const SPEED_WINDOW: usize = 6;

/// Below this many samples no outlier rejection is attempted
const MIN_SAMPLES_FOR_IQR: usize = 4;

/// Multiplier on the inter-quartile range for the outlier fences
const IQR_FENCE: f32 = 1.5;

/// How many of the highest survivors get averaged
const TAIL_LEN: usize = 3;

#[derive(Debug, Clone)]
pub struct SpeedFilter {
    samples: VecDeque<f32>,
}

impl Default for SpeedFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeedFilter {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(SPEED_WINDOW + 1),
        }
    }

    /// Record a raw speed, evicting the oldest beyond the window.
    pub fn push(&mut self, speed: f32) {
        self.samples.push_back(speed);
        if self.samples.len() > SPEED_WINDOW {
            self.samples.pop_front();
        }
    }

    /// Smoothed speed, or `None` before the first push.
    ///
    /// The raw window is left untouched; a rejected value may be a real jump
    /// and still takes part in later quartile calculations.
    pub fn average(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<f32> = self.samples.iter().copied().collect();
        sorted.sort_by(f32::total_cmp);

        let survivors = reject_outliers(&sorted);

        let tail = &survivors[survivors.len().saturating_sub(TAIL_LEN)..];
        Some(tail.iter().sum::<f32>() / tail.len() as f32)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Trim values outside the IQR fences from both ends of a sorted slice.
///
/// The quartile values bound the fences, so the result is never empty.
fn reject_outliers(sorted: &[f32]) -> &[f32] {
    let n = sorted.len();
    if n < MIN_SAMPLES_FOR_IQR {
        return sorted;
    }

    let q1 = sorted[n / 4];
    let q3 = sorted[3 * n / 4];
    let fence = IQR_FENCE * (q3 - q1);
    let (low, high) = (q1 - fence, q3 + fence);

    let start = sorted.iter().take_while(|&&v| v < low).count();
    let end = n - sorted.iter().rev().take_while(|&&v| v > high).count();

    if start > 0 || end < n {
        trace!(
            "Rejected {} low / {} high outliers (fences {:.2}..{:.2})",
            start,
            n - end,
            low,
            high
        );
    }

    &sorted[start..end]
}
