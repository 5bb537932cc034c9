//! Sliding heart-rate window
//!
//! Keeps the recent heart-rate samples of a session together with their
//! minimum, maximum and mean. Eviction is single-step: each append drops at
//! most the current oldest sample, even if the window still spans more than
//! its configured length afterwards.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One heart-rate reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartSample {
    /// Heart rate in beats per minute
    pub value: u32,
    /// Monotonic timestamp in seconds
    pub timestamp: f64,
}

/// Time-bounded buffer of heart-rate samples with running statistics
#[derive(Debug, Clone)]
pub struct HeartRateWindow {
    samples: VecDeque<HeartSample>,
    time_length: f64,
    min: Option<u32>,
    max: Option<u32>,
    mean: Option<f64>,
}

impl HeartRateWindow {
    /// Create an empty window covering `time_length` seconds
    pub fn new(time_length: f64) -> Self {
        Self {
            samples: VecDeque::new(),
            time_length,
            min: None,
            max: None,
            mean: None,
        }
    }

    /// Add a sample, evict at most one stale sample and refresh statistics
    ///
    /// The oldest sample is dropped when the span from it to the new sample
    /// exceeds the window length.
    pub fn append(&mut self, value: u32, timestamp: f64) {
        self.samples.push_back(HeartSample { value, timestamp });

        if let Some(oldest) = self.samples.front() {
            if timestamp - oldest.timestamp > self.time_length {
                self.samples.pop_front();
            }
        }

        self.recompute();
    }

    fn recompute(&mut self) {
        self.min = self.samples.iter().map(|s| s.value).min();
        self.max = self.samples.iter().map(|s| s.value).max();
        self.mean = if self.samples.is_empty() {
            None
        } else {
            let sum: u64 = self.samples.iter().map(|s| s.value as u64).sum();
            Some(sum as f64 / self.samples.len() as f64)
        };
    }

    /// True until the first append
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Configured window length in seconds
    pub fn time_length(&self) -> f64 {
        self.time_length
    }

    pub fn min(&self) -> Option<u32> {
        self.min
    }

    pub fn max(&self) -> Option<u32> {
        self.max
    }

    pub fn mean(&self) -> Option<f64> {
        self.mean
    }

    /// Time between the oldest and newest sample (0 when empty)
    pub fn span(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(oldest), Some(newest)) => newest.timestamp - oldest.timestamp,
            _ => 0.0,
        }
    }

    /// Samples in insertion order
    pub fn samples(&self) -> impl Iterator<Item = &HeartSample> + '_ {
        self.samples.iter()
    }

    /// Heart-rate values in insertion order
    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    /// Spread between the highest and lowest value, counting `extra` as part
    /// of the window
    pub fn amplitude_with(&self, extra: u32) -> u32 {
        let max = self.max.map_or(extra, |m| m.max(extra));
        let min = self.min.map_or(extra, |m| m.min(extra));
        max - min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_until_first_append() {
        let mut window = HeartRateWindow::new(5.0);
        assert!(window.is_empty());
        assert_eq!(window.mean(), None);
        assert_eq!(window.span(), 0.0);

        window.append(72, 0.0);
        assert!(!window.is_empty());
        assert_eq!(window.min(), Some(72));
        assert_eq!(window.max(), Some(72));
        assert_eq!(window.mean(), Some(72.0));
    }

    #[test]
    fn test_single_step_eviction_keeps_span_bounded() {
        let mut window = HeartRateWindow::new(5.0);
        for t in 0..=10 {
            let before = window.len();
            window.append(60 + t, t as f64);
            // Each append adds one and removes at most one
            assert!(window.len() >= before);
            assert!(window.len() <= before + 1);
            assert!(window.span() <= 5.0, "span {} at t={}", window.span(), t);
        }
        let values: Vec<u32> = window.values().collect();
        assert_eq!(values, vec![65, 66, 67, 68, 69, 70]);
    }

    #[test]
    fn test_only_one_sample_evicted_after_a_gap() {
        let mut window = HeartRateWindow::new(5.0);
        window.append(60, 0.0);
        window.append(61, 1.0);
        window.append(62, 2.0);
        // A long gap makes every old sample stale, but only the oldest goes
        window.append(90, 20.0);
        assert_eq!(window.len(), 3);
        assert_eq!(window.span(), 19.0);
        assert_eq!(window.min(), Some(61));
        assert_eq!(window.max(), Some(90));
    }

    #[test]
    fn test_statistics_follow_eviction() {
        let mut window = HeartRateWindow::new(2.0);
        window.append(100, 0.0);
        window.append(70, 1.0);
        window.append(80, 2.0);
        assert_relative_eq!(window.mean().unwrap(), 250.0 / 3.0);
        window.append(90, 3.0);
        assert_eq!(window.max(), Some(90));
        assert_eq!(window.min(), Some(70));
        assert_relative_eq!(window.mean().unwrap(), 80.0);
    }

    #[test]
    fn test_amplitude_with_candidate() {
        let mut window = HeartRateWindow::new(10.0);
        assert_eq!(window.amplitude_with(80), 0);
        window.append(70, 0.0);
        window.append(74, 1.0);
        assert_eq!(window.amplitude_with(72), 4);
        assert_eq!(window.amplitude_with(80), 10);
        assert_eq!(window.amplitude_with(60), 14);
    }
}
