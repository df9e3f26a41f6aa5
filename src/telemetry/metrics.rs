//! Tick timing
//!
//! The update thread must finish each tick well inside one display frame.
//! [`TickProfiler`] keeps a rolling window of tick durations so overruns
//! show up in logs.

use std::collections::VecDeque;
use std::time::Duration;

/// Tick timing statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickStats {
    /// Average tick time in milliseconds
    pub avg_ms: f64,
    /// Minimum tick time in milliseconds
    pub min_ms: f64,
    /// Maximum tick time in milliseconds
    pub max_ms: f64,
    /// 95th percentile tick time
    pub p95_ms: f64,
    /// Ticks that took longer than the frame budget
    pub over_budget: usize,
    /// Number of samples in the statistics
    pub sample_count: usize,
}

/// Rolling window of tick durations
pub struct TickProfiler {
    tick_times: VecDeque<Duration>,
    /// Maximum samples to keep (5 seconds at 60fps)
    max_samples: usize,
    /// Time available per tick
    budget: Duration,
}

impl TickProfiler {
    /// Create a profiler for the given per-frame budget
    pub fn new(budget: Duration) -> Self {
        Self {
            tick_times: VecDeque::with_capacity(300),
            max_samples: 300,
            budget,
        }
    }

    /// Record how long one tick took
    pub fn record(&mut self, elapsed: Duration) {
        self.tick_times.push_back(elapsed);
        if self.tick_times.len() > self.max_samples {
            self.tick_times.pop_front();
        }
        if elapsed > self.budget {
            tracing::debug!(
                "Tick took {:.2}ms (budget {:.2}ms)",
                elapsed.as_secs_f64() * 1000.0,
                self.budget.as_secs_f64() * 1000.0
            );
        }
    }

    /// Get tick timing statistics
    pub fn stats(&self) -> TickStats {
        if self.tick_times.is_empty() {
            return TickStats::default();
        }

        let mut times: Vec<f64> = self.tick_times.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let sum: f64 = times.iter().sum();
        let count = times.len() as f64;

        TickStats {
            avg_ms: sum / count,
            min_ms: times.first().copied().unwrap_or(0.0),
            max_ms: times.last().copied().unwrap_or(0.0),
            p95_ms: percentile(&times, 0.95),
            over_budget: self.tick_times.iter().filter(|d| **d > self.budget).count(),
            sample_count: times.len(),
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

/// Calculate percentile from sorted array
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p) as usize;
    sorted[idx]
}
