//! Cadence and duration diagnostics for loops that run many times a second.
//!
//! A tracker collects samples for `period` seconds, then logs a summary at
//! debug level and starts a fresh window.

use std::sync::Arc;

use crate::timespan::{Clock, SystemClock};

/// Summary of one reporting window, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingStats {
    pub count: u64,
    pub total: f64,
    pub min: f64,
    pub max: f64,
}

impl TimingStats {
    fn new() -> Self {
        Self {
            count: 0,
            total: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn add(&mut self, seconds: f64) {
        self.count += 1;
        self.total += seconds;
        self.min = self.min.min(seconds);
        self.max = self.max.max(seconds);
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

struct ReportWindow {
    label: &'static str,
    clock: Arc<dyn Clock>,
    period: f64,
    started: f64,
    stats: TimingStats,
}

impl ReportWindow {
    fn new(label: &'static str, period: f64, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            label,
            clock,
            period,
            started,
            stats: TimingStats::new(),
        }
    }

    fn record(&mut self, seconds: f64, now: f64) -> Option<TimingStats> {
        self.stats.add(seconds);
        if now - self.started < self.period {
            return None;
        }
        let done = std::mem::replace(&mut self.stats, TimingStats::new());
        self.started = now;
        Some(done)
    }
}

/// Measures the time between successive [`tick`](Self::tick) calls.
pub struct IntervalTracker {
    window: ReportWindow,
    last_tick: Option<f64>,
}

impl IntervalTracker {
    pub fn new(label: &'static str, period: f64) -> Self {
        Self::with_clock(label, period, Arc::new(SystemClock))
    }

    pub fn with_clock(label: &'static str, period: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: ReportWindow::new(label, period, clock),
            last_tick: None,
        }
    }

    /// Records one call. Returns the finished window when it was just logged.
    pub fn tick(&mut self) -> Option<TimingStats> {
        let now = self.window.clock.now();
        let previous = self.last_tick.replace(now)?;
        let stats = self.window.record(now - previous, now)?;
        let average = stats.average();
        log::debug!(
            "{}: {} calls, every {:.2} ms on average ({:.1}/s), min {:.2} ms, max {:.2} ms",
            self.window.label,
            stats.count,
            average * 1_000.0,
            if average > 0.0 { 1.0 / average } else { 0.0 },
            stats.min * 1_000.0,
            stats.max * 1_000.0
        );
        Some(stats)
    }
}

/// Measures how long a piece of work takes.
pub struct DurationTracker {
    window: ReportWindow,
}

impl DurationTracker {
    pub fn new(label: &'static str, period: f64) -> Self {
        Self::with_clock(label, period, Arc::new(SystemClock))
    }

    pub fn with_clock(label: &'static str, period: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: ReportWindow::new(label, period, clock),
        }
    }

    pub fn measure<T>(&mut self, work: impl FnOnce() -> T) -> T {
        let start = self.window.clock.now();
        let result = work();
        let end = self.window.clock.now();
        if let Some(stats) = self.window.record(end - start, end) {
            log::debug!(
                "{}: {} runs, {:.3} ms on average, min {:.3} ms, max {:.3} ms",
                self.window.label,
                stats.count,
                stats.average() * 1_000.0,
                stats.min * 1_000.0,
                stats.max * 1_000.0
            );
        }
        result
    }
}
