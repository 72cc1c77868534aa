#[cfg(test)]
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::StreamResult;
use crate::stream::RingStream;

/// Source of wall-clock time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Clock that only moves when told to. Used to make extrapolation deterministic.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock {
    seconds: Mutex<f64>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            seconds: Mutex::new(start),
        }
    }

    pub fn advance(&self, seconds: f64) {
        *self.seconds.lock().unwrap_or_else(|e| e.into_inner()) += seconds;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.seconds.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Positions and event times observed for one cursor at a single instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpanInputs {
    pub right_index: i64,
    pub last_write_timestamp: f64,
    pub cursor_position: i64,
    pub cursor_timestamp: f64,
}

/// Which sides are assumed to keep moving at `sample_rate` since their last event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motion {
    pub writer: bool,
    pub cursor: bool,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            writer: true,
            cursor: true,
        }
    }
}

/// Seconds of audio between a cursor and the writer, extrapolated to `now`.
pub fn time_span(inputs: TimeSpanInputs, now: f64, sample_rate: f64, motion: Motion) -> f64 {
    let mut span = (inputs.right_index - inputs.cursor_position) as f64 / sample_rate;
    if motion.writer {
        span += now - inputs.last_write_timestamp;
    }
    if motion.cursor {
        span -= now - inputs.cursor_timestamp;
    }
    span
}

/// Estimated lag of cursor `name` behind the writer of `stream`, in seconds.
///
/// Fails with `UnknownCursor` when the cursor was never set.
pub fn estimate_time_span(
    stream: &RingStream,
    name: &str,
    sample_rate: f64,
    motion: Motion,
) -> StreamResult<f64> {
    stream.with_state(|state| {
        let now = state.now();
        let (cursor_position, cursor_timestamp) = state.cursors().get(name)?;
        let inputs = TimeSpanInputs {
            right_index: state.right_index(),
            last_write_timestamp: state.last_write_timestamp(),
            cursor_position,
            cursor_timestamp,
        };
        Ok(time_span(inputs, now, sample_rate, motion))
    })
}
