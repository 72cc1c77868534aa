use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{StreamError, StreamResult};
use crate::timespan::{Clock, SystemClock};

/// Named read positions into a stream, each stamped with the time it was last set.
#[derive(Debug, Default, Clone)]
pub struct CursorTable {
    entries: HashMap<String, (i64, f64)>,
}

impl CursorTable {
    pub fn set(&mut self, name: &str, position: i64, now: f64) {
        self.entries.insert(name.to_string(), (position, now));
    }

    /// Creates the cursor only if it does not exist yet.
    pub fn set_default(&mut self, name: &str, position: i64, now: f64) {
        self.entries
            .entry(name.to_string())
            .or_insert((position, now));
    }

    /// Position and timestamp of `name`.
    pub fn get(&self, name: &str) -> StreamResult<(i64, f64)> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| StreamError::UnknownCursor(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Ring contents and bookkeeping. Only reachable while the owning
/// [`RingStream`] lock is held.
pub struct StreamState {
    samples: Vec<i16>,
    right_index: i64,
    cursors: CursorTable,
    last_write_timestamp: f64,
    clock: Arc<dyn Clock>,
}

impl StreamState {
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn right_index(&self) -> i64 {
        self.right_index
    }

    pub fn left_index(&self) -> i64 {
        (self.right_index - self.samples.len() as i64).max(0)
    }

    pub fn len(&self) -> usize {
        self.right_index.min(self.samples.len() as i64) as usize
    }

    pub fn last_write_timestamp(&self) -> f64 {
        self.last_write_timestamp
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn cursors(&self) -> &CursorTable {
        &self.cursors
    }

    pub fn extend(&mut self, values: &[i16]) {
        let capacity = self.samples.len();
        // Only the newest `capacity` values can survive the write.
        let skip = values.len().saturating_sub(capacity);
        let mut index = self.right_index + skip as i64;
        for &value in &values[skip..] {
            self.samples[(index as usize) % capacity] = value;
            index += 1;
        }
        self.right_index += values.len() as i64;
        self.last_write_timestamp = self.clock.now();
    }

    /// Samples at logical indices `[begin, end)`.
    ///
    /// Negative bounds count back from `right_index`. Both bounds are clamped
    /// into `[left_index, right_index]`, so this never fails and returns an
    /// empty vector when nothing is in range.
    pub fn slice(&self, begin: i64, end: i64) -> Vec<i16> {
        let (begin, end) = self.clamp_range(begin, end);
        let capacity = self.samples.len();
        (begin..end)
            .map(|index| self.samples[(index as usize) % capacity])
            .collect()
    }

    /// Copies `[begin, begin + out.len())` into `out`, returning how many were available.
    pub fn read_into(&self, begin: i64, out: &mut [i16]) -> usize {
        let (begin, end) = self.clamp_range(begin, begin + out.len() as i64);
        let capacity = self.samples.len();
        for (slot, index) in out.iter_mut().zip(begin..end) {
            *slot = self.samples[(index as usize) % capacity];
        }
        (end - begin) as usize
    }

    pub fn set_index(&mut self, name: &str, value: i64) {
        let now = self.clock.now();
        self.cursors.set(name, value, now);
    }

    pub fn set_index_default(&mut self, name: &str, value_if_absent: i64) {
        let now = self.clock.now();
        self.cursors.set_default(name, value_if_absent, now);
    }

    pub fn get_index(&self, name: &str) -> StreamResult<i64> {
        self.cursors.get(name).map(|(position, _)| position)
    }

    pub fn get_index_timestamp(&self, name: &str) -> StreamResult<f64> {
        self.cursors.get(name).map(|(_, timestamp)| timestamp)
    }

    fn clamp_range(&self, begin: i64, end: i64) -> (i64, i64) {
        let left = self.left_index();
        let right = self.right_index;
        let resolve = |bound: i64| {
            let bound = if bound < 0 { right + bound } else { bound };
            bound.clamp(left, right)
        };
        let begin = resolve(begin);
        let end = resolve(end).max(begin);
        (begin, end)
    }
}

/// Fixed-capacity sample stream with a monotonic index space.
///
/// Index `i` refers to the `i`th sample ever written. Once more than
/// `capacity` samples have been written, the oldest ones become unreadable
/// and `left_index` moves forward; indices are never reused.
///
/// Every method takes the same lock, so a stream can be shared between the
/// audio callback thread and the UI thread behind an `Arc`.
pub struct RingStream {
    state: Mutex<StreamState>,
}

impl RingStream {
    pub fn new(capacity: usize) -> StreamResult<Self> {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> StreamResult<Self> {
        if capacity == 0 {
            return Err(StreamError::ZeroCapacity);
        }
        let now = clock.now();
        Ok(Self {
            state: Mutex::new(StreamState {
                samples: vec![0; capacity],
                right_index: 0,
                cursors: CursorTable::default(),
                last_write_timestamp: now,
                clock,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        // A panic elsewhere must not silence the audio thread.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `f` as a single critical section.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut StreamState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn extend(&self, values: &[i16]) {
        self.lock().extend(values);
    }

    pub fn slice(&self, begin: i64, end: i64) -> Vec<i16> {
        self.lock().slice(begin, end)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn left_index(&self) -> i64 {
        self.lock().left_index()
    }

    pub fn right_index(&self) -> i64 {
        self.lock().right_index()
    }

    pub fn last_write_timestamp(&self) -> f64 {
        self.lock().last_write_timestamp()
    }

    pub fn set_index(&self, name: &str, value: i64) {
        self.lock().set_index(name, value);
    }

    pub fn set_index_default(&self, name: &str, value_if_absent: i64) {
        self.lock().set_index_default(name, value_if_absent);
    }

    pub fn get_index(&self, name: &str) -> StreamResult<i64> {
        self.lock().get_index(name)
    }

    pub fn get_index_timestamp(&self, name: &str) -> StreamResult<f64> {
        self.lock().get_index_timestamp(name)
    }

    pub fn index_names(&self) -> Vec<String> {
        self.lock().cursors().names()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::timespan::ManualClock;

    fn filled(capacity: usize, values: &[i16]) -> RingStream {
        let stream = RingStream::new(capacity).unwrap();
        stream.extend(values);
        stream
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(RingStream::new(0), Err(StreamError::ZeroCapacity)));
    }

    #[test]
    fn indices_track_total_written() {
        let stream = RingStream::new(7).unwrap();
        let mut total = 0i64;
        for chunk in [3usize, 0, 5, 1, 9, 2] {
            stream.extend(&vec![1; chunk]);
            total += chunk as i64;
            assert_eq!(stream.right_index(), total);
            assert_eq!(stream.left_index(), (total - 7).max(0));
            assert_eq!(stream.len(), total.min(7) as usize);
        }
    }

    #[test]
    fn eviction_scenario() {
        let values: Vec<i16> = (1..=10).collect();
        let stream = filled(10, &values);
        assert_eq!(stream.right_index(), 10);
        assert_eq!(stream.left_index(), 0);

        stream.extend(&[11, 12]);
        assert_eq!(stream.right_index(), 12);
        assert_eq!(stream.left_index(), 2);
        assert_eq!(stream.slice(0, 5), vec![3, 4, 5]);
        assert_eq!(stream.slice(0, 100), (3..=12).collect::<Vec<i16>>());
    }

    #[test]
    fn slice_clamps_and_resolves_negative_bounds() {
        let values: Vec<i16> = (0..20).collect();
        let stream = filled(8, &values);
        // left = 12, right = 20
        assert_eq!(stream.slice(-3, 20), vec![17, 18, 19]);
        assert_eq!(stream.slice(-3, -1), vec![17, 18]);
        assert_eq!(stream.slice(-100, 13), vec![12]);
        assert_eq!(stream.slice(18, 500), vec![18, 19]);
        assert!(stream.slice(15, 15).is_empty());
        assert!(stream.slice(16, 14).is_empty());
        assert!(stream.slice(25, 30).is_empty());
    }

    #[test]
    fn slice_length_matches_clamped_bounds() {
        let values: Vec<i16> = (0..50).collect();
        let stream = filled(16, &values);
        let (left, right) = (stream.left_index(), stream.right_index());
        for begin in [-60i64, -5, 0, 30, 34, 40, 49, 50, 70] {
            for end in [-60i64, -1, 0, 33, 35, 45, 50, 90] {
                let clamp = |bound: i64| {
                    let bound = if bound < 0 { right + bound } else { bound };
                    bound.clamp(left, right)
                };
                let expected = (clamp(end) - clamp(begin)).max(0) as usize;
                assert_eq!(stream.slice(begin, end).len(), expected, "{begin}..{end}");
            }
        }
    }

    #[test]
    fn oversized_extend_keeps_newest_values() {
        let values: Vec<i16> = (0..25).collect();
        let stream = filled(4, &values);
        assert_eq!(stream.right_index(), 25);
        assert_eq!(stream.slice(0, 25), vec![21, 22, 23, 24]);
    }

    #[test]
    fn read_into_reports_available_count() {
        let stream = filled(10, &[5, 6, 7]);
        let mut out = [0i16; 5];
        let available = stream.with_state(|state| state.read_into(1, &mut out));
        assert_eq!(available, 2);
        assert_eq!(&out[..2], &[6, 7]);
    }

    #[test]
    fn cursors_are_stamped_and_defaulted() {
        let clock = Arc::new(ManualClock::new(5.0));
        let stream = RingStream::with_clock(16, clock.clone()).unwrap();

        assert_eq!(
            stream.get_index("output"),
            Err(StreamError::UnknownCursor("output".to_string()))
        );

        stream.set_index_default("output", 3);
        clock.advance(1.0);
        stream.set_index_default("output", 9);
        assert_eq!(stream.get_index("output"), Ok(3));
        assert_eq!(stream.get_index_timestamp("output"), Ok(5.0));

        stream.set_index("output", 7);
        assert_eq!(stream.get_index("output"), Ok(7));
        assert_eq!(stream.get_index_timestamp("output"), Ok(6.0));

        clock.advance(0.5);
        stream.extend(&[1]);
        assert_eq!(stream.last_write_timestamp(), 6.5);

        stream.set_index("scope", 0);
        let mut names = stream.index_names();
        names.sort();
        assert_eq!(names, vec!["output".to_string(), "scope".to_string()]);
    }

    #[test]
    fn concurrent_writer_and_reader_see_monotonic_indices() {
        let stream = Arc::new(RingStream::new(256).unwrap());
        let writer = {
            let stream = Arc::clone(&stream);
            thread::spawn(move || {
                for i in 0..500 {
                    stream.extend(&[i as i16; 8]);
                }
            })
        };

        let mut last_right = 0;
        while last_right < 4_000 {
            let (left, right, data) = stream.with_state(|state| {
                let left = state.left_index();
                let right = state.right_index();
                (left, right, state.slice(left, right))
            });
            assert!(right >= last_right);
            assert_eq!(data.len() as i64, right - left);
            last_right = right;
        }
        writer.join().unwrap();
        assert_eq!(stream.right_index(), 4_000);
    }
}
