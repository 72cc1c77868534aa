use std::f32::consts::TAU;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::callbacks::OUTPUT_CURSOR;
use crate::codec::sample_from_unit;
use crate::error::CodecResult;
use crate::stream::RingStream;
use crate::timespan::{Motion, estimate_time_span};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Saw,
    Triangle,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Saw,
        Waveform::Triangle,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Waveform::Sine => "Sine",
            Waveform::Square => "Square",
            Waveform::Saw => "Saw",
            Waveform::Triangle => "Triangle",
        }
    }

    /// Value in `[-1, 1]` at `phase` in `[0, 1)`.
    pub fn sample(&self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Saw => 2.0 * (phase - 0.5),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneParams {
    pub frequency_hz: f32,
    pub gain: f32,
    pub waveform: Waveform,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            gain: 0.5,
            waveform: Waveform::Sine,
        }
    }
}

/// Phase-continuous oscillator producing 16-bit samples.
pub struct ToneGenerator {
    phase: f32,
    sample_rate: f32,
}

impl ToneGenerator {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            sample_rate,
        }
    }

    pub fn next_block(&mut self, params: &ToneParams, len: usize) -> CodecResult<Vec<i16>> {
        let step = params.frequency_hz / self.sample_rate;
        let mut block = Vec::with_capacity(len);
        for _ in 0..len {
            block.push(sample_from_unit(params.waveform.sample(self.phase) * params.gain)?);
            self.phase = (self.phase + step).rem_euclid(1.0);
        }
        Ok(block)
    }
}

/// How the producer loop paces itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProducerPacing {
    pub sample_rate: f64,
    /// Audio the producer tries to keep queued ahead of the output cursor.
    pub target_buffered_seconds: f64,
    /// Upper bound on samples generated per wakeup.
    pub max_chunk: usize,
}

/// Samples needed to bring an estimated lag up to the target.
pub fn samples_to_produce(lag_seconds: f64, pacing: &ProducerPacing) -> usize {
    let missing = (pacing.target_buffered_seconds - lag_seconds) * pacing.sample_rate;
    if missing <= 0.0 {
        return 0;
    }
    (missing.round() as usize).min(pacing.max_chunk)
}

/// Tops the stream up to the target span ahead of the output cursor.
///
/// Returns the number of samples written.
pub fn fill_once(
    generator: &mut ToneGenerator,
    stream: &RingStream,
    params: &ToneParams,
    pacing: &ProducerPacing,
) -> CodecResult<usize> {
    stream.set_index_default(OUTPUT_CURSOR, 0);
    // This thread is the only writer, so its own position is exact.
    let motion = Motion {
        writer: false,
        cursor: true,
    };
    let lag =
        estimate_time_span(stream, OUTPUT_CURSOR, pacing.sample_rate, motion).unwrap_or(0.0);
    let count = samples_to_produce(lag, pacing);
    if count > 0 {
        let block = generator.next_block(params, count)?;
        stream.extend(&block);
    }
    Ok(count)
}

/// Background thread feeding a tone into a stream. Stops when dropped.
pub struct ToneProducer {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ToneProducer {
    pub fn spawn(
        stream: Arc<RingStream>,
        params: Arc<Mutex<ToneParams>>,
        pacing: ProducerPacing,
    ) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let nap = Duration::from_secs_f64(pacing.target_buffered_seconds / 4.0)
            .max(Duration::from_millis(1));
        let handle = thread::Builder::new()
            .name("tone-producer".to_string())
            .spawn(move || {
                let mut generator = ToneGenerator::new(pacing.sample_rate as f32);
                while flag.load(Ordering::Relaxed) {
                    let snapshot = *params.lock().unwrap_or_else(|e| e.into_inner());
                    if let Err(err) = fill_once(&mut generator, &stream, &snapshot, &pacing) {
                        log::error!("Tone producer stopped: {err}");
                        break;
                    }
                    thread::sleep(nap);
                }
            })?;
        log::info!(
            "Tone producer started (target span {:.3}s)",
            pacing.target_buffered_seconds
        );
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// False once the thread has exited, whether dropped or stopped by an error.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ToneProducer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timespan::ManualClock;

    fn pacing() -> ProducerPacing {
        ProducerPacing {
            sample_rate: 1_000.0,
            target_buffered_seconds: 0.015,
            max_chunk: 64,
        }
    }

    #[test]
    fn waveforms_stay_in_unit_range() {
        for waveform in Waveform::ALL {
            for step in 0..100 {
                let value = waveform.sample(step as f32 / 100.0);
                assert!((-1.0..=1.0).contains(&value), "{waveform:?} {value}");
            }
        }
    }

    #[test]
    fn generator_is_periodic() {
        let params = ToneParams {
            frequency_hz: 250.0,
            gain: 1.0,
            waveform: Waveform::Square,
        };
        let mut generator = ToneGenerator::new(1_000.0);
        let block = generator.next_block(&params, 8).unwrap();
        assert_eq!(&block[..2], &[i16::MAX; 2]);
        assert_eq!(&block[2..4], &[-i16::MAX; 2]);
        assert_eq!(&block[..4], &block[4..]);
    }

    #[test]
    fn negative_frequency_stays_in_range() {
        let params = ToneParams {
            frequency_hz: -10.0,
            gain: 1.0,
            waveform: Waveform::Saw,
        };
        let mut generator = ToneGenerator::new(1_000.0);
        let block = generator.next_block(&params, 500).unwrap();
        assert!(block.iter().any(|&sample| sample != 0));
        // Saw ramps down instead of up when played backwards.
        assert!(block[2] < block[1]);
    }

    #[test]
    fn producer_is_running_after_spawn() {
        let stream = Arc::new(RingStream::new(1_000).unwrap());
        let params = Arc::new(Mutex::new(ToneParams::default()));
        let producer = ToneProducer::spawn(stream, params, pacing()).unwrap();
        assert!(producer.is_running());
    }

    #[test]
    fn excessive_gain_fails_at_the_codec() {
        let params = ToneParams {
            gain: 2.0,
            waveform: Waveform::Square,
            ..ToneParams::default()
        };
        let mut generator = ToneGenerator::new(1_000.0);
        assert!(generator.next_block(&params, 4).is_err());
    }

    #[test]
    fn production_is_capped_and_never_negative() {
        assert_eq!(samples_to_produce(0.0, &pacing()), 15);
        assert_eq!(samples_to_produce(0.02, &pacing()), 0);
        assert_eq!(samples_to_produce(-10.0, &pacing()), 64);
    }

    #[test]
    fn fill_keeps_target_span_ahead_of_cursor() {
        let clock = Arc::new(ManualClock::new(0.0));
        let stream = RingStream::with_clock(1_000, clock.clone()).unwrap();
        let mut generator = ToneGenerator::new(1_000.0);
        let params = ToneParams::default();

        assert_eq!(fill_once(&mut generator, &stream, &params, &pacing()), Ok(15));
        assert_eq!(stream.right_index(), 15);
        assert_eq!(fill_once(&mut generator, &stream, &params, &pacing()), Ok(0));

        // The output cursor is assumed to keep playing between reads.
        clock.advance(0.005);
        assert_eq!(fill_once(&mut generator, &stream, &params, &pacing()), Ok(5));
        assert_eq!(stream.right_index(), 20);
    }
}
