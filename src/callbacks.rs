//! Glue between an audio backend's block callbacks and a [`RingStream`].

use std::time::Duration;

use crate::codec::{decode_samples, encode_samples};
use crate::error::{CodecError, CodecResult};
use crate::stream::RingStream;

/// Cursor used by the output callback.
pub const OUTPUT_CURSOR: &str = "output";

/// Backend status bits reported alongside a callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags(u32);

impl StatusFlags {
    pub const INPUT_UNDERFLOW: Self = Self(0x01);
    pub const INPUT_OVERFLOW: Self = Self(0x02);
    pub const OUTPUT_UNDERFLOW: Self = Self(0x04);
    pub const OUTPUT_OVERFLOW: Self = Self(0x08);
    pub const PRIMING_OUTPUT: Self = Self(0x10);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for StatusFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingInfo {
    /// Distance between the callback and the block's capture or playback instant.
    pub latency: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Continue,
    Complete,
    Abort,
}

/// Encoded output block (if any) and whether the backend should keep calling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub output: Option<Vec<u8>>,
    pub status: CallbackStatus,
}

/// What a consumer read produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockRead {
    /// Samples copied from the stream; the rest of the block is silence.
    pub delivered: usize,
    /// Samples the producer overwrote before this reader got to them.
    pub skipped: u64,
}

/// Something an input callback can push samples into.
pub trait ProducerSink: Send + Sync {
    fn write_block(&self, samples: &[i16]);
}

/// Something an output callback can pull a full block from.
pub trait ConsumerSource: Send + Sync {
    /// Fills all of `out`, padding with silence when starved.
    fn read_block(&self, out: &mut [i16]) -> BlockRead;
}

impl ProducerSink for RingStream {
    fn write_block(&self, samples: &[i16]) {
        self.extend(samples);
    }
}

impl ConsumerSource for RingStream {
    fn read_block(&self, out: &mut [i16]) -> BlockRead {
        let read = self.with_state(|state| {
            state.set_index_default(OUTPUT_CURSOR, 0);
            let mut index = state.get_index(OUTPUT_CURSOR).unwrap_or(0);
            let left = state.left_index();
            let right = state.right_index();
            let mut skipped = 0;
            if index < left {
                skipped = (left - index) as u64;
                index = left;
            } else if index > right {
                log::warn!(
                    "\"{}\" cursor {} was ahead of the writer at {}; pulled back",
                    OUTPUT_CURSOR,
                    index,
                    right
                );
                index = right;
            }
            let delivered = state.read_into(index, out);
            state.set_index(OUTPUT_CURSOR, index + delivered as i64);
            BlockRead { delivered, skipped }
        });

        out[read.delivered..].fill(0);

        if read.skipped > 0 {
            log::warn!(
                "\"{}\" cursor fell behind the remembered window; {} samples lost",
                OUTPUT_CURSOR,
                read.skipped
            );
        }
        if read.delivered < out.len() {
            log::warn!(
                "Only {} samples available for output; {} requested ({} padded with silence)",
                read.delivered,
                out.len(),
                out.len() - read.delivered
            );
        }
        read
    }
}

fn warn_on_status(callback: &str, status: StatusFlags) {
    if !status.is_empty() {
        log::warn!("status flags {:#x} in {}", status.bits(), callback);
    }
}

/// Appends one captured block to `sink`.
pub fn push_input_block(
    sink: &dyn ProducerSink,
    samples: &[i16],
    timing: TimingInfo,
    status: StatusFlags,
) {
    warn_on_status("input callback", status);
    if let Some(latency) = timing.latency {
        log::trace!("input block captured {:?} ago", latency);
    }
    sink.write_block(samples);
}

/// Fills `out` from `source`; the block is always complete, starved or not.
pub fn fill_output_block(
    source: &dyn ConsumerSource,
    out: &mut [i16],
    timing: TimingInfo,
    status: StatusFlags,
) -> BlockRead {
    warn_on_status("output callback", status);
    if let Some(latency) = timing.latency {
        log::trace!("output block plays in {:?}", latency);
    }
    source.read_block(out)
}

/// Input side: decodes `frame_count` samples and appends them to `sink`.
pub fn input_callback(
    sink: &dyn ProducerSink,
    input: Option<&[u8]>,
    frame_count: usize,
    timing: TimingInfo,
    status: StatusFlags,
) -> CodecResult<CallbackOutcome> {
    let samples = decode_samples(input.unwrap_or_default())?;
    if samples.len() != frame_count {
        return Err(CodecError::FrameCountMismatch {
            expected: frame_count,
            actual: samples.len(),
        });
    }
    push_input_block(sink, &samples, timing, status);
    Ok(CallbackOutcome {
        output: None,
        status: CallbackStatus::Continue,
    })
}

/// Output side: always returns exactly `frame_count` encoded samples.
pub fn output_callback(
    source: &dyn ConsumerSource,
    frame_count: usize,
    timing: TimingInfo,
    status: StatusFlags,
) -> CallbackOutcome {
    let mut block = vec![0i16; frame_count];
    fill_output_block(source, &mut block, timing, status);
    CallbackOutcome {
        output: Some(encode_samples(&block)),
        status: CallbackStatus::Continue,
    }
}
