use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::callbacks::{
    ConsumerSource, ProducerSink, StatusFlags, TimingInfo, fill_output_block, push_input_block,
};
use crate::codec::{sample_from_unit, sample_to_unit};
use crate::error::{AudioError, AudioResult};
use crate::settings::StreamSettings;
use crate::timing::{DurationTracker, IntervalTracker};

/// Seconds between callback timing reports.
const TIMING_REPORT_PERIOD: f64 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

/// A running device stream. Audio stops when the last clone is dropped.
#[derive(Clone)]
pub struct AudioPort {
    _stream: Arc<cpal::Stream>,
    pub device_name: String,
}

/// Plays the blocks pulled from `source` on an output device.
///
/// `device_name` of `None` selects the host's default output.
pub fn open_output(
    source: Arc<dyn ConsumerSource>,
    device_name: Option<&str>,
    settings: &StreamSettings,
) -> AudioResult<AudioPort> {
    let host = cpal::default_host();
    let device = select_device(&host, Direction::Output, device_name)?;
    let resolved_device_name = device
        .name()
        .unwrap_or_else(|_| "<unknown output>".to_string());
    let supported_config = device
        .default_output_config()
        .map_err(|err| AudioError::ConfigError(err.to_string()))?;
    let sample_format = supported_config.sample_format();
    let config = stream_config(supported_config.into(), settings);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_output(&device, &config, source, sample_to_unit),
        cpal::SampleFormat::I16 => build_output(&device, &config, source, |sample: i16| sample),
        cpal::SampleFormat::U16 => build_output(&device, &config, source, |sample: i16| {
            (sample as i32 - i16::MIN as i32) as u16
        }),
        other => return Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
    }
    .map_err(|err| AudioError::StreamBuildError(err.to_string()))?;

    stream
        .play()
        .map_err(|err| AudioError::StreamPlayError(err.to_string()))?;
    log::info!(
        "Output stream started on {} ({} Hz, {} channels, {:?})",
        resolved_device_name,
        config.sample_rate.0,
        config.channels,
        sample_format
    );
    Ok(AudioPort {
        _stream: Arc::new(stream),
        device_name: resolved_device_name,
    })
}

/// Records from an input device into `sink`, averaging channels down to mono.
pub fn open_input(
    sink: Arc<dyn ProducerSink>,
    device_name: Option<&str>,
    settings: &StreamSettings,
) -> AudioResult<AudioPort> {
    let host = cpal::default_host();
    let device = select_device(&host, Direction::Input, device_name)?;
    let resolved_device_name = device
        .name()
        .unwrap_or_else(|_| "<unknown input>".to_string());
    let supported_config = device
        .default_input_config()
        .map_err(|err| AudioError::ConfigError(err.to_string()))?;
    let sample_format = supported_config.sample_format();
    let config = stream_config(supported_config.into(), settings);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_input(&device, &config, sink, |value: f32| {
            sample_from_unit(value.clamp(-1.0, 1.0)).unwrap_or(0)
        }),
        cpal::SampleFormat::I16 => build_input(&device, &config, sink, |value: i16| value),
        cpal::SampleFormat::U16 => build_input(&device, &config, sink, |value: u16| {
            (value as i32 + i16::MIN as i32) as i16
        }),
        other => return Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
    }
    .map_err(|err| AudioError::StreamBuildError(err.to_string()))?;

    stream
        .play()
        .map_err(|err| AudioError::StreamPlayError(err.to_string()))?;
    log::info!(
        "Input stream started on {} ({} Hz, {} channels, {:?})",
        resolved_device_name,
        config.sample_rate.0,
        config.channels,
        sample_format
    );
    Ok(AudioPort {
        _stream: Arc::new(stream),
        device_name: resolved_device_name,
    })
}

fn stream_config(mut config: cpal::StreamConfig, settings: &StreamSettings) -> cpal::StreamConfig {
    config.sample_rate = cpal::SampleRate(settings.sample_rate);
    config.buffer_size = cpal::BufferSize::Fixed(settings.block_size);
    config
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    source: Arc<dyn ConsumerSource>,
    convert: fn(i16) -> T,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let channels = config.channels.max(1) as usize;
    let mut block: Vec<i16> = Vec::new();
    let mut cadence = IntervalTracker::new("output callback", TIMING_REPORT_PERIOD);
    let mut fill_time = DurationTracker::new("output block fill", TIMING_REPORT_PERIOD);
    device.build_output_stream(
        config,
        move |data: &mut [T], info: &cpal::OutputCallbackInfo| {
            cadence.tick();
            let stamp = info.timestamp();
            let timing = TimingInfo {
                latency: stamp.playback.duration_since(&stamp.callback),
            };
            block.resize(data.len() / channels, 0);
            fill_time.measure(|| {
                fill_output_block(source.as_ref(), &mut block, timing, StatusFlags::empty())
            });
            for (frame, &sample) in data.chunks_mut(channels).zip(&block) {
                let value = convert(sample);
                for channel in frame {
                    *channel = value;
                }
            }
        },
        |err| log::error!("Audio output stream error: {err}"),
        None,
    )
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sink: Arc<dyn ProducerSink>,
    convert: fn(T) -> i16,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let channels = config.channels.max(1) as usize;
    let mut block: Vec<i16> = Vec::new();
    device.build_input_stream(
        config,
        move |data: &[T], info: &cpal::InputCallbackInfo| {
            let stamp = info.timestamp();
            let timing = TimingInfo {
                latency: stamp.callback.duration_since(&stamp.capture),
            };
            block.clear();
            block.extend(data.chunks(channels).map(|frame| downmix(frame, convert)));
            push_input_block(sink.as_ref(), &block, timing, StatusFlags::empty());
        },
        |err| log::error!("Audio input stream error: {err}"),
        None,
    )
}

fn downmix<T: Copy>(frame: &[T], convert: fn(T) -> i16) -> i16 {
    let sum: i32 = frame.iter().map(|&value| convert(value) as i32).sum();
    (sum / frame.len().max(1) as i32) as i16
}

fn select_device(
    host: &cpal::Host,
    direction: Direction,
    name: Option<&str>,
) -> AudioResult<cpal::Device> {
    if let Some(target) = name {
        let matches = |device: &cpal::Device| device.name().is_ok_and(|name| name == target);
        let found = match direction {
            Direction::Input => host
                .input_devices()
                .ok()
                .and_then(|mut devices| devices.find(matches)),
            Direction::Output => host
                .output_devices()
                .ok()
                .and_then(|mut devices| devices.find(matches)),
        };
        return found.ok_or_else(|| AudioError::DeviceNotFound(target.to_string()));
    }

    let device = match direction {
        Direction::Input => host.default_input_device(),
        Direction::Output => host.default_output_device(),
    };
    device.ok_or(AudioError::NoDefaultDevice(direction.label()))
}

pub fn list_output_device_names() -> Vec<String> {
    let host = cpal::default_host();
    host.output_devices()
        .map(|devices| {
            devices
                .filter_map(|d| d.name().ok())
                .collect::<Vec<String>>()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        assert_eq!(downmix(&[100i16, 300], |v| v), 200);
        assert_eq!(downmix(&[i16::MAX, i16::MAX], |v| v), i16::MAX);
        assert_eq!(downmix(&[-5i16], |v| v), -5);
    }

    #[test]
    fn unsigned_input_is_recentred() {
        let convert = |value: u16| (value as i32 + i16::MIN as i32) as i16;
        assert_eq!(downmix(&[32_768u16], convert), 0);
        assert_eq!(downmix(&[0u16], convert), i16::MIN);
        assert_eq!(downmix(&[u16::MAX], convert), i16::MAX);
    }
}
