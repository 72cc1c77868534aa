mod ui;

use std::sync::{Arc, Mutex};

use scopestream::audio::{AudioPort, open_input, open_output};
use scopestream::error::AudioResult;
use scopestream::pager::OscilloscopePager;
use scopestream::settings::{AppSettings, SourceKind, default_settings_path};
use scopestream::stream::RingStream;
use scopestream::tone::{ProducerPacing, ToneParams, ToneProducer};
use ui::{AudioSession, ScopeApp};

fn main() -> eframe::Result<()> {
    env_logger::init();

    let settings_path = default_settings_path();
    let mut settings = AppSettings::load(&settings_path);
    if let Err(err) = settings.validate() {
        log::warn!(
            "Invalid settings in {}: {err}; using defaults",
            settings_path.display()
        );
        settings = AppSettings::default();
    }

    let stream = Arc::new(
        RingStream::new(settings.stream.capacity()).expect("Stream capacity was validated"),
    );
    let pager = OscilloscopePager::new(settings.pager).expect("Pager tuning was validated");
    let tone = Arc::new(Mutex::new(settings.tone));
    let session = start_audio(&stream, &tone, &settings);

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Scope Stream",
        options,
        Box::new(move |cc| {
            Box::new(ScopeApp::new(
                cc,
                stream,
                pager,
                tone,
                session,
                settings_path,
                settings,
            ))
        }),
    )
}

fn start_audio(
    stream: &Arc<RingStream>,
    tone: &Arc<Mutex<ToneParams>>,
    settings: &AppSettings,
) -> AudioSession {
    let mut session = AudioSession::default();

    match settings.source {
        SourceKind::Tone => {
            let pacing = ProducerPacing {
                sample_rate: settings.stream.sample_rate as f64,
                target_buffered_seconds: settings.stream.target_buffered_seconds,
                max_chunk: settings.stream.block_size as usize * 4,
            };
            match ToneProducer::spawn(Arc::clone(stream), Arc::clone(tone), pacing) {
                Ok(producer) => session.producer = Some(producer),
                Err(err) => session.report(format!("Tone producer failed to start: {err}")),
            }
        }
        SourceKind::Input => {
            let opened = open_with_fallback("Input", settings.input_device.as_deref(), |name| {
                open_input(stream.clone(), name, &settings.stream)
            });
            match opened {
                Ok(port) => session.input = Some(port),
                Err(err) => session.report(format!("Audio input: {err}")),
            }
        }
    }

    let opened = open_with_fallback("Output", settings.output_device.as_deref(), |name| {
        open_output(stream.clone(), name, &settings.stream)
    });
    match opened {
        Ok(port) => session.output = Some(port),
        Err(err) => session.report(format!("Audio output: {err}")),
    }
    session
}

/// Opens the named device, retrying with the host default if it is gone.
fn open_with_fallback(
    kind: &str,
    requested: Option<&str>,
    open: impl Fn(Option<&str>) -> AudioResult<AudioPort>,
) -> AudioResult<AudioPort> {
    match open(requested) {
        Ok(port) => Ok(port),
        Err(err) if requested.is_some() => {
            log::warn!("{kind} device unavailable ({err}); using the default device");
            open(None)
        }
        Err(err) => Err(err),
    }
}
