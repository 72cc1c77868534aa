use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SettingsError;
use crate::pager::PagerTuning;
use crate::tone::{ToneParams, Waveform};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_BLOCK_SIZE: u32 = 512;
pub const DEFAULT_TARGET_BUFFERED_SECONDS: f64 = 0.015;
/// Default stream capacity, in seconds of audio.
pub const DEFAULT_CAPACITY_SECONDS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThemeKind {
    Dark,
    Light,
}

impl ThemeKind {
    pub fn label(self) -> &'static str {
        match self {
            ThemeKind::Dark => "Dark",
            ThemeKind::Light => "Light",
        }
    }

    pub fn from_key(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "light" => ThemeKind::Light,
            _ => ThemeKind::Dark,
        }
    }

    pub fn as_key(self) -> &'static str {
        match self {
            ThemeKind::Dark => "dark",
            ThemeKind::Light => "light",
        }
    }
}

/// Where samples entering the stream come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Tone,
    Input,
}

impl SourceKind {
    pub fn as_key(self) -> &'static str {
        match self {
            SourceKind::Tone => "tone",
            SourceKind::Input => "input",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StreamSettings {
    pub sample_rate: u32,
    /// Ring capacity in samples; `None` means five seconds at `sample_rate`.
    pub capacity: Option<usize>,
    pub block_size: u32,
    pub target_buffered_seconds: f64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            capacity: None,
            block_size: DEFAULT_BLOCK_SIZE,
            target_buffered_seconds: DEFAULT_TARGET_BUFFERED_SECONDS,
        }
    }
}

impl StreamSettings {
    pub fn capacity(&self) -> usize {
        self.capacity
            .unwrap_or(self.sample_rate as usize * DEFAULT_CAPACITY_SECONDS)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    pub theme: ThemeKind,
    pub source: SourceKind,
    pub output_device: Option<String>,
    pub input_device: Option<String>,
    pub stream: StreamSettings,
    pub pager: PagerTuning,
    pub tone: ToneParams,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: ThemeKind::Dark,
            source: SourceKind::Tone,
            output_device: None,
            input_device: None,
            stream: StreamSettings::default(),
            pager: PagerTuning::default(),
            tone: ToneParams::default(),
        }
    }
}

impl AppSettings {
    /// Reads `path`, falling back to defaults for anything missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw),
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    log::warn!("Could not read settings {}: {err}", path.display());
                }
                Self::default()
            }
        }
    }

    /// Parses `key=value` lines. Blank lines, `#` comments and unknown keys are skipped.
    pub fn parse(raw: &str) -> Self {
        let mut settings = AppSettings::default();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                apply_kv(key.trim(), value.trim(), &mut settings);
            }
        }
        settings
    }

    pub fn render(&self) -> String {
        let mut buf = String::new();
        buf.push_str(&format!("theme={}\n", self.theme.as_key()));
        buf.push_str(&format!("source={}\n", self.source.as_key()));
        if let Some(name) = &self.output_device {
            buf.push_str(&format!("output_device={name}\n"));
        }
        if let Some(name) = &self.input_device {
            buf.push_str(&format!("input_device={name}\n"));
        }
        append_stream_lines(&mut buf, &self.stream);
        append_pager_lines(&mut buf, &self.pager);
        append_tone_lines(&mut buf, &self.tone);
        buf
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.stream.sample_rate == 0 {
            return Err(SettingsError::NotPositive("sample_rate"));
        }
        if self.stream.block_size == 0 {
            return Err(SettingsError::NotPositive("block_size"));
        }
        if self.stream.capacity() == 0 {
            return Err(SettingsError::NotPositive("capacity"));
        }
        let frequency = self.tone.frequency_hz;
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(SettingsError::ToneFrequency(frequency));
        }
        self.pager.validate()?;

        let window = self.pager.max_rendering_latency_samples + self.pager.num_samples_to_render;
        if self.stream.capacity() < window {
            log::warn!(
                "Stream capacity {} is smaller than the scope window {}; pages will be clamped",
                self.stream.capacity(),
                window
            );
        }
        Ok(())
    }
}

pub fn default_settings_path() -> PathBuf {
    config_dir().join("scopestream.cfg")
}

fn apply_kv(key: &str, value: &str, settings: &mut AppSettings) {
    match key {
        "theme" => settings.theme = ThemeKind::from_key(value),
        "source" => match value.to_ascii_lowercase().as_str() {
            "input" | "mic" => settings.source = SourceKind::Input,
            "tone" => settings.source = SourceKind::Tone,
            _ => log::warn!("Ignoring unknown source '{value}'"),
        },
        "output_device" => settings.output_device = non_empty(value),
        "input_device" => settings.input_device = non_empty(value),
        "sample_rate" => parse_value(key, value, &mut settings.stream.sample_rate),
        "capacity" => {
            let mut capacity = 0usize;
            parse_value(key, value, &mut capacity);
            if capacity > 0 {
                settings.stream.capacity = Some(capacity);
            }
        }
        "block_size" => parse_value(key, value, &mut settings.stream.block_size),
        "target_buffered_seconds" => {
            parse_value(key, value, &mut settings.stream.target_buffered_seconds)
        }
        "num_samples_to_render" => {
            parse_value(key, value, &mut settings.pager.num_samples_to_render)
        }
        "min_samples_to_advance" => {
            parse_value(key, value, &mut settings.pager.min_samples_to_advance)
        }
        "max_rendering_latency_samples" => {
            parse_value(key, value, &mut settings.pager.max_rendering_latency_samples)
        }
        "min_search_space_samples" => {
            parse_value(key, value, &mut settings.pager.min_search_space_samples)
        }
        "tone_frequency_hz" => parse_value(key, value, &mut settings.tone.frequency_hz),
        "tone_gain" => {
            parse_value(key, value, &mut settings.tone.gain);
            settings.tone.gain = settings.tone.gain.clamp(0.0, 1.0);
        }
        "waveform" => {
            if let Some(wf) = parse_waveform(value) {
                settings.tone.waveform = wf;
            }
        }
        _ => {}
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, target: &mut T) {
    match value.parse::<T>() {
        Ok(v) => *target = v,
        Err(_) => log::warn!("Ignoring invalid value '{value}' for {key}"),
    }
}

fn parse_waveform(value: &str) -> Option<Waveform> {
    match value.to_ascii_lowercase().as_str() {
        "sine" => Some(Waveform::Sine),
        "square" => Some(Waveform::Square),
        "saw" | "sawtooth" => Some(Waveform::Saw),
        "triangle" => Some(Waveform::Triangle),
        _ => None,
    }
}

fn waveform_key(waveform: Waveform) -> &'static str {
    match waveform {
        Waveform::Sine => "sine",
        Waveform::Square => "square",
        Waveform::Saw => "saw",
        Waveform::Triangle => "triangle",
    }
}

fn append_stream_lines(buf: &mut String, stream: &StreamSettings) {
    buf.push_str(&format!("sample_rate={}\n", stream.sample_rate));
    if let Some(capacity) = stream.capacity {
        buf.push_str(&format!("capacity={capacity}\n"));
    }
    buf.push_str(&format!("block_size={}\n", stream.block_size));
    buf.push_str(&format!(
        "target_buffered_seconds={}\n",
        stream.target_buffered_seconds
    ));
}

fn append_pager_lines(buf: &mut String, pager: &PagerTuning) {
    buf.push_str(&format!(
        "num_samples_to_render={}\n",
        pager.num_samples_to_render
    ));
    buf.push_str(&format!(
        "min_samples_to_advance={}\n",
        pager.min_samples_to_advance
    ));
    buf.push_str(&format!(
        "max_rendering_latency_samples={}\n",
        pager.max_rendering_latency_samples
    ));
    buf.push_str(&format!(
        "min_search_space_samples={}\n",
        pager.min_search_space_samples
    ));
}

fn append_tone_lines(buf: &mut String, tone: &ToneParams) {
    buf.push_str(&format!("tone_frequency_hz={}\n", tone.frequency_hz));
    buf.push_str(&format!("tone_gain={}\n", tone.gain));
    buf.push_str(&format!("waveform={}\n", waveform_key(tone.waveform)));
}

fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(roaming) = std::env::var("APPDATA") {
            return PathBuf::from(roaming).join("ScopeStream");
        }
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            return PathBuf::from(local).join("ScopeStream");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = home_dir() {
            return home
                .join("Library")
                .join("Application Support")
                .join("ScopeStream");
        }
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("scopestream");
    }

    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("scopestream")
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from).or_else(|| {
        #[cfg(target_os = "windows")]
        {
            std::env::var("USERPROFILE").ok().map(PathBuf::from)
        }
        #[cfg(not(target_os = "windows"))]
        {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PagerError;

    #[test]
    fn defaults_match_documented_values() {
        let settings = AppSettings::default();
        assert_eq!(settings.stream.sample_rate, 44_100);
        assert_eq!(settings.stream.capacity(), 5 * 44_100);
        assert_eq!(settings.stream.block_size, 512);
        assert_eq!(settings.pager, PagerTuning::default());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn parses_known_keys_and_skips_noise() {
        let raw = "\
# scope settings
source = input
sample_rate=48000
block_size=1024
min_search_space_samples=1500
waveform=Saw
tone_gain=3.5
unknown_key=1
not a pair
output_device=
input_device=USB Mic
";
        let settings = AppSettings::parse(raw);
        assert_eq!(settings.source, SourceKind::Input);
        assert_eq!(settings.stream.sample_rate, 48_000);
        assert_eq!(settings.stream.capacity(), 240_000);
        assert_eq!(settings.stream.block_size, 1_024);
        assert_eq!(settings.pager.min_search_space_samples, 1_500);
        assert_eq!(settings.tone.waveform, Waveform::Saw);
        assert_eq!(settings.tone.gain, 1.0);
        assert_eq!(settings.output_device, None);
        assert_eq!(settings.input_device.as_deref(), Some("USB Mic"));
    }

    #[test]
    fn invalid_numbers_keep_defaults() {
        let settings = AppSettings::parse("sample_rate=fast\ncapacity=-3\n");
        assert_eq!(settings.stream.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(settings.stream.capacity, None);
    }

    #[test]
    fn rendered_settings_parse_back() {
        let mut settings = AppSettings::default();
        settings.theme = ThemeKind::Light;
        settings.stream.capacity = Some(90_000);
        settings.output_device = Some("Speakers".to_string());
        settings.tone.frequency_hz = 220.0;
        settings.tone.waveform = Waveform::Triangle;
        assert_eq!(AppSettings::parse(&settings.render()), settings);
    }

    #[test]
    fn validation_rejects_bad_tuning() {
        let mut settings = AppSettings::default();
        settings.pager.max_rendering_latency_samples = 1_000;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Pager(PagerError::InvalidTuning(_)))
        ));

        let mut settings = AppSettings::default();
        settings.stream.block_size = 0;
        assert_eq!(
            settings.validate(),
            Err(SettingsError::NotPositive("block_size"))
        );
    }

    #[test]
    fn validation_rejects_unplayable_frequency() {
        let settings = AppSettings::parse("tone_frequency_hz=-10\n");
        assert_eq!(
            settings.validate(),
            Err(SettingsError::ToneFrequency(-10.0))
        );

        let mut settings = AppSettings::default();
        settings.tone.frequency_hz = f32::NAN;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::ToneFrequency(value)) if value.is_nan()
        ));
    }
}
