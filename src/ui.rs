use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use egui::{self, Align2, Color32, ComboBox, FontId, Layout, Rounding, Stroke};

use scopestream::audio::{AudioPort, list_output_device_names, open_output};
use scopestream::callbacks::OUTPUT_CURSOR;
use scopestream::codec::sample_to_unit;
use scopestream::gate::CompletionGate;
use scopestream::pager::OscilloscopePager;
use scopestream::settings::{AppSettings, SourceKind, ThemeKind};
use scopestream::stream::RingStream;
use scopestream::timespan::{Motion, estimate_time_span};
use scopestream::timing::IntervalTracker;
use scopestream::tone::{ToneParams, ToneProducer, Waveform};

const ACCENT: Color32 = Color32::from_rgb(0, 200, 140);

/// Everything that feeds or drains the stream.
#[derive(Default)]
pub struct AudioSession {
    pub output: Option<AudioPort>,
    pub input: Option<AudioPort>,
    pub producer: Option<ToneProducer>,
    pub error: Option<String>,
}

impl AudioSession {
    pub fn report(&mut self, message: String) {
        log::error!("{message}");
        self.error = Some(message);
    }
}

pub struct ScopeApp {
    // Audio first so callbacks stop before anything else is torn down.
    session: AudioSession,
    stream: Arc<RingStream>,
    pager: OscilloscopePager,
    tone: Arc<Mutex<ToneParams>>,
    settings_path: PathBuf,
    settings: AppSettings,
    saved_settings: Arc<Mutex<AppSettings>>,
    settings_writer: Option<CompletionGate>,
    save_pending: bool,
    output_devices: Vec<String>,
    frame_timer: IntervalTracker,
}

impl ScopeApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        stream: Arc<RingStream>,
        pager: OscilloscopePager,
        tone: Arc<Mutex<ToneParams>>,
        session: AudioSession,
        settings_path: PathBuf,
        mut settings: AppSettings,
    ) -> Self {
        apply_theme(&cc.egui_ctx, settings.theme);
        if let Some(port) = &session.output {
            settings.output_device = Some(port.device_name.clone());
        }

        let saved_settings = Arc::new(Mutex::new(settings.clone()));
        let settings_writer = {
            let saved = Arc::clone(&saved_settings);
            let path = settings_path.clone();
            CompletionGate::spawn("settings-writer", move || {
                let snapshot = saved.lock().unwrap_or_else(|e| e.into_inner()).clone();
                if let Err(err) = snapshot.save(&path) {
                    log::warn!("Could not save settings to {}: {err}", path.display());
                }
            })
        };
        let settings_writer = match settings_writer {
            Ok(gate) => Some(gate),
            Err(err) => {
                log::warn!("Settings writer thread unavailable ({err}); saving inline");
                None
            }
        };

        Self {
            session,
            stream,
            pager,
            tone,
            settings_path,
            settings,
            saved_settings,
            settings_writer,
            save_pending: false,
            output_devices: list_output_device_names(),
            frame_timer: IntervalTracker::new("ui frame", 5.0),
        }
    }

    fn switch_output_device(&mut self) {
        // Two live outputs would split the "output" cursor between them.
        self.session.output = None;
        let target = self.settings.output_device.clone();
        match open_output(
            self.stream.clone(),
            target.as_deref(),
            &self.settings.stream,
        ) {
            Ok(port) => {
                self.settings.output_device = Some(port.device_name.clone());
                self.session.output = Some(port);
                self.session.error = None;
            }
            Err(err) => self.session.report(format!("Audio: {err}")),
        }
        self.output_devices = list_output_device_names();
    }

    /// Hands pending settings to the writer thread once its previous save is done.
    fn flush_settings(&mut self) {
        if !self.save_pending {
            return;
        }
        if self
            .settings_writer
            .as_ref()
            .is_some_and(|gate| !gate.is_alive())
        {
            log::error!("Settings writer thread died; saving inline from now on");
            self.settings_writer = None;
        }
        match &self.settings_writer {
            Some(gate) => {
                if !gate.is_done() {
                    return;
                }
                *self.saved_settings.lock().unwrap_or_else(|e| e.into_inner()) =
                    self.settings.clone();
                gate.request_start();
            }
            None => {
                if let Err(err) = self.settings.save(&self.settings_path) {
                    log::warn!("Could not save settings: {err}");
                }
            }
        }
        self.save_pending = false;
    }
}

impl eframe::App for ScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();
        self.frame_timer.tick();
        self.pager.select_page(&self.stream);
        self.flush_settings();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(4.0);
            let mut theme_changed = false;
            let mut device_changed = false;
            ui.horizontal(|ui| {
                ui.strong("Scope Stream");
                ui.separator();
                theme_changed = theme_selector(ui, ctx, &mut self.settings);
                ui.separator();
                device_changed = output_selector(
                    ui,
                    &self.output_devices,
                    &mut self.settings.output_device,
                    &mut self.session.error,
                );
                ui.with_layout(Layout::right_to_left(egui::Align::Center), |ui| {
                    match &self.session.input {
                        Some(port) => ui.label(format!("Input: {}", port.device_name)),
                        None => match &self.session.producer {
                            Some(producer) if producer.is_running() => ui.label("Source: tone"),
                            Some(_) => ui.colored_label(Color32::RED, "Source: tone (stopped)"),
                            None => ui.label("Source: idle"),
                        },
                    };
                });
            });
            ui.add_space(6.0);

            card(ui, "Scope", |ui| draw_page(ui, self.pager.last_rendered_data()));
            ui.add_space(8.0);

            let mut tone = *self.tone.lock().unwrap_or_else(|e| e.into_inner());
            let sample_rate = self.settings.stream.sample_rate as f64;
            let source = self.settings.source;
            let page_start = self.pager.last_rendered_start_index();
            ui.columns(2, |columns| {
                columns[0].vertical(|ui| {
                    card(ui, "Tone", |ui| match source {
                        SourceKind::Tone => tone_controls(ui, &mut tone),
                        SourceKind::Input => {
                            ui.label("Tone generator idle while recording from input.");
                        }
                    })
                });
                columns[1].vertical(|ui| {
                    card(ui, "Stream", |ui| {
                        stream_stats(ui, &self.stream, sample_rate, page_start)
                    })
                });
            });

            let tone_changed = tone != self.settings.tone;
            if tone_changed {
                *self.tone.lock().unwrap_or_else(|e| e.into_inner()) = tone;
                self.settings.tone = tone;
            }

            if device_changed {
                self.switch_output_device();
            }

            if tone_changed || theme_changed || device_changed {
                self.save_pending = true;
            }

            if let Some(err) = &self.session.error {
                ui.colored_label(Color32::RED, err.as_str());
            }
        });
    }
}

fn tone_controls(ui: &mut egui::Ui, tone: &mut ToneParams) {
    ComboBox::from_label("Waveform")
        .selected_text(tone.waveform.label())
        .show_ui(ui, |ui| {
            for waveform in Waveform::ALL {
                ui.selectable_value(&mut tone.waveform, waveform, waveform.label());
            }
        });
    ui.add(
        egui::Slider::new(&mut tone.frequency_hz, 20.0..=2_000.0)
            .logarithmic(true)
            .text("Frequency (Hz)"),
    );
    ui.add(egui::Slider::new(&mut tone.gain, 0.0..=1.0).text("Gain"));
}

fn stream_stats(ui: &mut egui::Ui, stream: &RingStream, sample_rate: f64, page_start: i64) {
    let (left, right, buffered) =
        stream.with_state(|state| (state.left_index(), state.right_index(), state.len()));
    ui.label(format!("Written: {right} samples"));
    ui.label(format!("Window: {left}..{right} ({buffered} buffered)"));
    match estimate_time_span(stream, OUTPUT_CURSOR, sample_rate, Motion::default()) {
        Ok(lag) => ui.label(format!("Output lag: {:.1} ms", lag * 1_000.0)),
        Err(_) => ui.label("Output lag: no reader yet"),
    };
    ui.label(format!("Page start: {page_start}"));
}

fn draw_page(ui: &mut egui::Ui, page: &[i16]) {
    let desired = egui::vec2(ui.available_width().max(200.0), 220.0);
    let (rect, _) = ui.allocate_exact_size(desired, egui::Sense::hover());
    let painter = ui.painter_at(rect);
    painter.rect(
        rect,
        Rounding::same(6.0),
        ui.visuals().faint_bg_color,
        Stroke::new(1.0, ui.visuals().weak_text_color()),
    );
    painter.hline(
        rect.x_range(),
        rect.center().y,
        Stroke::new(1.0, ui.visuals().weak_text_color().gamma_multiply(0.3)),
    );

    if page.iter().all(|&sample| sample == 0) {
        painter.text(
            rect.center(),
            Align2::CENTER_CENTER,
            "Waiting for signal...",
            FontId::proportional(14.0),
            ui.visuals().weak_text_color(),
        );
        return;
    }

    let len = page.len().saturating_sub(1).max(1);
    let points = page
        .iter()
        .enumerate()
        .map(|(i, &sample)| {
            let t = i as f32 / len as f32;
            let x = egui::lerp(rect.x_range(), t);
            let norm = (sample_to_unit(sample) + 1.0) * 0.5;
            let y = egui::lerp(rect.y_range(), 1.0 - norm);
            egui::pos2(x, y)
        })
        .collect::<Vec<_>>();
    painter.add(egui::Shape::line(
        points,
        Stroke::new(2.0, ui.visuals().selection.bg_fill),
    ));
}

fn output_selector(
    ui: &mut egui::Ui,
    devices: &[String],
    selected: &mut Option<String>,
    audio_error: &mut Option<String>,
) -> bool {
    let before = selected.clone();
    ComboBox::from_id_source("output_selector")
        .width(180.0)
        .selected_text(selected.as_deref().unwrap_or("Default output"))
        .show_ui(ui, |ui| {
            ui.selectable_value(selected, None, "Default output");
            for name in devices {
                ui.selectable_value(selected, Some(name.clone()), name);
            }
        });
    let changed = before != *selected;
    if changed {
        *audio_error = None;
    }
    changed
}

fn card(ui: &mut egui::Ui, title: &str, add_contents: impl FnOnce(&mut egui::Ui)) {
    egui::Frame::none()
        .fill(ui.visuals().extreme_bg_color)
        .stroke(Stroke::new(1.0, ui.visuals().weak_text_color()))
        .rounding(Rounding::same(8.0))
        .inner_margin(egui::Margin::same(12.0))
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.colored_label(ACCENT, title);
                ui.add_space(6.0);
                ui.separator();
            });
            ui.add_space(6.0);
            add_contents(ui);
        });
}

fn theme_selector(ui: &mut egui::Ui, ctx: &egui::Context, settings: &mut AppSettings) -> bool {
    let mut selected = settings.theme;
    ComboBox::from_id_source("theme_selector")
        .selected_text(selected.label())
        .show_ui(ui, |ui| {
            ui.selectable_value(&mut selected, ThemeKind::Dark, ThemeKind::Dark.label());
            ui.selectable_value(&mut selected, ThemeKind::Light, ThemeKind::Light.label());
        });

    if selected != settings.theme {
        settings.theme = selected;
        apply_theme(ctx, selected);
        true
    } else {
        false
    }
}

fn apply_theme(ctx: &egui::Context, theme: ThemeKind) {
    let mut style = (*ctx.style()).clone();
    match theme {
        ThemeKind::Dark => {
            style.visuals = egui::Visuals::dark();
            style.visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(18, 18, 18);
            style.visuals.window_fill = Color32::from_rgb(14, 14, 14);
            style.visuals.selection.bg_fill = ACCENT;
            style.visuals.selection.stroke = Stroke::new(1.0, Color32::from_rgb(12, 12, 12));
        }
        ThemeKind::Light => {
            style.visuals = egui::Visuals::light();
            style.visuals.selection.bg_fill = Color32::from_rgb(0, 150, 105);
            style.visuals.selection.stroke = Stroke::new(1.0, Color32::from_rgb(10, 50, 35));
        }
    }
    ctx.set_style(style);
}
