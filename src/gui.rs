// src/gui.rs
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use eframe::egui;
use egui::{Color32, RichText, Sense, Vec2};
use egui_plot::{Bar, BarChart, Plot};

use crate::config::AppConfig;
use crate::engine::{self, SampleBacklog};
use crate::link::ConnectionState;
use crate::render::egui_surface::color32;
use crate::render::{Channel, EguiSurface, Scene, Size, Theme, View};
use crate::stream::sample::{band_energy, dominant_band};
use crate::stream::{
    snr_bar_fraction, Dashboard, FilterKind, FilterSettings, SnrGrade, BAND_LABELS,
};
use crate::types::*;

const SYNC_REVERT: Duration = Duration::from_secs(3);
const TABLE_ROWS: usize = 10;
const LOG_LINES: usize = 8;
const VIEW_HEIGHT: f32 = 190.0;
const EXPORT_SIZE: Size = Size::new(960.0, 320.0);
// Keeps the channel drained while nothing is being painted.
const POLL_EVERY: Duration = Duration::from_millis(50);

/// Text next to the filter Apply button.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncStatus {
    text: String,
    revert_at: Option<Instant>,
}

impl SyncStatus {
    pub fn new() -> Self {
        Self {
            text: "Not connected".to_owned(),
            revert_at: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn syncing(&mut self) {
        self.text = "Syncing...".to_owned();
        self.revert_at = None;
    }

    pub fn resolve(&mut self, outcome: &FilterOutcome, now: Instant) {
        match outcome {
            FilterOutcome::Sent(settings) => {
                self.text = settings.summary();
                self.revert_at = Some(now + SYNC_REVERT);
            }
            FilterOutcome::NotConnected => {
                self.text = "Not connected".to_owned();
                self.revert_at = None;
            }
            FilterOutcome::Rejected(reason) => {
                self.text = format!("Invalid: {reason}");
                self.revert_at = None;
            }
        }
    }

    /// Link came up or went down without an apply in flight.
    pub fn link_changed(&mut self, open: bool) {
        if self.revert_at.is_none() {
            self.text = if open { "Ready" } else { "Not connected" }.to_owned();
        }
    }

    /// Returns true when the text changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.revert_at {
            Some(at) if now >= at => {
                self.text = "Ready".to_owned();
                self.revert_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn revert_at(&self) -> Option<Instant> {
        self.revert_at
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MonitorApp {
    config: AppConfig,

    // link state
    link_state: ConnectionState,
    peer_connected: bool,
    connection_mode: ConnectionMode,
    reconnect: Option<(u32, Duration)>,

    // data
    dashboard: Dashboard,
    scene: Scene,
    theme: Theme,

    // filter editor
    filter: FilterSettings,
    sync: SyncStatus,

    log_messages: Vec<String>,

    rx: Receiver<EngineMessage>,
    tx_cmd: Sender<GuiCommand>,
    backlog: SampleBacklog,
}

impl MonitorApp {
    pub fn new(config: AppConfig) -> Result<Self> {
        let dashboard_config = config.dashboard_config();
        let dashboard =
            Dashboard::new(&dashboard_config).context("invalid dashboard buffer settings")?;
        let scene = Scene::new(&dashboard_config, config.theme);

        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();
        let backlog = SampleBacklog::default();
        engine::spawn_thread(tx, rx_cmd, backlog.clone(), config.clone());
        // Connect on startup; the engine keeps retrying on its own.
        tx_cmd.send(GuiCommand::Connect(config.start_mode)).ok();

        Ok(Self {
            link_state: ConnectionState::Disconnected,
            peer_connected: false,
            connection_mode: config.start_mode,
            reconnect: None,
            dashboard,
            scene,
            theme: config.theme,
            filter: FilterSettings::default(),
            sync: SyncStatus::new(),
            log_messages: vec!["Voice monitor ready.".to_owned()],
            rx,
            tx_cmd,
            backlog,
            config,
        })
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {msg}"));
        if self.log_messages.len() > LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    fn send(&self, cmd: GuiCommand) {
        if self.tx_cmd.send(cmd).is_err() {
            log::error!("engine thread is gone");
        }
    }

    fn apply(&mut self, settings: FilterSettings) {
        self.sync.syncing();
        self.send(GuiCommand::ApplyFilter(settings));
    }

    fn drain_messages(&mut self) {
        let now = Instant::now();
        let mut dirty = false;
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                EngineMessage::Log(s) => self.log(&s),
                EngineMessage::State(state) => {
                    self.link_state = state;
                    if state == ConnectionState::Open {
                        self.reconnect = None;
                    }
                    self.sync.link_changed(state == ConnectionState::Open);
                    self.log(state.label());
                }
                EngineMessage::ReconnectScheduled { attempt, delay } => {
                    self.reconnect = Some((attempt, delay));
                }
                EngineMessage::PeerDevice(connected) => self.peer_connected = connected,
                EngineMessage::Sample(sample) => {
                    self.backlog.release();
                    dirty |= self.dashboard.ingest(&sample, now);
                }
                EngineMessage::Filter(outcome) => {
                    if let FilterOutcome::Rejected(reason) = &outcome {
                        self.log(&format!("Filter rejected: {reason}"));
                    }
                    self.sync.resolve(&outcome, now);
                }
            }
        }
        if dirty {
            self.scene.submit(&self.dashboard);
        }
    }

    fn export(&mut self, view: View) -> Result<PathBuf> {
        let png = self
            .scene
            .export_png(view, &self.dashboard, EXPORT_SIZE)
            .with_context(|| format!("failed to render {}", view.title()))?;
        fs::create_dir_all(&self.config.export_dir)
            .with_context(|| format!("failed to create {:?}", self.config.export_dir))?;
        let name = format!(
            "{}_{}.png",
            view.file_stem(),
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.config.export_dir.join(name);
        fs::write(&path, png).with_context(|| format!("failed to write {path:?}"))?;
        Ok(path)
    }

    fn status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Voice Monitor");
            ui.label(RichText::new("Real-time signal processing & FFT analysis").weak());
            ui.separator();

            let (dot, text) = match self.link_state {
                ConnectionState::Open => (Color32::from_rgb(74, 222, 128), "Dashboard Connected"),
                ConnectionState::Connecting => (Color32::YELLOW, "Connecting..."),
                ConnectionState::Closing => (Color32::YELLOW, "Closing..."),
                ConnectionState::Disconnected => {
                    (Color32::from_rgb(248, 113, 113), "Dashboard Disconnected")
                }
            };
            ui.label(RichText::new(format!("● {text}")).color(dot));
            if let (ConnectionState::Disconnected, Some((attempt, delay))) =
                (self.link_state, self.reconnect)
            {
                ui.label(
                    RichText::new(format!("retry #{attempt} in {} ms", delay.as_millis()))
                        .small()
                        .weak(),
                );
            }
            ui.separator();
            let (dot, text) = if self.peer_connected {
                (Color32::from_rgb(74, 222, 128), "Device Connected")
            } else {
                (Color32::from_rgb(248, 113, 113), "Device Disconnected")
            };
            ui.label(RichText::new(format!("● {text}")).color(dot));
            ui.separator();
            ui.label(format!("Last update: {}", self.dashboard.last_update()));

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let mut theme = self.theme;
                ui.selectable_value(&mut theme, Theme::Light, "Light");
                ui.selectable_value(&mut theme, Theme::Dark, "Dark");
                if theme != self.theme {
                    self.theme = theme;
                    self.scene.set_theme(theme);
                }
                ui.separator();
                if self.link_state == ConnectionState::Open {
                    ui.label(
                        RichText::new(format!("● {}", self.connection_mode.label()))
                            .strong()
                            .color(color32(Channel::Raw.accent())),
                    );
                }
            });
        });
    }

    fn connection_controls(&mut self, ui: &mut egui::Ui) {
        ui.label("SOURCE");
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.connection_mode, ConnectionMode::Live, "LIVE");
            ui.selectable_value(&mut self.connection_mode, ConnectionMode::Simulation, "SIM");
        });
        let idle = matches!(self.link_state, ConnectionState::Disconnected);
        ui.horizontal(|ui| {
            let btn_txt = if idle { "CONNECT" } else { "DISCONNECT" };
            if ui.button(btn_txt).clicked() {
                if idle {
                    self.send(GuiCommand::Connect(self.connection_mode));
                } else {
                    self.send(GuiCommand::Disconnect);
                }
            }
            if ui.button("🔄 CLEAR").clicked() {
                self.dashboard.clear();
                self.scene.submit(&self.dashboard);
            }
        });
    }

    fn filter_controls(&mut self, ui: &mut egui::Ui) {
        ui.label("FILTER");
        egui::ComboBox::from_id_source("filter_kind")
            .selected_text(self.filter.kind.label())
            .show_ui(ui, |ui| {
                for kind in FilterKind::ALL {
                    ui.selectable_value(&mut self.filter.kind, kind, kind.label());
                }
            });

        let cutoff_label = if self.filter.kind == FilterKind::BandPass {
            "Low cutoff"
        } else {
            "Cutoff"
        };
        ui.add(
            egui::Slider::new(&mut self.filter.cutoff_hz, 100.0..=8000.0)
                .step_by(50.0)
                .suffix(" Hz")
                .text(cutoff_label),
        );
        if self.filter.kind == FilterKind::BandPass {
            let mut high = self.filter.cutoff_high_hz.unwrap_or(3400.0);
            ui.add(
                egui::Slider::new(&mut high, 100.0..=8000.0)
                    .step_by(50.0)
                    .suffix(" Hz")
                    .text("High cutoff"),
            );
            self.filter.cutoff_high_hz = Some(high);
        }
        ui.add(
            egui::Slider::new(&mut self.filter.voice_boost, 100..=300)
                .step_by(10.0)
                .suffix(" %")
                .text("Voice boost"),
        );
        let mut rate = self.filter.update_rate_ms.unwrap_or(200);
        ui.add(
            egui::Slider::new(&mut rate, 50..=500)
                .step_by(10.0)
                .suffix(" ms")
                .text("Update rate"),
        );
        self.filter.update_rate_ms = Some(rate);

        if let Err(err) = self.filter.validate() {
            ui.label(RichText::new(err.to_string()).small().color(Color32::YELLOW));
        }

        ui.horizontal(|ui| {
            if ui.button("APPLY").clicked() {
                self.apply(self.filter.clone());
            }
            if ui.button("DEFAULT").clicked() {
                self.filter = FilterSettings::default();
            }
            if ui.button("RESET").clicked() {
                self.filter = FilterSettings::reset();
                self.apply(self.filter.clone());
            }
        });

        let color = match self.sync.text() {
            "Ready" => Color32::GRAY,
            "Not connected" => Color32::from_rgb(248, 113, 113),
            t if t.starts_with("Invalid") => Color32::from_rgb(248, 113, 113),
            _ => Color32::from_rgb(74, 222, 128),
        };
        ui.label(RichText::new(self.sync.text()).color(color));
    }

    fn signal_quality(&self, ui: &mut egui::Ui) {
        let quality = self.dashboard.quality();
        ui.label("SIGNAL QUALITY");
        for (name, snr, channel) in [
            ("Raw SNR", quality.raw_db, Channel::Raw),
            ("Filtered SNR", quality.filtered_db, Channel::Filtered),
        ] {
            ui.horizontal(|ui| {
                ui.label(format!("{name}: {snr:.1} dB"));
                ui.label(RichText::new(SnrGrade::from_db(snr).label()).strong());
            });
            ui.add(
                egui::ProgressBar::new(snr_bar_fraction(snr) as f32)
                    .fill(color32(channel.accent())),
            );
        }
        let improvement = quality.improvement_db();
        let sign = if improvement >= 0.0 { "+" } else { "" };
        ui.label(format!(
            "Improvement: {sign}{improvement:.1} dB ({:.2}x)",
            quality.improvement_ratio()
        ));
    }

    fn session_stats(&self, ui: &mut egui::Ui) {
        let stats = self.dashboard.stats();
        ui.label("SESSION");
        egui::Grid::new("session_stats").num_columns(2).show(ui, |ui| {
            ui.label("Avg volume");
            ui.label(format!("{:.1} %", stats.avg_volume));
            ui.end_row();
            ui.label("Avg filtered");
            ui.label(format!("{:.1} %", stats.avg_volume_filtered));
            ui.end_row();
            ui.label("Min / max");
            ui.label(format!("{:.0} / {:.0} %", stats.min_volume, stats.max_volume));
            ui.end_row();
            ui.label("Avg peak-to-peak");
            ui.label(format!("{:.0}", stats.avg_peak_to_peak));
            ui.end_row();
        });
    }

    fn metric_cards(&self, ui: &mut egui::Ui) {
        let m = self.dashboard.metrics();
        let cards = [
            ("Raw Amplitude", format!("{:.0} %", m.volume), color32(Channel::Raw.accent())),
            (
                "Filtered Amplitude",
                format!("{:.0} %", m.volume_filtered),
                color32(Channel::Filtered.accent()),
            ),
            ("Peak-to-Peak", format!("{:.0} units", m.peak_to_peak), Color32::from_rgb(192, 132, 252)),
            ("ADC Minimum", format!("{:.0}", m.min), Color32::LIGHT_GRAY),
            ("ADC Maximum", format!("{:.0}", m.max), Color32::LIGHT_GRAY),
            ("Mean Value", format!("{:.0}", m.avg.round()), Color32::LIGHT_GRAY),
        ];
        ui.columns(cards.len(), |cols| {
            for (col, (title, value, color)) in cols.iter_mut().zip(cards) {
                col.group(|ui| {
                    ui.label(RichText::new(title).small().weak());
                    ui.label(RichText::new(value).size(20.0).strong().color(color));
                });
            }
        });
    }

    fn visualization(&mut self, ui: &mut egui::Ui, view: View) {
        ui.horizontal(|ui| {
            ui.label(RichText::new(view.title()).strong());
            if ui.small_button("Save PNG").clicked() {
                match self.export(view) {
                    Ok(path) => self.log(&format!("Saved {}", path.display())),
                    Err(err) => {
                        log::warn!("{err:#}");
                        self.log(&format!("Export failed: {err:#}"));
                    }
                }
            }
        });
        let width = ui.available_width();
        let (response, painter) = ui.allocate_painter(Vec2::new(width, VIEW_HEIGHT), Sense::hover());
        let rect = response.rect;
        let list = self.scene.layout(view, Size::new(rect.width(), rect.height()));
        list.replay(&mut EguiSurface::new(&painter, rect));
    }

    fn band_bars(&self, ui: &mut egui::Ui) {
        let raw = self.dashboard.bands_raw();
        let filtered = self.dashboard.bands_filtered();
        let chart = |bands: &[f64], offset: f64, channel: Channel| {
            let bars = bands
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    let name = BAND_LABELS.get(i).copied().unwrap_or("?");
                    // Keep a sliver visible for silent bands.
                    Bar::new(i as f64 + offset, v.max(4.0)).width(0.35).name(name)
                })
                .collect();
            BarChart::new(bars)
                .color(color32(channel.accent()))
                .name(channel.label())
        };
        Plot::new("band_bars")
            .height(150.0)
            .include_y(0.0)
            .include_y(100.0)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .show_x(false)
            .legend(egui_plot::Legend::default())
            .show(ui, |plot_ui| {
                plot_ui.bar_chart(chart(raw, -0.2, Channel::Raw));
                plot_ui.bar_chart(chart(filtered, 0.2, Channel::Filtered));
            });
        ui.horizontal(|ui| {
            for label in BAND_LABELS {
                ui.label(RichText::new(label).small().weak());
            }
        });
        let describe = |bands: &[f64]| {
            let peak = dominant_band(Some(bands))
                .and_then(|i| BAND_LABELS.get(i))
                .copied()
                .unwrap_or("-");
            format!("energy {:.1}, peak {peak}", band_energy(Some(bands)))
        };
        ui.label(
            RichText::new(format!("Raw: {} | Filtered: {}", describe(raw), describe(filtered)))
                .small(),
        );
    }

    fn measurement_log(&self, ui: &mut egui::Ui) {
        ui.label(RichText::new("Measurement Log").strong());
        if self.dashboard.log().is_empty() {
            ui.label(RichText::new("Awaiting sensor data...").weak());
            return;
        }
        egui::Grid::new("measurement_log")
            .striped(true)
            .num_columns(6)
            .show(ui, |ui| {
                for head in [
                    "Timestamp",
                    "Raw Amp. (%)",
                    "Filtered (%)",
                    "Peak-to-Peak",
                    "ADC Min",
                    "ADC Max",
                ] {
                    ui.label(RichText::new(head).small().strong());
                }
                ui.end_row();
                let opt = |v: Option<f64>| v.map_or_else(|| "-".to_owned(), |v| format!("{v:.0}"));
                for row in self.dashboard.log().iter().take(TABLE_ROWS) {
                    let time = row.display_time();
                    ui.monospace(if time == "-" { "N/A".to_owned() } else { time });
                    ui.label(format!("{:.0}", row.volume));
                    ui.label(opt(row.volume_filtered));
                    ui.label(format!("{:.0}", row.peak_to_peak));
                    ui.label(opt(row.min));
                    ui.label(opt(row.max));
                    ui.end_row();
                }
            });
    }
}

impl eframe::App for MonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. Engine messages
        self.drain_messages();
        let now = Instant::now();
        self.sync.tick(now);

        // 2. Frame bookkeeping for the paint pipelines
        self.scene.begin_frame();
        ctx.set_visuals(match self.theme {
            Theme::Dark => egui::Visuals::dark(),
            Theme::Light => egui::Visuals::light(),
        });

        // 3. UI
        egui::TopBottomPanel::top("status").show(ctx, |ui| {
            ui.add_space(4.0);
            self.status_bar(ui);
            ui.add_space(4.0);
        });

        egui::SidePanel::left("controls").min_width(280.0).show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.add_space(8.0);
                self.connection_controls(ui);
                ui.separator();
                self.filter_controls(ui);
                ui.separator();
                self.signal_quality(ui);
                ui.separator();
                self.session_stats(ui);
                ui.separator();
                egui::ScrollArea::vertical()
                    .id_source("engine_log")
                    .max_height(120.0)
                    .show(ui, |ui| {
                        for m in &self.log_messages {
                            ui.monospace(m);
                        }
                    });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.metric_cards(ui);
                ui.add_space(8.0);
                ui.columns(2, |cols| {
                    self.visualization(&mut cols[0], View::WaveformRaw);
                    self.visualization(&mut cols[1], View::WaveformFiltered);
                });
                ui.columns(2, |cols| {
                    self.visualization(&mut cols[0], View::SpectrogramRaw);
                    self.visualization(&mut cols[1], View::SpectrogramFiltered);
                });
                ui.add_space(8.0);
                self.band_bars(ui);
                ui.add_space(8.0);
                self.measurement_log(ui);
            });
        });

        // 4. Schedule the next frame
        if self.scene.has_pending() {
            ctx.request_repaint();
        } else {
            let until_revert = self
                .sync
                .revert_at()
                .map(|at| at.saturating_duration_since(now));
            ctx.request_repaint_after(until_revert.map_or(POLL_EVERY, |d| d.min(POLL_EVERY)));
        }
    }
}

impl Drop for MonitorApp {
    fn drop(&mut self) {
        self.scene.teardown();
        self.tx_cmd.send(GuiCommand::Shutdown).ok();
    }
}
