// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod engine;
mod error;
mod gui;
mod link;
mod render;
mod simulator;
mod stream;
mod types;

use anyhow::Context;
use eframe::egui;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = config::AppConfig::load_or_default();
    log::info!("server endpoint: {}", config.resolve_ws_url());
    let app = gui::MonitorApp::new(config).context("failed to start monitor")?;

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1440.0, 900.0])
        .with_min_inner_size([1100.0, 720.0])
        .with_title("Voice Monitor");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native("voxmon", options, Box::new(move |_cc| Box::new(app)))
        .map_err(|err| anyhow::anyhow!("window closed with error: {err}"))
}
