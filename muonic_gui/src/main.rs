//! # muonic_gui
//!
//! Part of the muonic_gui crate family.
//!
//! This is the muonic front-end with a GUI using [egui](https://github.com/emilk/egui).
//!
//! ## Install
//!
//! Use `cargo install --path ./muonic_gui`
//!
//! ## Use
//!
//! To launch the application simply invoke it after it is installed
//!
//! ```bash
//! muonic_gui
//! ```
//!
//! If a file `muonic_gui.yaml` exists in the working directory it is used as the
//! configuration, otherwise the defaults are used. The tabs show the muon rates, pulse
//! widths, decay and velocity histograms, the card status, the raw DAQ output and the GPS
//! report. The card is configured through the Settings menu.

mod app;
mod dialogs;
mod panels;

use app::MuonicApp;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libmuonic_gui::config::Config;
use libmuonic_gui::controller::Controller;
use libmuonic_gui::engine::SimulatedEngine;

const CONFIG_PATH: &str = "./muonic_gui.yaml";

fn load_config(path: &Path) -> Config {
    if !path.exists() {
        spdlog::info!("No configuration at {}, using defaults", path.display());
        return Config::default();
    }
    match Config::read_config_file(path) {
        Ok(config) => {
            spdlog::info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            spdlog::error!("{}. Using the default configuration", e);
            Config::default()
        }
    }
}

/// The program entry point
fn main() {
    // Setup logging to a file
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./muonic_gui.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()
            .unwrap(),
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()
            .unwrap(),
    );
    spdlog::set_default_logger(logger);
    spdlog::info!("Starting muonic UI");

    let config = load_config(Path::new(CONFIG_PATH));
    let engine = Arc::new(SimulatedEngine::new(config.simulation.clone()));
    let mut controller = match Controller::new(config, engine) {
        Ok(controller) => controller,
        Err(e) => {
            spdlog::error!("Could not set up the main window: {}", e);
            return;
        }
    };
    if let Err(e) = controller.start() {
        spdlog::error!("Could not start the acquisition: {}", e);
        return;
    }

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("muonic")
            .with_inner_size(eframe::epaint::vec2(900.0, 650.0))
            .with_min_inner_size(eframe::epaint::vec2(600.0, 400.0)),
        ..Default::default()
    };
    match eframe::run_native(
        "muonic_gui",
        native_options,
        Box::new(|cc| Ok(Box::new(MuonicApp::new(cc, controller)))),
    ) {
        Ok(()) => (),
        Err(e) => spdlog::error!("Eframe error: {}", e),
    }
}
