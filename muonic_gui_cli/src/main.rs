use clap::{value_parser, Arg, Command};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use libmuonic_gui::config::Config;
use libmuonic_gui::controller::Controller;
use libmuonic_gui::engine::SimulatedEngine;
use libmuonic_gui::settings::{keys, SettingsAccess, DEFAULT_TIME_WINDOW};
use libmuonic_gui::widgets::rate::RATE_LABELS;
use libmuonic_gui::widgets::RateWidget;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

/// Log the latest rates shown by the rate widget
fn log_rates(controller: &Controller) {
    let Some(rate) = controller.registry().get_as::<RateWidget>("rate") else {
        return;
    };
    let rates: Vec<String> = RATE_LABELS
        .iter()
        .zip(rate.rate_fields.iter())
        .map(|(label, value)| format!("{label}={value}"))
        .collect();
    log::info!(
        "Rates [1/s]: {} | max {} | window {}",
        rates.join(" "),
        rate.info_field("max_rate").unwrap_or("--"),
        rate.info_field("daq_time").unwrap_or("--"),
    );
}

/// Run the controller without a window until `duration` has passed
fn run(config: Config, duration: Duration) {
    let engine = Arc::new(SimulatedEngine::new(config.simulation.clone()));
    let mut controller = match Controller::new(config, engine) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    if let Err(e) = controller.start() {
        log::error!("{e}");
        return;
    }
    let time_window = Duration::from_secs_f64(
        controller
            .engine()
            .get_f64(keys::TIME_WINDOW, DEFAULT_TIME_WINDOW),
    );
    log::info!("Acquisition started, running for {:.0} s", duration.as_secs_f64());

    let started = Instant::now();
    let mut last_report = started;
    let mut n_events = 0;
    while started.elapsed() < duration {
        std::thread::sleep(POLL_INTERVAL);
        n_events += controller.poll_events();
        controller.tick(Instant::now());
        if let Some(e) = controller.take_worker_error() {
            log::error!("Acquisition failed with error: {e}");
            break;
        }
        if last_report.elapsed() >= time_window {
            last_report = Instant::now();
            log_rates(&controller);
        }
    }

    // no operator to ask
    controller.confirm_close(true);
    log::info!("Handled {n_events} events");
}

fn main() {
    // Create a cli
    let matches = Command::new("muonic_gui_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("run")
                .about("Run the acquisition without a window and log the rates")
                .arg(
                    Arg::new("duration")
                        .short('d')
                        .long("duration")
                        .help("How long to run, in seconds")
                        .value_parser(value_parser!(u64))
                        .default_value("60"),
                ),
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    if let Err(e) = simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    ) {
        eprintln!("Could not create logging: {e}");
    }

    let config_path = matches.get_one::<String>("path").map(PathBuf::from);

    match matches.subcommand() {
        Some(("new", _)) => {
            let Some(config_path) = config_path else {
                log::error!("A path is required to write the template config");
                return;
            };
            log::info!(
                "Making a template config at {}...",
                config_path.to_string_lossy()
            );
            match make_template_config(&config_path) {
                Ok(()) => log::info!("Done."),
                Err(e) => log::error!("Could not write the template config: {e}"),
            }
        }
        Some(("run", args)) => {
            let config = match config_path {
                Some(path) => {
                    log::info!("Loading config from {}...", path.to_string_lossy());
                    match Config::read_config_file(&path) {
                        Ok(c) => c,
                        Err(e) => {
                            log::error!("{e}");
                            return;
                        }
                    }
                }
                None => {
                    log::info!("No config given, using the defaults");
                    Config::default()
                }
            };
            log::info!("Config successfully loaded.");
            log::info!("Data Path: {}", config.data_path.to_string_lossy());
            log::info!("Time Window: {} s", config.time_window);
            log::info!("Record Rates: {}", config.record_rates);

            let seconds = args.get_one::<u64>("duration").copied().unwrap_or(60);
            run(config, Duration::from_secs(seconds));
            log::info!("Done.");
        }
        _ => (),
    }
}
