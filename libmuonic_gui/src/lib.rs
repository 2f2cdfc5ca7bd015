//! # muonic_gui
//!
//! muonic_gui is a desktop front-end for the QuarkNet-style DAQ card used with the muonic
//! cosmic ray detector, written in Rust. It shows live muon rates, pulse widths, decay
//! times, and flight times, and lets the operator configure the card (channels,
//! coincidence level, veto, thresholds, gate width) through a few dialogs.
//!
//! ## Installation
//!
//! Only installation from source is supported.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the GUI use `cargo install --path ./muonic_gui` from the top level
//! repository.
//!
//! To build and install the headless front-end use `cargo install --path ./muonic_gui_cli`.
//!
//! ## Structure
//!
//! This library holds everything that does not depend on the GUI toolkit:
//!
//! - [`registry`] and [`widgets`]: the display panels and their state
//! - [`settings`]: the settings store shared with the acquisition engine
//! - [`commands`]: translation of settings into DAQ card commands
//! - [`dialogs`]: models of the settings dialogs
//! - [`engine`]: the acquisition engine contract, and a simulated card
//! - [`controller`]: event routing, dialog flows, and the lifecycle of the engine worker
//! - [`menu`]: the menu bar and its dispatch table
//!
//! ## Configuration
//!
//! The front-ends read an optional YAML configuration file. A template can be written with
//! `muonic_gui_cli -p muonic_gui.yaml new`. The format is as follows:
//!
//! ```yml
//! data_path: /home/user/muonic_data
//! time_window: 5.0
//! daq_log_interval_ms: 1500
//! ack_timeout_ms: 1500
//! join_timeout_s: 10.0
//! record_rates: true
//! docs_url: http://muonic.readthedocs.io/en/latest/
//! manual_url: http://muonic.readthedocs.io/en/latest/manual.html
//! simulation:
//!   mean_rate_hz: 12.0
//!   pulse_rate_hz: 8.0
//!   decay_fraction: 0.05
//!   velocity_fraction: 0.1
//!   seed: null
//! ```
//!
//! ## Output
//!
//! With `record_rates` set, every rate measurement is written to
//! `<data_path>/<start date>_R.txt`. The file has a `.partial` suffix while the
//! measurement is running. The GUI also writes a log file `muonic_gui.log` to the working
//! directory, which is the first place to look when something goes wrong.
pub mod commands;
pub mod config;
pub mod controller;
pub mod dialogs;
pub mod engine;
pub mod error;
pub mod event;
pub mod menu;
pub mod registry;
pub mod settings;
pub mod timer;
pub mod widgets;
