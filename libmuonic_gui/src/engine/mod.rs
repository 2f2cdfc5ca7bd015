//! The contract between the front-end and the acquisition engine.
//!
//! The engine owns the settings and the connection to the card, and runs its main loop
//! on a worker thread owned by the controller. Commands are fire-and-forget; queries
//! hand back a receiver which is signalled once the card's reply has been applied to
//! the settings.
use std::sync::mpsc::{Receiver, Sender};

use super::commands::DaqCommand;
use super::error::EngineError;
use super::event::MeasurementEvent;
use super::settings::SettingsAccess;

pub mod simulated;

pub use simulated::SimulatedEngine;

pub trait AcquisitionEngine: SettingsAccess + Send + Sync {
    /// Enqueue a command for the card
    fn put(&self, command: DaqCommand);

    /// Enqueue a query. The returned receiver gets a message once the answer is in the
    /// settings
    fn query(&self, command: DaqCommand) -> Receiver<()>;

    /// Ask the main loop to return
    fn stop(&self);

    /// The main loop. Blocks until [`AcquisitionEngine::stop`] is called or the sink hangs
    /// up
    fn run(&self, sink: Sender<MeasurementEvent>) -> Result<(), EngineError>;
}
