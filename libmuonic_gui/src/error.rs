use std::path::PathBuf;
use thiserror::Error;

use super::event::MeasurementEvent;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Widget with name '{0}' already exists")]
    DuplicateName(String),
    #[error("Widget '{0}' does not provide the required capabilities (missing: {1})")]
    InvalidCapability(String, String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SettingError {
    #[error("Setting {key} = {value} is outside of the allowed range [{min}, {max}]")]
    OutOfRange {
        key: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("Widget failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Widget could not format a timestamp: {0}")]
    TimeFormat(#[from] time::error::Format),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine could not deliver an event because the receiver hung up")]
    SinkDisconnected(#[from] std::sync::mpsc::SendError<MeasurementEvent>),
    #[error("Engine failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Engine received a malformed command: {0}")]
    BadCommand(String),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Controller failed due to Registry error: {0}")]
    RegistryError(#[from] RegistryError),
    #[error("Controller failed due to Widget error: {0}")]
    WidgetError(#[from] WidgetError),
    #[error("Controller failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Controller failed to spawn the engine worker: {0}")]
    SpawnError(std::io::Error),
    #[error("Controller worker is already running")]
    AlreadyRunning,
}
