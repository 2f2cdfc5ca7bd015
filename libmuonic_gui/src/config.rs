use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ConfigError;

pub const DEFAULT_DOCS_URL: &str = "http://muonic.readthedocs.io/en/latest/";
pub const DEFAULT_MANUAL_URL: &str = "http://muonic.readthedocs.io/en/latest/manual.html";
pub const DEFAULT_JOIN_TIMEOUT_S: f64 = 10.0;

/// Parameters of the simulated acquisition engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Mean trigger rate of the fake card, in Hz
    pub mean_rate_hz: f64,
    /// Rate at which pulse-width events are emitted, in Hz
    pub pulse_rate_hz: f64,
    /// Fraction of pulses which also produce a decay candidate
    pub decay_fraction: f64,
    /// Fraction of pulses which also produce a flight time
    pub velocity_fraction: f64,
    /// Fixed seed for reproducible runs. Random if None
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mean_rate_hz: 12.0,
            pulse_rate_hz: 8.0,
            decay_fraction: 0.05,
            velocity_fraction: 0.1,
            seed: None,
        }
    }
}

/// Structure representing the application configuration.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_path: PathBuf,
    pub time_window: f64,
    pub daq_log_interval_ms: u64,
    pub ack_timeout_ms: u64,
    pub join_timeout_s: f64,
    pub record_rates: bool,
    pub docs_url: String,
    pub manual_url: String,
    pub simulation: SimulationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            time_window: 5.0,
            daq_log_interval_ms: 1500,
            ack_timeout_ms: 1500,
            join_timeout_s: DEFAULT_JOIN_TIMEOUT_S,
            record_rates: true,
            docs_url: String::from(DEFAULT_DOCS_URL),
            manual_url: String::from(DEFAULT_MANUAL_URL),
            simulation: SimulationConfig::default(),
        }
    }
}

/// $HOME/muonic_data, or ./muonic_data if there is no home directory
fn default_data_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("muonic_data")
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file, replacing any existing file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    pub fn daq_log_interval(&self) -> Duration {
        Duration::from_millis(self.daq_log_interval_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Falls back to 10 s when the configured value is not a valid duration
    pub fn join_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.join_timeout_s).unwrap_or_else(|e| {
            spdlog::warn!(
                "Invalid join timeout {} s ({e}), using {} s",
                self.join_timeout_s,
                DEFAULT_JOIN_TIMEOUT_S
            );
            Duration::from_secs_f64(DEFAULT_JOIN_TIMEOUT_S)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let path = PathBuf::from("/definitely/not/here/muonic.yaml");
        match Config::read_config_file(&path) {
            Err(ConfigError::BadFilePath(p)) => assert_eq!(p, path),
            _ => panic!(),
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("muonic.yaml");
        let mut config = Config::default();
        config.time_window = 12.5;
        config.record_rates = false;
        config.simulation.seed = Some(7);
        config.write_config_file(&path).unwrap();

        let read = Config::read_config_file(&path).unwrap();
        assert_eq!(read.time_window, 12.5);
        assert!(!read.record_rates);
        assert_eq!(read.simulation.seed, Some(7));
        assert_eq!(read.daq_log_interval(), Duration::from_millis(1500));
    }

    #[test]
    fn test_bad_join_timeout() {
        let mut config = Config::default();
        config.join_timeout_s = 2.5;
        assert_eq!(config.join_timeout(), Duration::from_millis(2500));
        for bad in [f64::INFINITY, f64::NAN, -1.0, 1e300] {
            config.join_timeout_s = bad;
            assert_eq!(config.join_timeout(), Duration::from_secs(10));
        }
    }
}
