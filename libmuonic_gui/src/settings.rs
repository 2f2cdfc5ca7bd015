//! Key-value settings shared between the controller and the acquisition engine.
//!
//! The engine owns the store; everyone else goes through [`SettingsAccess`]. The typed
//! views ([`ThresholdSettings`], [`ChannelConfig`], [`AdvancedSettings`]) are the only
//! way the dialogs touch settings, so key spelling lives in one place.
use fxhash::FxHashMap;
use std::fmt::Display;
use std::sync::RwLock;

use super::error::SettingError;

pub const N_CHANNELS: usize = 4;
pub const N_COINCIDENCES: usize = 4;
pub const N_VETO_CHANNELS: usize = 3;

pub const DEFAULT_THRESHOLD: u32 = 300;
pub const DEFAULT_GATE_WIDTH: u32 = 100;
pub const DEFAULT_TIME_WINDOW: f64 = 5.0;
pub const MIN_TIME_WINDOW: f64 = 0.01;
pub const MAX_TIME_WINDOW: f64 = 10000.0;

/// Setting keys as understood by the acquisition engine
pub mod keys {
    pub const VETO: &str = "veto";
    pub const GATE_WIDTH: &str = "gate_width";
    pub const TIME_WINDOW: &str = "time_window";
    pub const WRITE_DAQ_STATUS: &str = "write_daq_status";

    pub fn threshold(channel: usize) -> String {
        format!("threshold_ch{channel}")
    }

    pub fn active_channel(channel: usize) -> String {
        format!("active_ch{channel}")
    }

    pub fn coincidence(level: usize) -> String {
        format!("coincidence{level}")
    }

    pub fn veto_channel(channel: usize) -> String {
        format!("veto_ch{channel}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl SettingValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.is_finite() => Some(*v as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u32> for SettingValue {
    fn from(value: u32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Read/write access to settings through a shared reference.
///
/// Implemented by the acquisition engine, and by a lock around [`Settings`].
pub trait SettingsAccess {
    fn get_setting(&self, key: &str, default: SettingValue) -> SettingValue;
    fn update_setting(&self, key: &str, value: SettingValue);

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get_setting(key, default.into())
            .as_bool()
            .unwrap_or(default)
    }

    fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.get_setting(key, default.into())
            .as_i64()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(default)
    }

    fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get_setting(key, default.into())
            .as_f64()
            .unwrap_or(default)
    }
}

/// The settings store
#[derive(Debug, Clone)]
pub struct Settings {
    values: FxHashMap<String, SettingValue>,
}

impl Default for Settings {
    /// The settings a freshly powered card reports: all channels on, singles, no veto
    fn default() -> Self {
        let mut settings = Self::empty();
        for ch in 0..N_CHANNELS {
            settings.set(&keys::threshold(ch), DEFAULT_THRESHOLD.into());
            settings.set(&keys::active_channel(ch), true.into());
        }
        for level in 0..N_COINCIDENCES {
            settings.set(&keys::coincidence(level), (level == 0).into());
        }
        settings.set(keys::VETO, false.into());
        for ch in 0..N_VETO_CHANNELS {
            settings.set(&keys::veto_channel(ch), false.into());
        }
        settings.set(keys::GATE_WIDTH, DEFAULT_GATE_WIDTH.into());
        settings.set(keys::TIME_WINDOW, DEFAULT_TIME_WINDOW.into());
        settings.set(keys::WRITE_DAQ_STATUS, false.into());
        settings
    }
}

impl Settings {
    pub fn empty() -> Self {
        Self {
            values: FxHashMap::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, value: SettingValue) {
        self.values.insert(key.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SettingsAccess for RwLock<Settings> {
    fn get_setting(&self, key: &str, default: SettingValue) -> SettingValue {
        match self.read() {
            Ok(settings) => settings.get(key).cloned().unwrap_or(default),
            Err(_) => {
                spdlog::error!("Settings lock poisoned while reading {key}");
                default
            }
        }
    }

    fn update_setting(&self, key: &str, value: SettingValue) {
        match self.write() {
            Ok(mut settings) => settings.set(key, value),
            Err(_) => spdlog::error!("Settings lock poisoned while writing {key}"),
        }
    }
}

/// Check that a time window (in seconds) is one the rate measurement can use
pub fn validate_time_window(time_window: f64) -> Result<f64, SettingError> {
    if (MIN_TIME_WINDOW..=MAX_TIME_WINDOW).contains(&time_window) {
        Ok(time_window)
    } else {
        Err(SettingError::OutOfRange {
            key: keys::TIME_WINDOW.to_string(),
            value: time_window,
            min: MIN_TIME_WINDOW,
            max: MAX_TIME_WINDOW,
        })
    }
}

/// Discriminator thresholds of the four channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdSettings {
    pub thresholds: [u32; N_CHANNELS],
}

impl ThresholdSettings {
    pub fn load<S: SettingsAccess + ?Sized>(settings: &S) -> Self {
        let mut thresholds = [DEFAULT_THRESHOLD; N_CHANNELS];
        for (ch, threshold) in thresholds.iter_mut().enumerate() {
            *threshold = settings.get_u32(&keys::threshold(ch), DEFAULT_THRESHOLD);
        }
        Self { thresholds }
    }

    pub fn store<S: SettingsAccess + ?Sized>(&self, settings: &S) {
        for (ch, threshold) in self.thresholds.iter().enumerate() {
            settings.update_setting(&keys::threshold(ch), (*threshold).into());
        }
    }
}

/// Channel enables, coincidence level, and veto selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelConfig {
    pub channels: [bool; N_CHANNELS],
    /// singles, twofold, threefold, fourfold
    pub coincidences: [bool; N_COINCIDENCES],
    pub veto: bool,
    pub veto_channels: [bool; N_VETO_CHANNELS],
}

impl ChannelConfig {
    pub const COINCIDENCE_NAMES: [&'static str; N_COINCIDENCES] =
        ["singles", "twofold", "threefold", "fourfold"];

    pub fn load<S: SettingsAccess + ?Sized>(settings: &S) -> Self {
        let mut config = Self::default();
        for ch in 0..N_CHANNELS {
            config.channels[ch] = settings.get_bool(&keys::active_channel(ch), true);
        }
        for level in 0..N_COINCIDENCES {
            config.coincidences[level] = settings.get_bool(&keys::coincidence(level), level == 0);
        }
        config.veto = settings.get_bool(keys::VETO, false);
        for ch in 0..N_VETO_CHANNELS {
            config.veto_channels[ch] = settings.get_bool(&keys::veto_channel(ch), false);
        }
        config
    }

    pub fn store<S: SettingsAccess + ?Sized>(&self, settings: &S) {
        for ch in 0..N_CHANNELS {
            settings.update_setting(&keys::active_channel(ch), self.channels[ch].into());
        }
        for level in 0..N_COINCIDENCES {
            settings.update_setting(&keys::coincidence(level), self.coincidences[level].into());
        }
        settings.update_setting(keys::VETO, self.veto.into());
        for ch in 0..N_VETO_CHANNELS {
            settings.update_setting(&keys::veto_channel(ch), self.veto_channels[ch].into());
        }
    }
}

/// Gate width (ns), rate time window (s), and whether DAQ status lines are written
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvancedSettings {
    pub gate_width: u32,
    pub time_window: f64,
    pub write_daq_status: bool,
}

impl AdvancedSettings {
    pub fn load<S: SettingsAccess + ?Sized>(settings: &S) -> Self {
        Self {
            gate_width: settings.get_u32(keys::GATE_WIDTH, DEFAULT_GATE_WIDTH),
            time_window: settings.get_f64(keys::TIME_WINDOW, DEFAULT_TIME_WINDOW),
            write_daq_status: settings.get_bool(keys::WRITE_DAQ_STATUS, false),
        }
    }

    pub fn store<S: SettingsAccess + ?Sized>(&self, settings: &S) {
        settings.update_setting(keys::GATE_WIDTH, self.gate_width.into());
        settings.update_setting(keys::TIME_WINDOW, self.time_window.into());
        settings.update_setting(keys::WRITE_DAQ_STATUS, self.write_daq_status.into());
    }
}
