//! Models of the settings dialogs.
//!
//! A dialog is created from the current settings, edited by the front-end through its
//! public fields, and closed with either [`DialogOutcome::Accepted`] carrying the edited
//! (and range-checked) values, or [`DialogOutcome::Cancelled`].
use super::settings::{AdvancedSettings, ChannelConfig, ThresholdSettings};

/// Highest threshold the card's discriminators take (mV)
pub const MAX_THRESHOLD: u32 = 1000;
/// Highest gate width the card registers can hold (ns)
pub const MAX_GATE_WIDTH: u32 = u16::MAX as u32 * 10;

pub const HELP_TEXT: &str = include_str!("daq_commands_help.txt");
pub const SOURCE_LOCATION: &str = env!("CARGO_PKG_REPOSITORY");

#[derive(Debug, Clone, PartialEq)]
pub enum DialogOutcome<T> {
    Accepted(T),
    Cancelled,
}

impl<T> DialogOutcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdDialog {
    pub thresholds: ThresholdSettings,
}

impl ThresholdDialog {
    pub fn new(current: ThresholdSettings) -> Self {
        Self {
            thresholds: current,
        }
    }

    pub fn accept(mut self) -> DialogOutcome<ThresholdSettings> {
        for threshold in self.thresholds.thresholds.iter_mut() {
            *threshold = (*threshold).min(MAX_THRESHOLD);
        }
        DialogOutcome::Accepted(self.thresholds)
    }

    pub fn cancel(self) -> DialogOutcome<ThresholdSettings> {
        DialogOutcome::Cancelled
    }
}

/// Channels, coincidence levels, and veto
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDialog {
    pub config: ChannelConfig,
}

impl ConfigDialog {
    pub fn new(current: ChannelConfig) -> Self {
        Self { config: current }
    }

    pub fn accept(self) -> DialogOutcome<ChannelConfig> {
        DialogOutcome::Accepted(self.config)
    }

    pub fn cancel(self) -> DialogOutcome<ChannelConfig> {
        DialogOutcome::Cancelled
    }
}

/// Gate width, time window, and DAQ status writing.
///
/// The time window is not checked here; out-of-range values are replaced with the default
/// when the settings are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedDialog {
    pub settings: AdvancedSettings,
}

impl AdvancedDialog {
    pub fn new(current: AdvancedSettings) -> Self {
        Self { settings: current }
    }

    pub fn accept(mut self) -> DialogOutcome<AdvancedSettings> {
        self.settings.gate_width = self.settings.gate_width.min(MAX_GATE_WIDTH);
        DialogOutcome::Accepted(self.settings)
    }

    pub fn cancel(self) -> DialogOutcome<AdvancedSettings> {
        DialogOutcome::Cancelled
    }
}

/// Text of the About box
pub fn about_text() -> String {
    format!(
        "version: {}\nsource located at: {}",
        env!("CARGO_PKG_VERSION"),
        SOURCE_LOCATION
    )
}

/// A dialog the front-end has to show
#[derive(Debug, Clone, PartialEq)]
pub enum Dialog {
    Thresholds(ThresholdDialog),
    Config(ConfigDialog),
    Advanced(AdvancedDialog),
    Help,
    About,
    ConfirmClose,
}

impl Dialog {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Thresholds(_) => "Thresholds",
            Self::Config(_) => "Channel Configuration",
            Self::Advanced(_) => "Advanced Configurations",
            Self::Help => "DAQ Commands",
            Self::About => "About muonic",
            Self::ConfirmClose => "Attention!",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_dialog_clamps() {
        let mut dialog = ThresholdDialog::new(ThresholdSettings {
            thresholds: [300; 4],
        });
        dialog.thresholds.thresholds[1] = 5000;
        assert_eq!(
            dialog.clone().accept(),
            DialogOutcome::Accepted(ThresholdSettings {
                thresholds: [300, 1000, 300, 300]
            })
        );
        assert!(!dialog.cancel().is_accepted());
    }

    #[test]
    fn test_advanced_dialog_keeps_time_window() {
        let mut dialog = AdvancedDialog::new(AdvancedSettings {
            gate_width: 100,
            time_window: 5.0,
            write_daq_status: false,
        });
        dialog.settings.gate_width = 10_000_000;
        dialog.settings.time_window = 0.0;
        match dialog.accept() {
            DialogOutcome::Accepted(settings) => {
                assert_eq!(settings.gate_width, 655_350);
                assert_eq!(settings.time_window, 0.0);
            }
            DialogOutcome::Cancelled => panic!(),
        }
    }

    #[test]
    fn test_about_text() {
        let text = about_text();
        assert!(text.starts_with("version: "));
        assert!(text.contains(SOURCE_LOCATION));
        assert!(HELP_TEXT.contains("TL"));
    }
}
