use time::OffsetDateTime;

use super::Widget;
use crate::settings::{
    AdvancedSettings, ChannelConfig, SettingsAccess, ThresholdSettings, N_CHANNELS,
};

/// Read-only view of the current card configuration
#[derive(Debug, Clone)]
pub struct StatusWidget {
    active: bool,
    pub thresholds: ThresholdSettings,
    pub channels: ChannelConfig,
    pub advanced: AdvancedSettings,
    pub last_update: Option<OffsetDateTime>,
}

impl StatusWidget {
    pub fn new<S: SettingsAccess + ?Sized>(settings: &S) -> Self {
        Self {
            active: true,
            thresholds: ThresholdSettings::load(settings),
            channels: ChannelConfig::load(settings),
            advanced: AdvancedSettings::load(settings),
            last_update: Some(OffsetDateTime::now_utc()),
        }
    }

    pub fn update_settings<S: SettingsAccess + ?Sized>(&mut self, settings: &S) {
        self.thresholds = ThresholdSettings::load(settings);
        self.channels = ChannelConfig::load(settings);
        self.advanced = AdvancedSettings::load(settings);
        self.last_update = Some(OffsetDateTime::now_utc());
    }

    /// One line per channel: enabled flag and threshold
    pub fn channel_lines(&self) -> Vec<String> {
        (0..N_CHANNELS)
            .map(|ch| {
                format!(
                    "Channel {ch}: {} threshold {} mV",
                    if self.channels.channels[ch] { "on " } else { "off" },
                    self.thresholds.thresholds[ch]
                )
            })
            .collect()
    }

    /// Name of the selected coincidence level(s)
    pub fn coincidence_text(&self) -> String {
        let names: Vec<&str> = ChannelConfig::COINCIDENCE_NAMES
            .iter()
            .zip(self.channels.coincidences.iter())
            .filter_map(|(name, active)| active.then_some(*name))
            .collect();
        if names.is_empty() {
            String::from("singles (default)")
        } else {
            names.join(", ")
        }
    }

    pub fn veto_text(&self) -> String {
        if !self.channels.veto {
            return String::from("off");
        }
        match self.channels.veto_channels.iter().position(|v| *v) {
            Some(ch) => format!("channel {ch}"),
            None => String::from("on, no source selected"),
        }
    }
}

impl Widget for StatusWidget {
    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use std::sync::RwLock;

    #[test]
    fn test_status_text() {
        let settings = RwLock::new(Settings::default());
        let mut status = StatusWidget::new(&settings);
        assert_eq!(status.coincidence_text(), "singles");
        assert_eq!(status.veto_text(), "off");
        assert_eq!(status.channel_lines()[2], "Channel 2: on  threshold 300 mV");

        ChannelConfig {
            channels: [true, true, false, true],
            coincidences: [false, false, true, false],
            veto: true,
            veto_channels: [false, false, true],
        }
        .store(&settings);
        status.update_settings(&settings);
        assert_eq!(status.coincidence_text(), "threefold");
        assert_eq!(status.veto_text(), "channel 2");
        assert_eq!(status.channel_lines()[2], "Channel 2: off threshold 300 mV");
    }
}
