use super::histogram::Histogram;
use super::Widget;
use crate::settings::N_CHANNELS;

/// Pulse width distributions, one histogram per channel
#[derive(Debug, Clone)]
pub struct PulseWidget {
    active: bool,
    pub pulse_width_canvases: [Histogram; N_CHANNELS],
    /// Mean pulse width per channel, updated on refresh
    pub mean_widths: [Option<f64>; N_CHANNELS],
}

impl Default for PulseWidget {
    fn default() -> Self {
        Self {
            active: true,
            pulse_width_canvases: std::array::from_fn(|ch| {
                Histogram::new(
                    &format!("Pulse widths channel {ch}"),
                    "Pulse width [ns]",
                    25,
                    0.0,
                    100.0,
                )
            }),
            mean_widths: [None; N_CHANNELS],
        }
    }
}

impl PulseWidget {
    /// Fill the widths of one channel. Channels out of range are ignored
    pub fn update_channel(&mut self, channel: usize, widths: &[f64]) {
        if let Some(canvas) = self.pulse_width_canvases.get_mut(channel) {
            canvas.update_plot(widths);
        }
    }

    pub fn total_pulses(&self) -> u64 {
        self.pulse_width_canvases.iter().map(|c| c.entries()).sum()
    }
}

impl Widget for PulseWidget {
    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn refresh(&mut self) {
        for (mean, canvas) in self
            .mean_widths
            .iter_mut()
            .zip(self.pulse_width_canvases.iter())
        {
            *mean = canvas.mean();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_are_separate() {
        let mut pulse = PulseWidget::default();
        pulse.update_channel(0, &[10.0, 12.0]);
        pulse.update_channel(3, &[40.0]);
        pulse.update_channel(7, &[40.0]);
        pulse.refresh();
        assert_eq!(pulse.pulse_width_canvases[0].entries(), 2);
        assert_eq!(pulse.pulse_width_canvases[1].entries(), 0);
        assert_eq!(pulse.mean_widths[0], Some(11.0));
        assert_eq!(pulse.mean_widths[3], Some(40.0));
        assert_eq!(pulse.total_pulses(), 3);
    }

    #[test]
    fn test_inactive_pulse_keeps_data() {
        let mut pulse = PulseWidget::default();
        pulse.set_active(false);
        pulse.update_channel(1, &[20.0]);
        assert_eq!(pulse.total_pulses(), 1);
        assert_eq!(pulse.mean_widths[1], None);
    }
}
