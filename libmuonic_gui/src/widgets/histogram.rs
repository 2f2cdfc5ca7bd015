use super::Widget;

/// Fixed-binning histogram with running statistics
#[derive(Debug, Clone)]
pub struct Histogram {
    pub title: String,
    pub x_label: String,
    min: f64,
    max: f64,
    bins: Vec<u64>,
    underflow: u64,
    overflow: u64,
    entries: u64,
    sum: f64,
    sum_sq: f64,
}

impl Histogram {
    pub fn new(title: &str, x_label: &str, n_bins: usize, min: f64, max: f64) -> Self {
        Self {
            title: title.to_string(),
            x_label: x_label.to_string(),
            min,
            max,
            bins: vec![0; n_bins.max(1)],
            underflow: 0,
            overflow: 0,
            entries: 0,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    /// Fill all values. Non-finite values are dropped
    pub fn update_plot(&mut self, values: &[f64]) {
        for value in values.iter().copied().filter(|v| v.is_finite()) {
            self.fill(value);
        }
    }

    fn fill(&mut self, value: f64) {
        self.entries += 1;
        self.sum += value;
        self.sum_sq += value * value;
        if value < self.min {
            self.underflow += 1;
        } else if value >= self.max {
            self.overflow += 1;
        } else {
            let idx = ((value - self.min) / self.bin_width()) as usize;
            let idx = idx.min(self.bins.len() - 1);
            self.bins[idx] += 1;
        }
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.bins.len() as f64
    }

    /// (bin center, count) for every bin
    pub fn bars(&self) -> Vec<(f64, u64)> {
        let width = self.bin_width();
        self.bins
            .iter()
            .enumerate()
            .map(|(idx, count)| (self.min + (idx as f64 + 0.5) * width, *count))
            .collect()
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn outside_range(&self) -> (u64, u64) {
        (self.underflow, self.overflow)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.entries == 0 {
            return None;
        }
        Some(self.sum / self.entries as f64)
    }

    pub fn std_dev(&self) -> Option<f64> {
        if self.entries < 2 {
            return None;
        }
        let n = self.entries as f64;
        let mean = self.sum / n;
        Some(((self.sum_sq / n - mean * mean) * n / (n - 1.0)).max(0.0).sqrt())
    }

    pub fn clear(&mut self) {
        self.bins.iter_mut().for_each(|b| *b = 0);
        self.underflow = 0;
        self.overflow = 0;
        self.entries = 0;
        self.sum = 0.0;
        self.sum_sq = 0.0;
    }
}

/// Text shown below a histogram, recomputed on refresh
fn summary(histogram: &Histogram, unit: &str) -> String {
    match (histogram.mean(), histogram.std_dev()) {
        (Some(mean), Some(std)) => format!(
            "{} entries, mean {:.3} {unit}, std {:.3} {unit}",
            histogram.entries(),
            mean,
            std
        ),
        (Some(mean), None) => format!("{} entries, mean {:.3} {unit}", histogram.entries(), mean),
        _ => String::from("no entries"),
    }
}

/// Histogram of muon decay times. Data is always collected, the summary only follows while active
#[derive(Debug, Clone)]
pub struct DecayWidget {
    active: bool,
    pub plot_canvas: Histogram,
    pub summary: String,
}

impl Default for DecayWidget {
    fn default() -> Self {
        Self {
            active: false,
            plot_canvas: Histogram::new("Muon Decay", "Decay time [µs]", 20, 0.0, 10.0),
            summary: String::from("no entries"),
        }
    }
}

impl DecayWidget {
    pub fn push_decay(&mut self, decay_time: f64) {
        self.plot_canvas.update_plot(&[decay_time]);
    }
}

impl Widget for DecayWidget {
    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn refresh(&mut self) {
        self.summary = summary(&self.plot_canvas, "µs");
    }
}

/// Histogram of flight times between the panels. Starts inactive
#[derive(Debug, Clone)]
pub struct VelocityWidget {
    active: bool,
    pub plot_canvas: Histogram,
    pub summary: String,
}

impl Default for VelocityWidget {
    fn default() -> Self {
        Self {
            active: false,
            plot_canvas: Histogram::new("Muon Velocity", "Flight time [ns]", 30, 0.0, 30.0),
            summary: String::from("no entries"),
        }
    }
}

impl VelocityWidget {
    pub fn push_flight_time(&mut self, flight_time: f64) {
        self.plot_canvas.update_plot(&[flight_time]);
    }
}

impl Widget for VelocityWidget {
    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn refresh(&mut self) {
        self.summary = summary(&self.plot_canvas, "ns");
    }
}
