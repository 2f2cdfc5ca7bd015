use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::OffsetDateTime;

use super::Widget;
use crate::error::WidgetError;
use crate::event::{N_COUNTS, N_RATES};

/// Rate slots shown as text fields and in the rolling plot: ch0-3 and the trigger
pub const N_RATE_FIELDS: usize = 5;
pub const RATE_LABELS: [&str; N_RATE_FIELDS] = ["ch0", "ch1", "ch2", "ch3", "trigger"];
const MONITOR_CAPACITY: usize = 500;

/// One point of the rolling rate plot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    /// End of the time window, relative to the first sample (s)
    pub time: f64,
    pub rates: [f64; N_RATE_FIELDS],
}

/// Rolling plot of the last rate measurements
#[derive(Debug, Clone, Default)]
pub struct ScalarsMonitor {
    samples: VecDeque<RateSample>,
    elapsed: f64,
}

impl ScalarsMonitor {
    pub fn update_plot(&mut self, rates: [f64; N_RATE_FIELDS], time_window: f64) {
        self.elapsed += time_window;
        self.samples.push_back(RateSample {
            time: self.elapsed,
            rates,
        });
        while self.samples.len() > MONITOR_CAPACITY {
            self.samples.pop_front();
        }
    }

    pub fn samples(&self) -> impl Iterator<Item = &RateSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total time covered by all pushed samples, including those which rolled out
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Mean of one rate slot over the samples currently held
    pub fn mean_rate(&self, slot: usize) -> Option<f64> {
        if self.samples.is_empty() || slot >= N_RATE_FIELDS {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|s| s.rates[slot]).sum();
        Some(sum / self.samples.len() as f64)
    }
}

/// Writes one line per rate measurement. The file carries a `.partial` suffix until the
/// recorder is closed
#[derive(Debug)]
pub struct RateRecorder {
    writer: BufWriter<File>,
    partial_path: PathBuf,
    final_path: PathBuf,
}

impl RateRecorder {
    pub fn create(directory: &Path, started: OffsetDateTime) -> Result<Self, WidgetError> {
        std::fs::create_dir_all(directory)?;
        let stamp = started.format(format_description!(
            "[year]-[month]-[day]_[hour]-[minute]-[second]"
        ))?;
        let final_path = directory.join(format!("{stamp}_R.txt"));
        let partial_path = directory.join(format!("{stamp}_R.txt.partial"));
        let mut writer = BufWriter::new(File::create(&partial_path)?);
        writeln!(
            writer,
            "# query_time r0 r1 r2 r3 r_trigger r_max c0 c1 c2 c3 c_trigger time_window"
        )?;
        spdlog::info!("Writing rates to {}", partial_path.display());
        Ok(Self {
            writer,
            partial_path,
            final_path,
        })
    }

    pub fn record(
        &mut self,
        rates: &[f64; N_RATES],
        counts: &[u64; N_COUNTS],
        time_window: f64,
        query_time: f64,
    ) -> Result<(), WidgetError> {
        write!(self.writer, "{query_time:.2}")?;
        for rate in rates {
            write!(self.writer, " {rate:.3}")?;
        }
        for count in counts {
            write!(self.writer, " {count}")?;
        }
        writeln!(self.writer, " {time_window:.2}")?;
        Ok(())
    }

    /// Flush and move the file to its final name
    pub fn close(mut self) -> Result<PathBuf, WidgetError> {
        self.writer.flush()?;
        drop(self.writer);
        std::fs::rename(&self.partial_path, &self.final_path)?;
        spdlog::info!("Rate file closed as {}", self.final_path.display());
        Ok(self.final_path)
    }
}

/// An info field shown next to the rate table
#[derive(Debug, Clone, PartialEq)]
pub struct InfoField {
    pub key: &'static str,
    pub label: &'static str,
    pub value: String,
}

/// Muon rates: rate/count table, info fields, and a rolling rate plot
#[derive(Debug)]
pub struct RateWidget {
    active: bool,
    pub info_fields: Vec<InfoField>,
    pub rate_fields: [String; N_RATE_FIELDS],
    pub scalar_fields: [String; N_RATE_FIELDS],
    pub scalars_monitor: ScalarsMonitor,
    recorder: Option<RateRecorder>,
}

impl RateWidget {
    pub fn new(started: OffsetDateTime, recorder: Option<RateRecorder>) -> Self {
        let start_date = started
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second] UTC"
            ))
            .unwrap_or_default();
        let field = |key, label, value: &str| InfoField {
            key,
            label,
            value: value.to_string(),
        };
        Self {
            active: true,
            info_fields: vec![
                field("start_date", "Start date", &start_date),
                field("daq_time", "Time window", "--"),
                field("max_rate", "Max rate", "--"),
                field("mean_rate", "Mean trigger rate", "--"),
                field("duration", "Measurement time", "--"),
            ],
            rate_fields: Default::default(),
            scalar_fields: Default::default(),
            scalars_monitor: ScalarsMonitor::default(),
            recorder,
        }
    }

    /// Set an info field. Returns false if there is no field with that key
    pub fn update_info_field(&mut self, key: &str, value: String) -> bool {
        match self.info_fields.iter_mut().find(|f| f.key == key) {
            Some(field) => {
                field.value = value;
                true
            }
            None => false,
        }
    }

    pub fn info_field(&self, key: &str) -> Option<&str> {
        self.info_fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Append a measurement to the rate file, if one is open.
    /// A failing recorder is closed so it does not fail on every event.
    pub fn record(
        &mut self,
        rates: &[f64; N_RATES],
        counts: &[u64; N_COUNTS],
        time_window: f64,
        query_time: f64,
    ) {
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.record(rates, counts, time_window, query_time) {
                spdlog::error!("Could not write rates, recording stopped: {e}");
                self.recorder = None;
            }
        }
    }
}

impl Widget for RateWidget {
    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn refresh(&mut self) {
        if let Some(mean) = self.scalars_monitor.mean_rate(4) {
            self.update_info_field("mean_rate", format!("{mean:.3} 1/s"));
        }
        let elapsed = self.scalars_monitor.elapsed();
        self.update_info_field("duration", format!("{elapsed:.0} s"));
    }

    fn finish(&mut self) -> Result<(), WidgetError> {
        if let Some(recorder) = self.recorder.take() {
            recorder.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_rolls() {
        let mut monitor = ScalarsMonitor::default();
        for _ in 0..(MONITOR_CAPACITY + 10) {
            monitor.update_plot([1.0, 2.0, 3.0, 4.0, 5.0], 2.0);
        }
        assert_eq!(monitor.len(), MONITOR_CAPACITY);
        assert_eq!(monitor.elapsed(), 2.0 * (MONITOR_CAPACITY + 10) as f64);
        assert_eq!(monitor.mean_rate(4), Some(5.0));
        assert_eq!(monitor.mean_rate(5), None);
    }

    #[test]
    fn test_unknown_info_field() {
        let mut rate = RateWidget::new(OffsetDateTime::UNIX_EPOCH, None);
        assert!(!rate.update_info_field("nope", String::from("1")));
        assert_eq!(rate.info_field("start_date"), Some("1970-01-01 00:00:00 UTC"));
    }

    #[test]
    fn test_recorder_renamed_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = RateRecorder::create(dir.path(), OffsetDateTime::UNIX_EPOCH).unwrap();
        let mut rate = RateWidget::new(OffsetDateTime::UNIX_EPOCH, Some(recorder));
        rate.record(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[1, 2, 3, 4, 5], 5.0, 5.0);
        let partial = dir.path().join("1970-01-01_00-00-00_R.txt.partial");
        assert!(partial.exists());

        rate.finish().unwrap();
        assert!(!rate.is_recording());
        assert!(!partial.exists());
        let contents =
            std::fs::read_to_string(dir.path().join("1970-01-01_00-00-00_R.txt")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "5.00 1.000 2.000 3.000 4.000 5.000 6.000 1 2 3 4 5 5.00");
    }
}
