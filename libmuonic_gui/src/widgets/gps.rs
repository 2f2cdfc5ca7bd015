use std::collections::VecDeque;
use time::OffsetDateTime;

use super::Widget;

/// Line prefixes of the card's answer to `DG`
const GPS_PREFIXES: [&str; 10] = [
    "Date+Time:",
    "Status:",
    "PosFix#:",
    "Latitude:",
    "Longitude:",
    "Altitude:",
    "Sats used:",
    "PPS delay:",
    "FPGA time:",
    "Chk delay:",
];
const MAX_REPORT_LINES: usize = 40;

pub fn is_gps_line(line: &str) -> bool {
    let line = line.trim_start();
    GPS_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
}

/// Latest GPS report of the card
#[derive(Debug, Clone)]
pub struct GpsWidget {
    active: bool,
    report: VecDeque<String>,
    pub last_query: Option<OffsetDateTime>,
}

impl Default for GpsWidget {
    fn default() -> Self {
        Self {
            active: true,
            report: VecDeque::new(),
            last_query: None,
        }
    }
}

impl GpsWidget {
    pub fn push_line(&mut self, line: &str) {
        self.report.push_back(line.trim().to_string());
        while self.report.len() > MAX_REPORT_LINES {
            self.report.pop_front();
        }
    }

    pub fn report(&self) -> impl Iterator<Item = &String> {
        self.report.iter()
    }

    /// Forget the old report when a new one is requested
    pub fn mark_query(&mut self) {
        self.report.clear();
        self.last_query = Some(OffsetDateTime::now_utc());
    }
}

impl Widget for GpsWidget {
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

    #[test]
    fn test_gps_lines() {
        assert!(is_gps_line("Latitude:   50:45.123 N"));
        assert!(is_gps_line("  Sats used: 7"));
        assert!(!is_gps_line("80EE0049 80 01 00 01 38 01 3C 00 01F0B5C9"));
        let mut gps = GpsWidget::default();
        for i in 0..50 {
            gps.push_line(&format!("Altitude: {i} m"));
        }
        assert_eq!(gps.report().count(), MAX_REPORT_LINES);
        gps.mark_query();
        assert_eq!(gps.report().count(), 0);
        assert!(gps.last_query.is_some());
    }
}
