use time::OffsetDateTime;

use super::settings::N_CHANNELS;

/// Number of rate slots: the four channels, the trigger, and the maximum rate
pub const N_RATES: usize = 6;
/// Number of scaler counts: the four channels and the trigger
pub const N_COUNTS: usize = 5;

/// Information attached to every measurement by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EventMeta {
    pub captured_at: OffsetDateTime,
    pub sequence: u64,
}

impl EventMeta {
    pub fn now(sequence: u64) -> Self {
        Self {
            captured_at: OffsetDateTime::now_utc(),
            sequence,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    /// One line of raw card output
    RawLog(String),
    /// Pulse widths (ns) found in one readout, per channel
    PulseWidths([Vec<f64>; N_CHANNELS]),
    Rate {
        /// Rates (1/s) of ch0-3, the trigger, and the maximum rate seen
        rates: [f64; N_RATES],
        counts: [u64; N_COUNTS],
        /// Time window covered by these rates (s)
        time_window: f64,
        /// Time since the start of the measurement (s)
        query_time: f64,
    },
    /// Muon decay time (µs)
    Decay(f64),
    /// Flight time between the upper and lower panels (ns)
    FlightTime(f64),
}

/// A measurement produced by the acquisition engine. Consumed once by the controller
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementEvent {
    pub measurement: Measurement,
    pub meta: EventMeta,
}

impl MeasurementEvent {
    pub fn new(measurement: Measurement, sequence: u64) -> Self {
        Self {
            measurement,
            meta: EventMeta::now(sequence),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.measurement {
            Measurement::RawLog(_) => "raw",
            Measurement::PulseWidths(_) => "pulse",
            Measurement::Rate { .. } => "rate",
            Measurement::Decay(_) => "decay",
            Measurement::FlightTime(_) => "velocity",
        }
    }
}
