//! A stand-in for the acquisition engine which fakes a DAQ card.
//!
//! It keeps a model of the card registers, answers `TL`, `DC`, and `DG` the way the card
//! does, and emits made-up measurements. None of the numbers mean anything physically.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::AcquisitionEngine;
use crate::commands::{decode_channel_config, decode_gate_width, encode_gate_width, DaqCommand};
use crate::config::SimulationConfig;
use crate::error::EngineError;
use crate::event::{Measurement, MeasurementEvent, N_COUNTS, N_RATES};
use crate::settings::{
    keys, ChannelConfig, SettingValue, Settings, SettingsAccess, DEFAULT_GATE_WIDTH,
    DEFAULT_THRESHOLD, DEFAULT_TIME_WINDOW, N_CHANNELS,
};

const TICK: Duration = Duration::from_millis(20);
/// Mean muon lifetime (µs)
const MUON_LIFETIME_US: f64 = 2.197;
/// Flight time over the panel separation at roughly c (ns)
const MEAN_FLIGHT_TIME_NS: f64 = 5.0;

/// Card registers C0-C3 and the channel thresholds
#[derive(Debug, Clone)]
struct CardState {
    thresholds: [u32; N_CHANNELS],
    registers: [u8; 4],
}

impl Default for CardState {
    fn default() -> Self {
        let (high, low) = encode_gate_width(DEFAULT_GATE_WIDTH);
        Self {
            thresholds: [DEFAULT_THRESHOLD; N_CHANNELS],
            registers: [0x0f, 0x00, low, high],
        }
    }
}

impl CardState {
    fn channel_config(&self) -> ChannelConfig {
        decode_channel_config(self.registers[0])
    }

    fn gate_width(&self) -> u32 {
        decode_gate_width(self.registers[3], self.registers[2])
    }
}

#[derive(Debug)]
struct PendingCommand {
    command: DaqCommand,
    ack: Option<Sender<()>>,
}

/// Counters of the current rate window
#[derive(Debug, Clone)]
struct RateWindow {
    started: Instant,
    counts: [u64; N_COUNTS],
    max_rate: f64,
}

impl RateWindow {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            counts: [0; N_COUNTS],
            max_rate: 0.0,
        }
    }
}

#[derive(Debug)]
pub struct SimulatedEngine {
    config: SimulationConfig,
    settings: RwLock<Settings>,
    card: Mutex<CardState>,
    queue: Mutex<VecDeque<PendingCommand>>,
    stop_requested: AtomicBool,
}

impl SimulatedEngine {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            settings: RwLock::new(Settings::default()),
            card: Mutex::new(CardState::default()),
            queue: Mutex::new(VecDeque::new()),
            stop_requested: AtomicBool::new(false),
        }
    }

    fn enqueue(&self, command: DaqCommand, ack: Option<Sender<()>>) {
        match self.queue.lock() {
            Ok(mut queue) => queue.push_back(PendingCommand { command, ack }),
            Err(_) => spdlog::error!("Command queue poisoned, dropping {}", command),
        }
    }

    fn next_command(&self) -> Option<PendingCommand> {
        self.queue.lock().ok().and_then(|mut q| q.pop_front())
    }

    fn card(&self) -> CardState {
        self.card.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn with_card<F: FnOnce(&mut CardState)>(&self, f: F) {
        match self.card.lock() {
            Ok(mut card) => f(&mut card),
            Err(_) => spdlog::error!("Card state poisoned"),
        }
    }

    /// Apply one command to the card model. Returns the lines the card prints
    fn execute(&self, command: &DaqCommand) -> Result<Vec<String>, EngineError> {
        let args = command.arguments();
        let mut lines = vec![command.to_string()];
        match (command.mnemonic(), args.as_slice()) {
            ("TL", []) => {
                let card = self.card();
                lines.push(format!(
                    "TL L0={} L1={} L2={} L3={}",
                    card.thresholds[0], card.thresholds[1], card.thresholds[2], card.thresholds[3]
                ));
                for (ch, threshold) in card.thresholds.iter().enumerate() {
                    self.update_setting(&keys::threshold(ch), (*threshold).into());
                }
            }
            ("TL", [channel, value]) => {
                let channel: usize = parse_arg(command, channel)?;
                let value: u32 = parse_arg(command, value)?;
                // channel 4 addresses all channels at once
                self.with_card(|card| match channel {
                    4 => card.thresholds = [value; N_CHANNELS],
                    ch if ch < N_CHANNELS => card.thresholds[ch] = value,
                    _ => (),
                });
            }
            ("DC", []) => {
                let card = self.card();
                lines.push(format!(
                    "DC C0={:02X} C1={:02X} C2={:02X} C3={:02X}",
                    card.registers[0], card.registers[1], card.registers[2], card.registers[3]
                ));
                card.channel_config().store(self);
                self.update_setting(keys::GATE_WIDTH, card.gate_width().into());
            }
            ("WC", [register, value]) => {
                let register: usize = parse_arg(command, register)?;
                let value = u8::from_str_radix(value, 16)
                    .map_err(|_| EngineError::BadCommand(command.to_string()))?;
                if register > 3 {
                    return Err(EngineError::BadCommand(command.to_string()));
                }
                self.with_card(|card| card.registers[register] = value);
            }
            ("DG", []) => {
                lines.extend(
                    [
                        "Date+Time: 01/01/70 00:00:00.000",
                        "Status:    V (not valid)",
                        "PosFix#:   0",
                        "Latitude:  0:00.000 N",
                        "Longitude: 0:00.000 E",
                        "Altitude:  0.000m",
                        "Sats used: 0",
                        "PPS delay: +0 msec",
                        "FPGA time: 00000000",
                        "Chk delay: 0 ns",
                    ]
                    .map(String::from),
                );
            }
            _ => (),
        }
        Ok(lines)
    }

    /// Run every queued command, then acknowledge it
    fn process_commands(
        &self,
        sink: &Sender<MeasurementEvent>,
        sequence: &mut u64,
    ) -> Result<(), EngineError> {
        while let Some(pending) = self.next_command() {
            let lines = match self.execute(&pending.command) {
                Ok(lines) => lines,
                Err(e) => {
                    spdlog::warn!("Simulated card rejected command: {e}");
                    vec![format!("Invalid command: {}", pending.command)]
                }
            };
            for line in lines {
                emit(sink, sequence, Measurement::RawLog(line))?;
            }
            if let Some(ack) = pending.ack {
                // the asking side may have given up already
                let _ = ack.send(());
            }
        }
        Ok(())
    }

    /// Count hits for one tick, and possibly emit a pulse and what comes with it
    fn simulate_tick(
        &self,
        rng: &mut StdRng,
        window: &mut RateWindow,
        sink: &Sender<MeasurementEvent>,
        sequence: &mut u64,
    ) -> Result<(), EngineError> {
        let dt = TICK.as_secs_f64();
        let config = ChannelConfig::load(self);
        let mut hits = 0;
        for ch in 0..N_CHANNELS {
            if config.channels[ch] {
                let n = poisson(rng, self.config.mean_rate_hz * dt);
                window.counts[ch] += n;
                hits += n;
            }
        }
        let level = config.coincidences.iter().rposition(|c| *c).unwrap_or(0);
        window.counts[4] += (hits as f64 * 0.4_f64.powi(level as i32)).round() as u64;

        if rng.gen::<f64>() < self.config.pulse_rate_hz * dt {
            let widths: [Vec<f64>; N_CHANNELS] = std::array::from_fn(|ch| {
                if config.channels[ch] && rng.gen::<f64>() < 0.7 {
                    vec![rng.gen_range(8.0..60.0)]
                } else {
                    Vec::new()
                }
            });
            let pattern = widths
                .iter()
                .enumerate()
                .fold(0u8, |acc, (ch, w)| acc | ((!w.is_empty() as u8) << ch));
            emit(
                sink,
                sequence,
                Measurement::RawLog(format!(
                    "{:08X} {:02X} 00 00 00 00 00 00 00 {:08X}",
                    rng.gen::<u32>(),
                    0x80 | pattern,
                    rng.gen::<u32>()
                )),
            )?;
            emit(sink, sequence, Measurement::PulseWidths(widths))?;

            if rng.gen::<f64>() < self.config.decay_fraction {
                let decay = -MUON_LIFETIME_US * (1.0 - rng.gen::<f64>()).ln();
                emit(sink, sequence, Measurement::Decay(decay))?;
            }
            if rng.gen::<f64>() < self.config.velocity_fraction {
                // sum of uniforms as a cheap bell curve around the mean
                let jitter: f64 = (0..4).map(|_| rng.gen_range(-1.0..1.0)).sum();
                emit(
                    sink,
                    sequence,
                    Measurement::FlightTime(MEAN_FLIGHT_TIME_NS + jitter),
                )?;
            }
        }
        Ok(())
    }

    /// Emit the rates of the finished window and start a new one
    fn close_window(
        &self,
        window: &mut RateWindow,
        run_start: Instant,
        sink: &Sender<MeasurementEvent>,
        sequence: &mut u64,
    ) -> Result<(), EngineError> {
        let elapsed = window.started.elapsed().as_secs_f64().max(f64::EPSILON);
        let mut rates = [0.0; N_RATES];
        for (rate, count) in rates.iter_mut().zip(window.counts.iter()) {
            *rate = *count as f64 / elapsed;
        }
        let max_rate = window.max_rate.max(rates[4]);
        rates[5] = max_rate;
        emit(
            sink,
            sequence,
            Measurement::RawLog(format!(
                "DS S0={:08X} S1={:08X} S2={:08X} S3={:08X} S4={:08X}",
                window.counts[0], window.counts[1], window.counts[2], window.counts[3], window.counts[4]
            )),
        )?;
        emit(
            sink,
            sequence,
            Measurement::Rate {
                rates,
                counts: window.counts,
                time_window: elapsed,
                query_time: run_start.elapsed().as_secs_f64(),
            },
        )?;
        *window = RateWindow::new();
        window.max_rate = max_rate;
        Ok(())
    }
}

impl SettingsAccess for SimulatedEngine {
    fn get_setting(&self, key: &str, default: SettingValue) -> SettingValue {
        self.settings.get_setting(key, default)
    }

    fn update_setting(&self, key: &str, value: SettingValue) {
        self.settings.update_setting(key, value)
    }
}

impl AcquisitionEngine for SimulatedEngine {
    fn put(&self, command: DaqCommand) {
        self.enqueue(command, None);
    }

    fn query(&self, command: DaqCommand) -> Receiver<()> {
        let (tx, rx) = mpsc::channel();
        self.enqueue(command, Some(tx));
        rx
    }

    fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn run(&self, sink: Sender<MeasurementEvent>) -> Result<(), EngineError> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut sequence = 0;
        let run_start = Instant::now();
        let mut window = RateWindow::new();
        spdlog::info!("Simulated acquisition engine started");

        while !self.stop_requested.load(Ordering::SeqCst) {
            self.process_commands(&sink, &mut sequence)?;
            self.simulate_tick(&mut rng, &mut window, &sink, &mut sequence)?;

            let time_window = self.get_f64(keys::TIME_WINDOW, DEFAULT_TIME_WINDOW);
            if window.started.elapsed().as_secs_f64() >= time_window {
                self.close_window(&mut window, run_start, &sink, &mut sequence)?;
            }
            std::thread::sleep(TICK);
        }

        // answer whatever is still waiting so nobody blocks on a dead engine
        self.process_commands(&sink, &mut sequence).ok();
        spdlog::info!("Simulated acquisition engine stopped");
        Ok(())
    }
}

fn emit(
    sink: &Sender<MeasurementEvent>,
    sequence: &mut u64,
    measurement: Measurement,
) -> Result<(), EngineError> {
    *sequence += 1;
    sink.send(MeasurementEvent::new(measurement, *sequence))?;
    Ok(())
}

fn parse_arg<T: std::str::FromStr>(command: &DaqCommand, arg: &str) -> Result<T, EngineError> {
    arg.parse()
        .map_err(|_| EngineError::BadCommand(command.to_string()))
}

/// Knuth's method; fine for the small means of one tick
fn poisson(rng: &mut StdRng, mean: f64) -> u64 {
    let limit = (-mean).exp();
    let mut product = rng.gen::<f64>();
    let mut n = 0;
    while product > limit {
        n += 1;
        product *= rng.gen::<f64>();
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SimulatedEngine {
        SimulatedEngine::new(SimulationConfig {
            seed: Some(1),
            ..SimulationConfig::default()
        })
    }

    fn drain(rx: &Receiver<MeasurementEvent>) -> Vec<String> {
        rx.try_iter()
            .filter_map(|e| match e.measurement {
                Measurement::RawLog(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_threshold_query_updates_settings() {
        let engine = engine();
        let (tx, rx) = mpsc::channel();
        let mut sequence = 0;
        engine.put(DaqCommand::threshold(2, 120));
        let ack = engine.query(DaqCommand::threshold_query());
        engine.process_commands(&tx, &mut sequence).unwrap();

        assert!(ack.try_recv().is_ok());
        assert_eq!(engine.get_u32("threshold_ch2", 0), 120);
        assert_eq!(engine.get_u32("threshold_ch0", 0), 300);
        let lines = drain(&rx);
        assert_eq!(lines, ["TL 2 120", "TL", "TL L0=300 L1=300 L2=120 L3=300"]);
    }

    #[test]
    fn test_channel_query_decodes_registers() {
        let engine = engine();
        let (tx, rx) = mpsc::channel();
        let mut sequence = 0;
        engine.put(DaqCommand::raw("WC 00 95").unwrap());
        for command in DaqCommand::gate_width(5000) {
            engine.put(command);
        }
        let ack = engine.query(DaqCommand::channel_query());
        engine.process_commands(&tx, &mut sequence).unwrap();

        assert!(ack.try_recv().is_ok());
        let config = ChannelConfig::load(&engine);
        assert_eq!(config.channels, [true, false, true, false]);
        assert_eq!(config.coincidences, [false, true, false, false]);
        assert!(config.veto);
        assert_eq!(config.veto_channels, [false, true, false]);
        assert_eq!(engine.get_u32(keys::GATE_WIDTH, 0), 5000);
        assert!(drain(&rx).contains(&String::from("DC C0=95 C1=00 C2=F4 C3=01")));
    }

    #[test]
    fn test_bad_command_is_reported() {
        let engine = engine();
        let (tx, rx) = mpsc::channel();
        let mut sequence = 0;
        engine.put(DaqCommand::raw("WC 09 zz").unwrap());
        engine.process_commands(&tx, &mut sequence).unwrap();
        assert_eq!(drain(&rx), ["Invalid command: WC 09 ZZ"]);
    }

    #[test]
    fn test_run_stops() {
        let engine = std::sync::Arc::new(engine());
        let (tx, rx) = mpsc::channel();
        let worker = {
            let engine = engine.clone();
            std::thread::spawn(move || engine.run(tx))
        };
        let ack = engine.query(DaqCommand::gps_query());
        assert!(ack.recv_timeout(Duration::from_secs(5)).is_ok());
        engine.stop();
        assert!(worker.join().unwrap().is_ok());
        assert!(drain(&rx).iter().any(|l| l.starts_with("Latitude:")));
    }

    #[test]
    fn test_poisson_mean() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = 20_000;
        let total: u64 = (0..n).map(|_| poisson(&mut rng, 0.5)).sum();
        let mean = total as f64 / n as f64;
        assert!((mean - 0.5).abs() < 0.05);
    }
}
