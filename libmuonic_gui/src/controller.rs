//! The main window controller.
//!
//! Owns the widgets, the engine handle and its worker thread. It routes measurements to
//! widgets and runs the settings dialog flows. Everything here runs on the UI thread; the
//! only thing crossing threads is the event channel.
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use time::OffsetDateTime;

use super::commands::{threshold_commands, DaqCommand};
use super::config::Config;
use super::dialogs::{AdvancedDialog, ConfigDialog, Dialog, DialogOutcome, ThresholdDialog};
use super::engine::AcquisitionEngine;
use super::error::{ControllerError, EngineError};
use super::event::{Measurement, MeasurementEvent, N_COUNTS, N_RATES};
use super::menu::ActionResponse;
use super::registry::WidgetRegistry;
use super::settings::{
    keys, validate_time_window, AdvancedSettings, ChannelConfig, ThresholdSettings,
    DEFAULT_TIME_WINDOW, N_CHANNELS,
};
use super::timer::IntervalTimer;
use super::widgets::gps::is_gps_line;
use super::widgets::rate::{RateRecorder, N_RATE_FIELDS};
use super::widgets::{
    DaqWidget, DecayWidget, GpsWidget, PulseWidget, RateWidget, StatusWidget, VelocityWidget,
};

/// Names and tab labels of the widgets, in tab order
pub const WIDGET_TABS: [(&str, &str); 7] = [
    ("rate", "Muon Rates"),
    ("pulse", "Pulse Analyzer"),
    ("decay", "Muon Decay"),
    ("velocity", "Muon Velocity"),
    ("status", "Status"),
    ("daq", "DAQ Output"),
    ("gps", "GPS Output"),
];

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct Controller {
    config: Config,
    engine: Arc<dyn AcquisitionEngine>,
    registry: WidgetRegistry,
    event_rx: Receiver<MeasurementEvent>,
    event_tx: Sender<MeasurementEvent>,
    worker: Option<JoinHandle<Result<(), EngineError>>>,
    worker_error: Option<String>,
    daq_log: String,
    log_timer: IntervalTimer,
    update_timer: IntervalTimer,
    start_time: OffsetDateTime,
    close_pending: bool,
    closed: bool,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("running", &self.is_running())
            .field("close_pending", &self.close_pending)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Controller {
    /// Create the controller and its widgets. The engine is not started yet
    pub fn new(
        config: Config,
        engine: Arc<dyn AcquisitionEngine>,
    ) -> Result<Self, ControllerError> {
        let time_window = validate_time_window(config.time_window).unwrap_or_else(|e| {
            spdlog::warn!("{e}. Using a time window of {DEFAULT_TIME_WINDOW} s");
            DEFAULT_TIME_WINDOW
        });
        engine.update_setting(keys::TIME_WINDOW, time_window.into());

        let now = Instant::now();
        let (event_tx, event_rx) = mpsc::channel();
        let mut controller = Self {
            log_timer: IntervalTimer::new(config.daq_log_interval(), now),
            update_timer: IntervalTimer::new(Duration::from_secs_f64(time_window), now),
            config,
            engine,
            registry: WidgetRegistry::new(),
            event_rx,
            event_tx,
            worker: None,
            worker_error: None,
            daq_log: String::new(),
            start_time: OffsetDateTime::now_utc(),
            close_pending: false,
            closed: false,
        };
        controller.setup_widgets()?;
        Ok(controller)
    }

    fn setup_widgets(&mut self) -> Result<(), ControllerError> {
        let recorder = if self.config.record_rates {
            match RateRecorder::create(&self.config.data_path, self.start_time) {
                Ok(recorder) => Some(recorder),
                Err(e) => {
                    spdlog::warn!("Rates will not be recorded: {e}");
                    None
                }
            }
        } else {
            None
        };

        let [rate, pulse, decay, velocity, status, daq, gps] = WIDGET_TABS;
        self.registry.add(
            rate.0,
            rate.1,
            Box::new(RateWidget::new(self.start_time, recorder)),
        )?;
        self.registry
            .add(pulse.0, pulse.1, Box::new(PulseWidget::default()))?;
        self.registry
            .add(decay.0, decay.1, Box::new(DecayWidget::default()))?;
        self.registry
            .add(velocity.0, velocity.1, Box::new(VelocityWidget::default()))?;
        self.registry.add(
            status.0,
            status.1,
            Box::new(StatusWidget::new(self.engine.as_ref())),
        )?;
        self.registry
            .add(daq.0, daq.1, Box::new(DaqWidget::default()))?;
        self.registry
            .add(gps.0, gps.1, Box::new(GpsWidget::default()))?;
        Ok(())
    }

    /// Spawn the worker running the engine's main loop
    pub fn start(&mut self) -> Result<(), ControllerError> {
        if self.worker.is_some() {
            return Err(ControllerError::AlreadyRunning);
        }
        let engine = self.engine.clone();
        let tx = self.event_tx.clone();
        let handle = std::thread::Builder::new()
            .name(String::from("acquisition"))
            .spawn(move || engine.run(tx))
            .map_err(ControllerError::SpawnError)?;
        self.worker = Some(handle);
        spdlog::info!("Acquisition worker started");
        Ok(())
    }

    /// Route every event waiting in the channel. Returns how many there were
    pub fn poll_events(&mut self) -> usize {
        let mut n_events = 0;
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => {
                    self.route_event(event);
                    n_events += 1;
                }
                Err(TryRecvError::Empty) => break,
                // we hold a sender ourselves
                Err(TryRecvError::Disconnected) => break,
            }
        }
        self.check_worker();
        n_events
    }

    /// Hand a measurement to the widget that shows it
    pub fn route_event(&mut self, event: MeasurementEvent) {
        match event.measurement {
            Measurement::RawLog(line) => {
                if is_gps_line(&line) {
                    if let Some(gps) = self.registry.get_as_mut::<GpsWidget>("gps") {
                        gps.push_line(&line);
                    }
                }
                self.daq_log.push_str(&line);
                self.daq_log.push('\n');
            }
            Measurement::PulseWidths(widths) => {
                if let Some(pulse) = self.registry.get_as_mut::<PulseWidget>("pulse") {
                    for (ch, channel_widths) in widths.iter().enumerate() {
                        pulse.update_channel(ch, channel_widths);
                    }
                }
            }
            Measurement::Rate {
                rates,
                counts,
                time_window,
                query_time,
            } => self.update_rates(&rates, &counts, time_window, query_time),
            Measurement::Decay(decay_time) => {
                if let Some(decay) = self.registry.get_as_mut::<DecayWidget>("decay") {
                    decay.push_decay(decay_time);
                }
            }
            Measurement::FlightTime(flight_time) => {
                if let Some(velocity) = self.registry.get_as_mut::<VelocityWidget>("velocity") {
                    velocity.push_flight_time(flight_time);
                }
            }
        }
    }

    fn update_rates(
        &mut self,
        rates: &[f64; N_RATES],
        counts: &[u64; N_COUNTS],
        time_window: f64,
        query_time: f64,
    ) {
        let Some(widget) = self.registry.get_as_mut::<RateWidget>("rate") else {
            return;
        };
        widget.update_info_field("max_rate", format!("{:.3} 1/s", rates[5]));

        let mut plotted = [0.0; N_RATE_FIELDS];
        plotted.copy_from_slice(&rates[..N_RATE_FIELDS]);
        widget.scalars_monitor.update_plot(plotted, time_window);
        widget.update_info_field("daq_time", format!("{:.2} s", time_window));

        for (field, rate) in widget.rate_fields.iter_mut().zip(rates.iter()) {
            *field = format!("{rate:.3}");
        }
        for (field, count) in widget.scalar_fields.iter_mut().zip(counts.iter()) {
            *field = count.to_string();
        }
        widget.record(rates, counts, time_window, query_time);
    }

    /// Run the periodic jobs which are due
    pub fn tick(&mut self, now: Instant) {
        if self.log_timer.fire(now) {
            self.flush_daq_log();
        }
        if self.update_timer.fire(now) {
            self.update_dynamic();
        }
    }

    /// Move the collected raw lines into the DAQ widget
    pub fn flush_daq_log(&mut self) {
        if let Some(daq) = self.registry.get_as_mut::<DaqWidget>("daq") {
            daq.append_plain_text(&self.daq_log);
        }
        self.daq_log.clear();
    }

    /// Refresh every active widget, and the status view
    pub fn update_dynamic(&mut self) {
        for entry in self.registry.iter_mut() {
            if entry.widget.is_active() {
                entry.widget.refresh();
            }
        }
        self.refresh_status();
    }

    fn refresh_status(&mut self) {
        if let Some(status) = self.registry.get_as_mut::<StatusWidget>("status") {
            status.update_settings(self.engine.as_ref());
        }
    }

    /// Time until a periodic job is due
    pub fn next_wakeup(&self, now: Instant) -> Duration {
        self.log_timer
            .remaining(now)
            .min(self.update_timer.remaining(now))
    }

    /// Send a command which changes the card
    fn send(&self, command: DaqCommand) {
        spdlog::info!("The following message was sent to DAQ: {}", command);
        self.engine.put(command);
    }

    /// Send a query and wait until the engine has applied the answer, or the timeout
    fn query_card(&self, command: DaqCommand) {
        spdlog::info!("Loading {} information...", command);
        let ack = self.engine.query(command);
        match ack.recv_timeout(self.config.ack_timeout()) {
            Ok(()) => spdlog::debug!("Query acknowledged"),
            Err(RecvTimeoutError::Timeout) => {
                spdlog::warn!("The card did not answer in time, using the cached settings")
            }
            Err(RecvTimeoutError::Disconnected) => {
                spdlog::warn!("The engine dropped the query, using the cached settings")
            }
        }
    }

    pub fn open_threshold_dialog(&mut self) -> ActionResponse {
        self.query_card(DaqCommand::threshold_query());
        let current = ThresholdSettings::load(self.engine.as_ref());
        ActionResponse::ShowDialog(Dialog::Thresholds(ThresholdDialog::new(current)))
    }

    pub fn apply_thresholds(&mut self, outcome: DialogOutcome<ThresholdSettings>) {
        if let DialogOutcome::Accepted(thresholds) = outcome {
            thresholds.store(self.engine.as_ref());
            for (ch, command) in threshold_commands(&thresholds).into_iter().enumerate() {
                self.engine.put(command);
                spdlog::info!(
                    "Set threshold of channel {} to {}",
                    ch,
                    thresholds.thresholds[ch]
                );
            }
        }
        self.engine.put(DaqCommand::threshold_query());
        self.refresh_status();
    }

    pub fn open_config_dialog(&mut self) -> ActionResponse {
        self.query_card(DaqCommand::channel_query());
        let current = ChannelConfig::load(self.engine.as_ref());
        ActionResponse::ShowDialog(Dialog::Config(ConfigDialog::new(current)))
    }

    pub fn apply_config(&mut self, outcome: DialogOutcome<ChannelConfig>) {
        if let DialogOutcome::Accepted(config) = outcome {
            config.store(self.engine.as_ref());
            self.send(DaqCommand::channel_config(&config));
            for ch in 0..N_CHANNELS {
                spdlog::debug!("channel{} selected {}", ch, config.channels[ch]);
            }
            for (name, active) in ChannelConfig::COINCIDENCE_NAMES
                .iter()
                .zip(config.coincidences.iter())
            {
                spdlog::debug!("coincidence {} {}", name, active);
            }
        }
        self.engine.put(DaqCommand::channel_query());
        self.refresh_status();
    }

    pub fn open_advanced_dialog(&mut self) -> ActionResponse {
        self.query_card(DaqCommand::channel_query());
        let current = AdvancedSettings::load(self.engine.as_ref());
        ActionResponse::ShowDialog(Dialog::Advanced(AdvancedDialog::new(current)))
    }

    pub fn apply_advanced(&mut self, outcome: DialogOutcome<AdvancedSettings>) {
        if let DialogOutcome::Accepted(mut settings) = outcome {
            settings.time_window =
                validate_time_window(settings.time_window).unwrap_or_else(|e| {
                    spdlog::warn!("{e}. Time window too small or too big, resetting to 5 s.");
                    DEFAULT_TIME_WINDOW
                });
            settings.store(self.engine.as_ref());

            for command in DaqCommand::gate_width(settings.gate_width) {
                self.send(command);
            }
            self.update_timer.reschedule(
                Duration::from_secs_f64(settings.time_window),
                Instant::now(),
            );
            spdlog::debug!("Setting time window to {:.2}", settings.time_window);
            spdlog::debug!(
                "Switching write_daq_status option to {}",
                settings.write_daq_status
            );
        }
        self.engine.put(DaqCommand::channel_query());
        self.refresh_status();
    }

    /// Apply whatever a settings dialog returned. Dialogs without settings are ignored
    pub fn close_dialog(&mut self, dialog: Dialog, accepted: bool) {
        match dialog {
            Dialog::Thresholds(d) => {
                self.apply_thresholds(if accepted { d.accept() } else { d.cancel() })
            }
            Dialog::Config(d) => self.apply_config(if accepted { d.accept() } else { d.cancel() }),
            Dialog::Advanced(d) => {
                self.apply_advanced(if accepted { d.accept() } else { d.cancel() })
            }
            Dialog::ConfirmClose => {
                self.confirm_close(accepted);
            }
            Dialog::Help | Dialog::About => (),
        }
    }

    /// Open the data folder in the file browser, creating it first if needed
    pub fn open_data_folder(&mut self) -> ActionResponse {
        let path = &self.config.data_path;
        if let Err(e) = std::fs::create_dir_all(path) {
            spdlog::warn!("Could not create data folder {}: {}", path.display(), e);
        }
        if let Err(e) = opener::open(path) {
            spdlog::warn!("Could not open data folder {}: {}", path.display(), e);
        }
        ActionResponse::Done
    }

    pub fn open_manual(&mut self) -> ActionResponse {
        let url = self.config.manual_url.clone();
        self.open_link(&url);
        ActionResponse::Done
    }

    pub fn open_docs(&mut self) -> ActionResponse {
        let url = self.config.docs_url.clone();
        self.open_link(&url);
        ActionResponse::Done
    }

    fn open_link(&self, url: &str) {
        spdlog::info!("Opening docs from {}", url);
        if let Err(e) = opener::open_browser(url) {
            spdlog::warn!("Can not open webbrowser ({e})! Browse to {url} to see the docs");
        }
    }

    /// Send an operator-typed command. Returns false if there was nothing to send
    pub fn send_raw_command(&mut self, text: &str) -> bool {
        match DaqCommand::raw(text) {
            Some(command) => {
                self.send(command);
                true
            }
            None => false,
        }
    }

    /// Send what is on the DAQ tab's command line
    pub fn submit_daq_command(&mut self) -> bool {
        let text = match self.registry.get_as_mut::<DaqWidget>("daq") {
            Some(daq) => daq.take_command_input(),
            None => return false,
        };
        self.send_raw_command(&text)
    }

    /// Ask the card for a GPS report
    pub fn request_gps(&mut self) {
        if let Some(gps) = self.registry.get_as_mut::<GpsWidget>("gps") {
            gps.mark_query();
        }
        self.send(DaqCommand::gps_query());
    }

    /// Start the close protocol. The front-end has to ask the operator
    pub fn request_close(&mut self) -> ActionResponse {
        spdlog::info!("Attempting to close application");
        self.close_pending = true;
        ActionResponse::ShowDialog(Dialog::ConfirmClose)
    }

    /// Answer to the close prompt. Returns true if the application may close now
    pub fn confirm_close(&mut self, accepted: bool) -> bool {
        self.close_pending = false;
        if accepted {
            self.shutdown();
            true
        } else {
            spdlog::info!("Close aborted");
            false
        }
    }

    /// Finish every widget, stop the engine, and wait (bounded) for the worker.
    /// Only the first call does anything
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.flush_daq_log();
        for entry in self.registry.iter_mut() {
            if let Err(e) = entry.widget.finish() {
                spdlog::error!("Widget {} failed to finish: {}", entry.name, e);
            }
        }
        self.engine.stop();
        self.join_worker(self.config.join_timeout());
    }

    fn join_worker(&mut self, timeout: Duration) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        // no deadline if it lies beyond what Instant can represent
        let deadline = Instant::now().checked_add(timeout);
        while !handle.is_finished() && deadline.map_or(true, |d| Instant::now() < d) {
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }
        if !handle.is_finished() {
            spdlog::warn!(
                "Acquisition worker did not stop within {:.1} s, abandoning it",
                timeout.as_secs_f64()
            );
            return;
        }
        self.report_worker(handle);
    }

    /// Notice a worker which ended on its own
    fn check_worker(&mut self) {
        if self.worker.as_ref().is_some_and(|w| w.is_finished()) {
            if let Some(handle) = self.worker.take() {
                spdlog::warn!("Acquisition worker stopped unexpectedly");
                self.report_worker(handle);
            }
        }
    }

    fn report_worker(&mut self, handle: JoinHandle<Result<(), EngineError>>) {
        match handle.join() {
            Ok(Ok(())) => spdlog::info!("Acquisition worker complete"),
            Ok(Err(e)) => {
                spdlog::error!("Acquisition engine error: {e}");
                self.worker_error = Some(e.to_string());
            }
            Err(_) => {
                spdlog::error!("An error occured joining the acquisition worker!");
                self.worker_error = Some(String::from("the acquisition worker panicked"));
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub fn is_close_pending(&self) -> bool {
        self.close_pending
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Error of a worker that ended badly, taken once
    pub fn take_worker_error(&mut self) -> Option<String> {
        self.worker_error.take()
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WidgetRegistry {
        &mut self.registry
    }

    pub fn engine(&self) -> &dyn AcquisitionEngine {
        self.engine.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Raw lines not yet flushed to the DAQ widget
    pub fn pending_daq_log(&self) -> &str {
        &self.daq_log
    }

    pub fn start_time(&self) -> OffsetDateTime {
        self.start_time
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WidgetError;
    use crate::settings::{SettingValue, Settings, SettingsAccess};
    use crate::widgets::Widget;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, OnceLock, RwLock};

    /// Records commands, acknowledges queries at once, and runs until stopped
    #[derive(Default)]
    struct StubEngine {
        settings: RwLock<Settings>,
        sent: Mutex<Vec<String>>,
        stopped: AtomicBool,
        ignore_stop: bool,
        /// Keep the acknowledgements instead of sending them
        withhold_acks: bool,
        held_acks: Mutex<Vec<Sender<()>>>,
    }

    impl StubEngine {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl SettingsAccess for StubEngine {
        fn get_setting(&self, key: &str, default: SettingValue) -> SettingValue {
            self.settings.get_setting(key, default)
        }

        fn update_setting(&self, key: &str, value: SettingValue) {
            self.settings.update_setting(key, value)
        }
    }

    impl AcquisitionEngine for StubEngine {
        fn put(&self, command: DaqCommand) {
            self.sent.lock().unwrap().push(command.to_string());
        }

        fn query(&self, command: DaqCommand) -> Receiver<()> {
            self.put(command);
            let (tx, rx) = mpsc::channel();
            if self.withhold_acks {
                self.held_acks.lock().unwrap().push(tx);
            } else {
                tx.send(()).unwrap();
            }
            rx
        }

        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn run(&self, _sink: Sender<MeasurementEvent>) -> Result<(), EngineError> {
            let started = Instant::now();
            loop {
                let stop = self.stopped.load(Ordering::SeqCst);
                if (stop && !self.ignore_stop) || started.elapsed() > Duration::from_secs(3) {
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }

    /// Writes its name into a shared log when finished
    struct RecordingWidget {
        name: &'static str,
        finished: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Widget for RecordingWidget {
        fn is_active(&self) -> bool {
            true
        }

        fn set_active(&mut self, _active: bool) {}

        fn finish(&mut self) -> Result<(), WidgetError> {
            self.finished.lock().unwrap().push(self.name);
            Ok(())
        }
    }

    fn test_config(dir: &tempfile::TempDir) -> Config {
        Config {
            data_path: dir.path().to_path_buf(),
            record_rates: false,
            join_timeout_s: 1.0,
            ..Config::default()
        }
    }

    fn controller(stub: &Arc<StubEngine>, config: Config) -> Controller {
        Controller::new(config, stub.clone()).unwrap()
    }

    /// Route the default logger into a file once, and return what was logged so far
    fn captured_log() -> String {
        static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
        let path = LOG_PATH.get_or_init(|| {
            let path = std::env::temp_dir()
                .join(format!("muonic_gui_controller_{}.log", std::process::id()));
            let file_sink = Arc::new(
                spdlog::sink::FileSink::builder()
                    .path(path.clone())
                    .truncate(true)
                    .build()
                    .unwrap(),
            );
            let logger = Arc::new(
                spdlog::Logger::builder()
                    .flush_level_filter(spdlog::LevelFilter::All)
                    .sink(file_sink)
                    .build()
                    .unwrap(),
            );
            spdlog::set_default_logger(logger);
            path
        });
        spdlog::default_logger().flush();
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_widget_setup() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let controller = controller(&stub, test_config(&dir));
        assert_eq!(controller.registry().tabs(), WIDGET_TABS);
        assert!(controller.registry().is_active("rate"));
        assert!(!controller.registry().is_active("decay"));
        assert_eq!(stub.get_f64(keys::TIME_WINDOW, 0.0), 5.0);
    }

    #[test]
    fn test_rate_routing() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let mut controller = controller(&stub, test_config(&dir));
        controller.route_event(MeasurementEvent::new(
            Measurement::Rate {
                rates: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
                counts: [10, 20, 30, 40, 50],
                time_window: 60.0,
                query_time: 60.0,
            },
            1,
        ));

        let rate = controller.registry().get_as::<RateWidget>("rate").unwrap();
        assert_eq!(rate.rate_fields, ["1.000", "2.000", "3.000", "4.000", "5.000"]);
        assert_eq!(rate.scalar_fields, ["10", "20", "30", "40", "50"]);
        assert_eq!(rate.info_field("max_rate"), Some("6.000 1/s"));
        assert_eq!(rate.info_field("daq_time"), Some("60.00 s"));
        assert_eq!(rate.scalars_monitor.len(), 1);
    }

    #[test]
    fn test_rate_recording() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let config = Config {
            record_rates: true,
            ..test_config(&dir)
        };
        let mut controller = controller(&stub, config);
        controller.route_event(MeasurementEvent::new(
            Measurement::Rate {
                rates: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
                counts: [1, 2, 3, 4, 5],
                time_window: 5.0,
                query_time: 5.0,
            },
            1,
        ));
        controller.shutdown();

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|f| f.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("_R.txt"));
        let text = std::fs::read_to_string(dir.path().join(&files[0])).unwrap();
        assert!(text.contains("5.00 1.000 2.000 3.000 4.000 5.000 6.000 1 2 3 4 5 5.00"));
    }

    #[test]
    fn test_other_routing() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let mut controller = controller(&stub, test_config(&dir));
        let widths = [vec![10.0, 20.0], vec![], vec![30.0], vec![]];
        controller.route_event(MeasurementEvent::new(Measurement::PulseWidths(widths), 1));
        controller.route_event(MeasurementEvent::new(Measurement::Decay(2.0), 2));
        controller.route_event(MeasurementEvent::new(Measurement::FlightTime(5.0), 3));
        controller.route_event(MeasurementEvent::new(
            Measurement::RawLog(String::from("Latitude:  0:00.000 N")),
            4,
        ));

        let registry = controller.registry();
        let pulse = registry.get_as::<PulseWidget>("pulse").unwrap();
        assert_eq!(pulse.pulse_width_canvases[0].entries(), 2);
        assert_eq!(pulse.total_pulses(), 3);
        // inactive by default, but still filled
        let decay = registry.get_as::<DecayWidget>("decay").unwrap();
        assert!(!decay.is_active());
        assert_eq!(decay.plot_canvas.entries(), 1);
        let velocity = registry.get_as::<VelocityWidget>("velocity").unwrap();
        assert_eq!(velocity.plot_canvas.entries(), 1);
        let gps = registry.get_as::<GpsWidget>("gps").unwrap();
        assert_eq!(gps.report().count(), 1);
    }

    #[test]
    fn test_daq_log_flush() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let mut controller = controller(&stub, test_config(&dir));
        let start = Instant::now();
        controller.route_event(MeasurementEvent::new(
            Measurement::RawLog(String::from("DS S0=00000001")),
            1,
        ));
        controller.route_event(MeasurementEvent::new(
            Measurement::RawLog(String::from("TL")),
            2,
        ));
        controller.tick(start + Duration::from_millis(100));
        assert_eq!(controller.pending_daq_log(), "DS S0=00000001\nTL\n");
        let daq = controller.registry().get_as::<DaqWidget>("daq").unwrap();
        assert_eq!(daq.log(), "");

        controller.tick(start + Duration::from_millis(1600));
        assert_eq!(controller.pending_daq_log(), "");
        let daq = controller.registry().get_as::<DaqWidget>("daq").unwrap();
        assert_eq!(daq.log(), "DS S0=00000001\nTL\n");
    }

    #[test]
    fn test_threshold_flow() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let mut controller = controller(&stub, test_config(&dir));

        let mut dialog = match controller.open_threshold_dialog() {
            ActionResponse::ShowDialog(Dialog::Thresholds(dialog)) => dialog,
            other => panic!("unexpected response {other:?}"),
        };
        assert_eq!(dialog.thresholds.thresholds, [300; 4]);
        dialog.thresholds.thresholds = [250, 260, 270, 280];
        controller.close_dialog(Dialog::Thresholds(dialog), true);

        assert_eq!(
            stub.sent(),
            ["TL", "TL 0 250", "TL 1 260", "TL 2 270", "TL 3 280", "TL"]
        );
        assert_eq!(stub.get_u32("threshold_ch3", 0), 280);
        let status = controller.registry().get_as::<StatusWidget>("status").unwrap();
        assert_eq!(status.thresholds.thresholds, [250, 260, 270, 280]);
    }

    #[test]
    fn test_unanswered_query_uses_cached_settings() {
        captured_log();
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine {
            withhold_acks: true,
            ..StubEngine::default()
        });
        ThresholdSettings {
            thresholds: [110, 120, 130, 140],
        }
        .store(stub.as_ref());
        let config = Config {
            ack_timeout_ms: 20,
            ..test_config(&dir)
        };
        let mut controller = controller(&stub, config);

        let waited = Instant::now();
        let dialog = match controller.open_threshold_dialog() {
            ActionResponse::ShowDialog(Dialog::Thresholds(dialog)) => dialog,
            other => panic!("unexpected response {other:?}"),
        };
        assert!(waited.elapsed() >= Duration::from_millis(20));
        assert_eq!(dialog.thresholds.thresholds, [110, 120, 130, 140]);
        assert_eq!(stub.held_acks.lock().unwrap().len(), 1);
        assert!(captured_log()
            .contains("The card did not answer in time, using the cached settings"));
    }

    #[test]
    fn test_threshold_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let mut controller = controller(&stub, test_config(&dir));
        controller.open_threshold_dialog();
        controller.apply_thresholds(DialogOutcome::Cancelled);
        assert_eq!(stub.sent(), ["TL", "TL"]);
        assert_eq!(stub.get_u32("threshold_ch0", 0), 300);
    }

    #[test]
    fn test_config_flow() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let mut controller = controller(&stub, test_config(&dir));
        controller.open_config_dialog();
        controller.apply_config(DialogOutcome::Accepted(ChannelConfig {
            channels: [true, false, true, false],
            coincidences: [false, true, false, false],
            veto: true,
            veto_channels: [false, true, false],
        }));
        assert_eq!(stub.sent(), ["DC", "WC 00 95", "DC"]);
        assert!(stub.get_bool("veto_ch1", false));
        assert!(!stub.get_bool("active_ch1", true));
    }

    #[test]
    fn test_advanced_time_window() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let mut controller = controller(&stub, test_config(&dir));
        controller.apply_advanced(DialogOutcome::Accepted(AdvancedSettings {
            gate_width: 5000,
            time_window: 0.001,
            write_daq_status: true,
        }));
        assert_eq!(stub.get_f64(keys::TIME_WINDOW, 0.0), 5.0);
        assert_eq!(stub.get_u32(keys::GATE_WIDTH, 0), 5000);
        assert!(stub.get_bool(keys::WRITE_DAQ_STATUS, false));
        assert_eq!(stub.sent(), ["WC 03 01", "WC 02 f4", "DC"]);

        controller.apply_advanced(DialogOutcome::Accepted(AdvancedSettings {
            gate_width: 100,
            time_window: 12.5,
            write_daq_status: false,
        }));
        assert_eq!(stub.get_f64(keys::TIME_WINDOW, 0.0), 12.5);
        assert_eq!(
            controller.update_timer.interval(),
            Duration::from_secs_f64(12.5)
        );
    }

    #[test]
    fn test_bad_time_window_is_logged() {
        captured_log();
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let mut controller = controller(&stub, test_config(&dir));
        controller.apply_advanced(DialogOutcome::Accepted(AdvancedSettings {
            gate_width: 100,
            time_window: 20000.0,
            write_daq_status: false,
        }));
        assert_eq!(stub.get_f64(keys::TIME_WINDOW, 0.0), 5.0);
        assert_eq!(controller.update_timer.interval(), Duration::from_secs(5));
        assert!(captured_log()
            .contains("Time window too small or too big, resetting to 5 s."));
    }

    #[test]
    fn test_raw_commands() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let mut controller = controller(&stub, test_config(&dir));
        assert!(controller.send_raw_command("  ds "));
        assert!(!controller.send_raw_command("   "));
        if let Some(daq) = controller.registry_mut().get_as_mut::<DaqWidget>("daq") {
            daq.command_input = String::from("v1");
        }
        assert!(controller.submit_daq_command());
        controller.request_gps();
        assert_eq!(stub.sent(), ["DS", "V1", "DG"]);
    }

    #[test]
    fn test_close_declined() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let mut controller = controller(&stub, test_config(&dir));
        controller.start().unwrap();
        assert!(matches!(controller.start(), Err(ControllerError::AlreadyRunning)));

        assert_eq!(
            controller.request_close(),
            ActionResponse::ShowDialog(Dialog::ConfirmClose)
        );
        assert!(controller.is_close_pending());
        assert!(!controller.confirm_close(false));
        assert!(!controller.is_close_pending());
        assert!(controller.is_running());
        assert!(!stub.stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_close_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let mut controller = controller(&stub, test_config(&dir));
        let finished = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second"] {
            controller
                .registry_mut()
                .add(
                    name,
                    name,
                    Box::new(RecordingWidget {
                        name,
                        finished: finished.clone(),
                    }),
                )
                .unwrap();
        }
        controller.start().unwrap();

        assert!(controller.confirm_close(true));
        assert!(stub.stopped.load(Ordering::SeqCst));
        assert!(!controller.is_running());
        assert!(controller.is_closed());
        assert!(controller.take_worker_error().is_none());

        controller.shutdown();
        drop(controller);
        assert_eq!(*finished.lock().unwrap(), ["first", "second"]);
    }

    #[test]
    fn test_join_timeout_abandons_worker() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine {
            ignore_stop: true,
            ..StubEngine::default()
        });
        let config = Config {
            join_timeout_s: 0.1,
            ..test_config(&dir)
        };
        let mut controller = controller(&stub, config);
        controller.start().unwrap();
        let started = Instant::now();
        assert!(controller.confirm_close(true));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(controller.is_closed());
    }

    #[test]
    fn test_infinite_join_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubEngine::default());
        let config = Config {
            join_timeout_s: f64::INFINITY,
            ..test_config(&dir)
        };
        let mut infinite = controller(&stub, config);
        infinite.start().unwrap();
        assert!(infinite.confirm_close(true));
        assert!(!infinite.is_running());
        assert!(infinite.is_closed());

        // representable as a Duration, but not as an Instant
        let stub = Arc::new(StubEngine::default());
        let config = Config {
            join_timeout_s: 1.8e19,
            ..test_config(&dir)
        };
        let mut far = controller(&stub, config);
        far.start().unwrap();
        assert!(far.confirm_close(true));
        assert!(far.is_closed());
    }
}
