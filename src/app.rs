//! Core application runner (business logic) for `jaalee-listener`.
//!
//! This module is intentionally decoupled from CLI parsing and process exit codes
//! so it can be tested deterministically with an injected scanner and clock.

use crate::alias::{Alias, AliasMap, resolve_name};
use crate::config::{PublishFields, parse_duration, parse_nonzero_duration, parse_percentage};
use crate::decoder;
use crate::output::mqtt::{DEFAULT_DEVICE_PREFIX, DEFAULT_DISCOVERY_PREFIX, MqttFormatter};
use crate::output::{OutputError, OutputFormatter};
use crate::reading::TemperatureUnit;
use crate::scanner::{Advertisement, Backend, ScanError};
use crate::tracker::{DEFAULT_BATTERY_LOW_THRESHOLD, LifecycleEvent, LivenessTracker, TrackerConfig};
use clap::Parser;
use std::future::Future;
use std::io;
use std::io::Write;
use std::pin::Pin;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Configuration for the core run loop.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Specify human-readable name for a sensor.
    /// Format: --alias DE:AD:BE:EF:00:00=Kitchen
    #[arg(long = "alias", value_parser = crate::alias::parse_alias, value_name = "ALIAS")]
    pub aliases: Vec<Alias>,

    /// Unit used for published temperatures
    #[arg(long, value_enum, default_value_t)]
    pub temperature_unit: TemperatureUnit,

    /// Battery percentage at or below which the battery is reported low
    #[arg(long, default_value_t = DEFAULT_BATTERY_LOW_THRESHOLD, value_parser = parse_percentage)]
    pub battery_low_threshold: u8,

    /// Silence after which a sensor is reported offline.
    /// Accepts duration with suffix: 300s, 5m, 1h. Without suffix, seconds.
    #[arg(long, default_value = "300s", value_parser = parse_duration)]
    pub sensor_timeout: Duration,

    /// How often to check for timed out sensors
    #[arg(long, default_value = "120s", value_parser = parse_nonzero_duration)]
    pub sweep_interval: Duration,

    /// Prefix for state and status topics
    #[arg(long, default_value = DEFAULT_DEVICE_PREFIX)]
    pub device_prefix: String,

    /// Home Assistant discovery prefix
    #[arg(long, default_value = DEFAULT_DISCOVERY_PREFIX)]
    pub discovery_prefix: String,

    #[command(flatten)]
    pub publish: PublishFields,

    /// Verbose output, print reasons for unrecognized advertisements
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Bluetooth scanner backend to use
    #[arg(long, default_value_t, value_enum)]
    pub backend: Backend,
}

impl Options {
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            battery_low_threshold: self.battery_low_threshold,
            sensor_timeout: self.sensor_timeout,
            sweep_interval: self.sweep_interval,
        }
    }

    pub fn formatter(&self) -> MqttFormatter {
        MqttFormatter::new(
            self.device_prefix.clone(),
            self.discovery_prefix.clone(),
            self.temperature_unit,
            self.publish,
        )
    }
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn start_scan(
        &self,
        backend: Backend,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + '_>>;
}

/// Real scanner implementation that delegates to the compiled-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(
        &self,
        backend: Backend,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + '_>>
    {
        Box::pin(async move { crate::scanner::start_scan(backend).await })
    }
}

/// Wall-clock source for tracking timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

fn log_startup(options: &Options) {
    log::info!("jaalee-listener {} starting", env!("CARGO_PKG_VERSION"));
    log::info!("Temperature unit: {}", options.temperature_unit.symbol());
    log::info!(
        "Timeout monitoring: {}s timeout, checked every {}s",
        options.sensor_timeout.as_secs(),
        options.sweep_interval.as_secs()
    );

    let optional = options.publish.enabled_names();
    if optional.is_empty() {
        log::info!("Optional sensors: none enabled");
    } else {
        log::info!("Optional sensors enabled: {}", optional.join(", "));
    }
}

fn publish(
    formatter: &dyn OutputFormatter,
    events: &[LifecycleEvent],
    aliases: &AliasMap,
    out: &mut dyn Write,
) -> Result<(), RunError> {
    for event in events {
        let name = resolve_name(&event.address(), aliases);
        for message in formatter.format(event, &name)? {
            writeln!(out, "{message}")?;
        }
    }
    Ok(())
}

fn handle_advertisement(
    advertisement: &Advertisement,
    tracker: &mut LivenessTracker,
    now: SystemTime,
) -> Result<Vec<LifecycleEvent>, decoder::DecodeError> {
    let reading = decoder::decode(
        &advertisement.manufacturer_data,
        Some(advertisement.address),
    )?;

    log::debug!(
        "Jaalee JHT {} | {}°C | {}% | battery {}% | RSSI {} dBm | {}",
        advertisement.address,
        reading.temperature(),
        reading.humidity(),
        reading.battery(),
        advertisement.rssi,
        reading.format()
    );

    Ok(tracker.observe(advertisement.address, reading, advertisement.rssi, now))
}

/// Run the core processing loop with the system clock.
///
/// See [`run_with_clock`].
pub async fn run_with_io(
    options: Options,
    scanner: &dyn Scanner,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    run_with_clock(options, scanner, &SystemClock, out, err).await
}

/// Run the core processing loop, writing messages to `out` and verbose errors to `err`.
///
/// - Every advertisement is decoded; recognized readings go through the
///   liveness tracker and the resulting events are formatted and written to `out`.
/// - Unrecognized advertisements are written to `err` only when `options.verbose` is true.
/// - Every `sweep_interval` the tracker sweeps for timed out sensors.
///
/// Returns when the scanner's channel closes.
pub async fn run_with_clock(
    options: Options,
    scanner: &dyn Scanner,
    clock: &dyn Clock,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    let aliases: AliasMap = crate::alias::to_map(&options.aliases);
    let formatter = options.formatter();
    let mut tracker = LivenessTracker::new(options.tracker_config());

    log_startup(&options);

    let mut advertisements = scanner.start_scan(options.backend).await?;

    let period = tracker.sweep_interval();
    let mut sweep_timer = interval_at(Instant::now() + period, period);
    sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = advertisements.recv() => {
                let Some(advertisement) = received else {
                    break;
                };
                match handle_advertisement(&advertisement, &mut tracker, clock.now()) {
                    Ok(events) => publish(&formatter, &events, &aliases, out)?,
                    Err(decode_err) => {
                        if options.verbose {
                            writeln!(err, "{}: {decode_err}", advertisement.address)?;
                        }
                    }
                }
            }
            _ = sweep_timer.tick() => {
                let events = tracker.sweep(clock.now());
                publish(&formatter, &events, &aliases, out)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac_address::MacAddress;
    use crate::test_utils::{TEST_MAC, long_frame, short_frame, t0};
    use std::sync::Mutex;

    /// Replays advertisements, each after a delay, then closes the channel.
    #[derive(Debug)]
    struct FakeScanner {
        script: Mutex<Vec<(Duration, Advertisement)>>,
        linger: Duration,
    }

    impl FakeScanner {
        fn new(advertisements: Vec<Advertisement>) -> Self {
            Self::scripted(
                advertisements
                    .into_iter()
                    .map(|a| (Duration::ZERO, a))
                    .collect(),
                Duration::ZERO,
            )
        }

        fn scripted(script: Vec<(Duration, Advertisement)>, linger: Duration) -> Self {
            Self {
                script: Mutex::new(script),
                linger,
            }
        }
    }

    impl Scanner for FakeScanner {
        fn start_scan(
            &self,
            _backend: Backend,
        ) -> Pin<
            Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + '_>,
        > {
            let script = self.script.lock().unwrap().clone();
            let linger = self.linger;
            Box::pin(async move {
                let (tx, rx) = mpsc::channel::<Advertisement>(script.len().max(1));
                tokio::spawn(async move {
                    for (delay, advertisement) in script {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        let _ = tx.send(advertisement).await;
                    }
                    if !linger.is_zero() {
                        tokio::time::sleep(linger).await;
                    }
                    // drop tx to close channel
                });
                Ok(rx)
            })
        }
    }

    /// Clock that follows tokio's (possibly paused) time, starting at `t0()`.
    struct TokioClock {
        start: Instant,
    }

    impl Clock for TokioClock {
        fn now(&self) -> SystemTime {
            t0() + self.start.elapsed()
        }
    }

    fn options() -> Options {
        Options::parse_from(["jaalee-listener"])
    }

    fn advertisement(address: MacAddress, data: Vec<u8>) -> Advertisement {
        Advertisement {
            address,
            rssi: -60,
            manufacturer_data: data,
        }
    }

    async fn run(options: Options, scanner: &FakeScanner) -> (String, String) {
        let mut out = Vec::<u8>::new();
        let mut err = Vec::<u8>::new();
        let clock = TokioClock {
            start: Instant::now(),
        };
        run_with_clock(options, scanner, &clock, &mut out, &mut err)
            .await
            .unwrap();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_default_options() {
        let options = options();
        assert_eq!(options.temperature_unit, TemperatureUnit::Celsius);
        assert_eq!(options.battery_low_threshold, 20);
        assert_eq!(options.sensor_timeout, Duration::from_secs(300));
        assert_eq!(options.sweep_interval, Duration::from_secs(120));
        assert_eq!(options.device_prefix, "jaalee");
        assert_eq!(options.discovery_prefix, "homeassistant");
        assert_eq!(options.publish, PublishFields::default());
    }

    #[test]
    fn test_parse_full_command_line() {
        let options = Options::parse_from([
            "jaalee-listener",
            "--alias",
            "AA:BB:CC:DD:EE:FF=Kitchen",
            "--temperature-unit",
            "fahrenheit",
            "--battery-low-threshold",
            "15",
            "--sensor-timeout",
            "10m",
            "--sweep-interval",
            "30s",
            "--publish-rssi",
            "--publish-data-age",
        ]);
        assert_eq!(options.aliases[0].address, TEST_MAC);
        assert_eq!(options.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(options.battery_low_threshold, 15);
        assert_eq!(options.sensor_timeout, Duration::from_secs(600));
        assert_eq!(options.sweep_interval, Duration::from_secs(30));
        assert!(options.publish.rssi && options.publish.data_age);
        assert!(!options.publish.last_seen);
        assert_eq!(options.backend, Backend::default());
    }

    #[cfg(feature = "hci")]
    #[test]
    fn test_parse_backend() {
        let options = Options::parse_from(["jaalee-listener", "--backend", "hci"]);
        assert_eq!(options.backend, Backend::Hci);
    }

    #[test]
    fn test_run_error_shows_underlying_message_once() {
        let err = RunError::from(ScanError::Bluetooth("No default adapter".to_string()));
        assert_eq!(err.to_string(), "Bluetooth error: No default adapter");
    }

    #[test]
    fn test_rejects_zero_sweep_interval() {
        let result = Options::try_parse_from(["jaalee-listener", "--sweep-interval", "0"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn run_announces_new_sensor_then_publishes_state() {
        let scanner = FakeScanner::new(vec![
            advertisement(TEST_MAC, long_frame(0x8000, 0xFFFF, 90)),
            advertisement(TEST_MAC, long_frame(0x6666, 0x8000, 90)),
        ]);

        let (out, err) = run(options(), &scanner).await;
        assert!(err.is_empty());

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 6, "{out}");
        assert!(lines[0].starts_with("homeassistant/sensor/jaalee_aabbccddeeff_temperature/config {"));
        assert!(lines[1].starts_with("homeassistant/sensor/jaalee_aabbccddeeff_humidity/config {"));
        assert!(lines[2].starts_with("homeassistant/sensor/jaalee_aabbccddeeff_battery/config {"));
        assert_eq!(lines[3], "jaalee/aabbccddeeff/status online");
        assert_eq!(
            lines[4],
            r#"jaalee/aabbccddeeff/state {"temperature":42.5,"humidity":100.0,"battery":90}"#
        );
        assert_eq!(
            lines[5],
            r#"jaalee/aabbccddeeff/state {"temperature":25.0,"humidity":50.0,"battery":90}"#
        );
    }

    #[tokio::test]
    async fn run_uses_alias_in_discovery() {
        let scanner = FakeScanner::new(vec![advertisement(
            TEST_MAC,
            long_frame(0x6666, 0x8000, 90),
        )]);
        let options = Options::parse_from([
            "jaalee-listener",
            "--alias",
            "aa:bb:cc:dd:ee:ff=Sauna",
        ]);

        let (out, _) = run(options, &scanner).await;
        assert!(out.lines().next().unwrap().contains(r#""name":"Sauna""#));
    }

    #[tokio::test]
    async fn run_accepts_short_frame_from_matching_sender() {
        let scanner = FakeScanner::new(vec![advertisement(
            TEST_MAC,
            short_frame(16, TEST_MAC, 0x6666, 0x8000, 70),
        )]);

        let (out, _) = run(options(), &scanner).await;
        assert!(out.contains(r#"{"temperature":25.0,"humidity":50.0,"battery":70}"#));
    }

    #[tokio::test]
    async fn run_prints_decode_errors_only_when_verbose() {
        let other = MacAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let scanner = FakeScanner::new(vec![
            advertisement(TEST_MAC, vec![0x05, 0x12, 0xFC]),
            advertisement(other, short_frame(15, TEST_MAC, 0x6666, 0x8000, 70)),
        ]);

        // non-verbose: nothing written
        let (out, err) = run(options(), &scanner).await;
        assert!(out.is_empty());
        assert!(err.is_empty());

        // verbose: errors are written to err
        let mut verbose = options();
        verbose.verbose = true;
        let (out, err) = run(verbose, &scanner).await;
        assert!(out.is_empty());
        assert!(err.contains("AA:BB:CC:DD:EE:FF: Unsupported frame length: 3 bytes"));
        assert!(err.contains("11:22:33:44:55:66: Address mismatch"));
    }

    #[tokio::test(start_paused = true)]
    async fn run_sweeps_silent_sensor_and_reannounces() {
        let frame = long_frame(0x6666, 0x8000, 90);
        let scanner = FakeScanner::scripted(
            vec![
                (Duration::ZERO, advertisement(TEST_MAC, frame.clone())),
                // Sweeps at 120s, 240s keep it; the sweep at 360s times it out.
                (Duration::from_secs(400), advertisement(TEST_MAC, frame)),
            ],
            Duration::from_secs(10),
        );

        let (out, _) = run(options(), &scanner).await;
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 11, "{out}");
        assert_eq!(lines[3], "jaalee/aabbccddeeff/status online");
        assert_eq!(lines[5], "jaalee/aabbccddeeff/status offline");
        assert!(lines[6].contains("_temperature/config {"));
        assert_eq!(lines[9], "jaalee/aabbccddeeff/status online");
    }

    #[tokio::test(start_paused = true)]
    async fn run_publishes_optional_fields() {
        let scanner = FakeScanner::scripted(
            vec![
                (Duration::ZERO, advertisement(TEST_MAC, long_frame(0x6666, 0x8000, 10))),
                (
                    Duration::from_secs(30),
                    advertisement(TEST_MAC, long_frame(0x6666, 0x8000, 10)),
                ),
            ],
            Duration::ZERO,
        );
        let options = Options::parse_from([
            "jaalee-listener",
            "--publish-rssi",
            "--publish-last-seen",
            "--publish-link-quality",
            "--publish-battery-low",
            "--publish-data-age",
        ]);

        let (out, _) = run(options, &scanner).await;
        let last = out.lines().last().unwrap();
        let (topic, payload) = last.split_once(' ').unwrap();
        assert_eq!(topic, "jaalee/aabbccddeeff/state");

        let json: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(json["rssi"], -60);
        assert_eq!(json["link_quality"], 50);
        assert_eq!(json["battery_low"], "ON");
        assert_eq!(json["data_age"], 30);
        assert!(
            json["last_seen"]
                .as_str()
                .unwrap()
                .starts_with("2001-09-09T01:47:10")
        );
    }

    #[test]
    fn run_with_io_on_blocking_runtime() {
        let scanner = FakeScanner::new(vec![]);
        let mut out = Vec::<u8>::new();
        let mut err = Vec::<u8>::new();
        tokio_test::block_on(run_with_io(options(), &scanner, &mut out, &mut err)).unwrap();
        assert!(out.is_empty());
    }
}
