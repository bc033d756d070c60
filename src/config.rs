//! # Load-test configuration.
//!
//! Provides [`Config`] centralized settings for one orchestrated run, plus the
//! validation of the operator-supplied total duration ([`parse_duration_secs`]).
//!
//! The command line only supplies the duration. Every other value here is a
//! fixed default; the struct exists so that the library API (and tests) can
//! shorten timings without a configuration file format.
//!
//! ## Sentinel values
//! - `cpu_workers = 0` → one CPU worker per available processing unit
//! - `memory_ceiling_mb = 0` → no ceiling (grow until allocation fails)

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::LoadError;

/// Global configuration for a load-test run.
///
/// ## Field semantics
/// - `wave_on` / `wave_off`: length of the burn and idle halves of one wave (both `> 0`)
/// - `grace`: how long workers get to exit voluntarily after StopSignal
/// - `cpu_workers`: CPU worker count (`0` = one per processing unit)
/// - `cpu_idle_poll`: idle sleep of a CPU worker while BurnSignal is clear
/// - `memory_chunk_mb` / `memory_interval`: memory growth step and cadence
/// - `memory_ceiling_mb`: optional cap on held memory (`0` = none)
/// - `log_interval` / `log_timeout`: log cadence and per-line command timeout
/// - `log_program` / `log_tag`: external logging command and its tag
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Duration of the ON (burn) half of each wave.
    pub wave_on: Duration,
    /// Duration of the OFF (idle) half of each wave.
    pub wave_off: Duration,
    /// Grace period for voluntary worker exit before forced termination.
    pub grace: Duration,
    /// Number of CPU workers (`0` = available parallelism).
    pub cpu_workers: usize,
    /// Idle sleep between BurnSignal checks while not burning.
    pub cpu_idle_poll: Duration,
    /// Size of each memory chunk in MB.
    pub memory_chunk_mb: u64,
    /// Delay between memory allocations.
    pub memory_interval: Duration,
    /// Ceiling on held memory in MB (`0` = unlimited).
    pub memory_ceiling_mb: u64,
    /// Delay between synthetic log lines.
    pub log_interval: Duration,
    /// Timeout for one external logging command.
    pub log_timeout: Duration,
    /// External logging program.
    pub log_program: PathBuf,
    /// Tag passed to the logging program.
    pub log_tag: String,
    /// Capacity of the event bus.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the number of CPU workers to spawn.
    ///
    /// Falls back to one worker when the platform cannot report its parallelism.
    pub fn cpu_worker_count(&self) -> usize {
        if self.cpu_workers > 0 {
            return self.cpu_workers;
        }
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }

    /// Returns the memory ceiling as an `Option`.
    #[inline]
    pub fn memory_ceiling(&self) -> Option<u64> {
        if self.memory_ceiling_mb == 0 {
            None
        } else {
            Some(self.memory_ceiling_mb)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - wave `20s` ON / `10s` OFF, `5s` grace
    /// - one CPU worker per processing unit, `10ms` idle poll
    /// - `50MB` every `5s`, no ceiling
    /// - one log line every `500ms` through `logger -t LoadTest`, `500ms` timeout
    fn default() -> Self {
        Self {
            wave_on: Duration::from_secs(20),
            wave_off: Duration::from_secs(10),
            grace: Duration::from_secs(5),
            cpu_workers: 0,
            cpu_idle_poll: Duration::from_millis(10),
            memory_chunk_mb: 50,
            memory_interval: Duration::from_secs(5),
            memory_ceiling_mb: 0,
            log_interval: Duration::from_millis(500),
            log_timeout: Duration::from_millis(500),
            log_program: PathBuf::from("logger"),
            log_tag: "LoadTest".to_string(),
            bus_capacity: 1024,
        }
    }
}

/// Parses the total run duration given on the command line.
///
/// Accepts a positive whole number of seconds (surrounding whitespace is
/// ignored). Anything else is rejected with [`LoadError::InvalidDuration`].
///
/// # Example
/// ```
/// use std::time::Duration;
/// use loadwave::parse_duration_secs;
///
/// assert_eq!(parse_duration_secs("35").unwrap(), Duration::from_secs(35));
/// assert!(parse_duration_secs("0").is_err());
/// assert!(parse_duration_secs("ten").is_err());
/// ```
pub fn parse_duration_secs(input: &str) -> Result<Duration, LoadError> {
    let invalid = |reason| LoadError::InvalidDuration {
        input: input.to_string(),
        reason,
    };

    let secs: i64 = input
        .trim()
        .parse()
        .map_err(|_| invalid("must be an integer number of seconds"))?;
    if secs <= 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(Duration::from_secs(secs as u64))
}
