//! # Wave schedule.
//!
//! A run alternates ON (burn) and OFF (idle) phases starting with ON, until
//! the requested total is reached. The last phase is cut at the deadline.
//!
//! ```text
//! total = 35s, ON = 20s, OFF = 10s
//!
//! 0s              20s        30s   35s
//! |====== ON =====|-- OFF ---|=ON=|
//!      wave 1        wave 1   wave 2
//! ```
//!
//! Offsets are measured from the start of the wave loop; the orchestrator
//! sleeps until `start + offset` so phase boundaries do not drift.

use std::time::Duration;

use crate::config::Config;
use crate::error::LoadError;

/// Half of a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    /// BurnSignal set.
    On,
    /// BurnSignal clear.
    Off,
}

/// One planned step of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    /// ON or OFF.
    pub kind: PhaseKind,
    /// Wave number, starting at 1; an OFF phase shares its wave's number.
    pub wave: u32,
    /// Start, relative to the wave loop start.
    pub offset: Duration,
    /// Length (possibly truncated by the deadline).
    pub duration: Duration,
}

impl Phase {
    /// End of the phase, relative to the wave loop start.
    pub fn end(&self) -> Duration {
        self.offset + self.duration
    }
}

/// Alternating ON/OFF durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveSchedule {
    on: Duration,
    off: Duration,
}

impl WaveSchedule {
    /// Returns `None` unless both halves are positive.
    pub fn new(on: Duration, off: Duration) -> Option<Self> {
        if on.is_zero() || off.is_zero() {
            return None;
        }
        Some(Self { on, off })
    }

    /// Schedule from `cfg.wave_on` / `cfg.wave_off`.
    pub fn from_config(cfg: &Config) -> Result<Self, LoadError> {
        Self::new(cfg.wave_on, cfg.wave_off).ok_or(LoadError::InvalidConfig {
            reason: "wave ON and OFF durations must be greater than zero",
        })
    }

    /// Phases covering exactly `total`.
    pub fn plan(&self, total: Duration) -> Plan {
        Plan {
            schedule: *self,
            total,
            cursor: Duration::ZERO,
            next: PhaseKind::On,
            wave: 0,
        }
    }
}

/// Iterator over the phases of one run. See [`WaveSchedule::plan`].
#[derive(Debug, Clone)]
pub struct Plan {
    schedule: WaveSchedule,
    total: Duration,
    cursor: Duration,
    next: PhaseKind,
    wave: u32,
}

impl Iterator for Plan {
    type Item = Phase;

    fn next(&mut self) -> Option<Phase> {
        if self.cursor >= self.total {
            return None;
        }
        let kind = self.next;
        let full = match kind {
            PhaseKind::On => {
                self.wave += 1;
                self.next = PhaseKind::Off;
                self.schedule.on
            }
            PhaseKind::Off => {
                self.next = PhaseKind::On;
                self.schedule.off
            }
        };
        let duration = full.min(self.total - self.cursor);
        let phase = Phase {
            kind,
            wave: self.wave,
            offset: self.cursor,
            duration,
        };
        self.cursor += duration;
        Some(phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn default_schedule() -> WaveSchedule {
        WaveSchedule::from_config(&Config::default()).unwrap()
    }

    #[test]
    fn thirty_five_seconds_truncates_second_burn() {
        let phases: Vec<_> = default_schedule().plan(secs(35)).collect();
        assert_eq!(
            phases,
            vec![
                Phase { kind: PhaseKind::On, wave: 1, offset: secs(0), duration: secs(20) },
                Phase { kind: PhaseKind::Off, wave: 1, offset: secs(20), duration: secs(10) },
                Phase { kind: PhaseKind::On, wave: 2, offset: secs(30), duration: secs(5) },
            ]
        );
    }

    #[test]
    fn short_run_is_a_single_truncated_burn() {
        let phases: Vec<_> = default_schedule().plan(secs(5)).collect();
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].kind, PhaseKind::On);
        assert_eq!(phases[0].duration, secs(5));
    }

    #[test]
    fn exact_wave_multiple_ends_on_off() {
        let phases: Vec<_> = default_schedule().plan(secs(60)).collect();
        assert_eq!(phases.len(), 4);
        assert_eq!(phases.last().map(|p| p.kind), Some(PhaseKind::Off));
        assert_eq!(phases.last().map(Phase::end), Some(secs(60)));
    }

    #[test]
    fn phases_are_contiguous_and_never_pass_the_deadline() {
        for total in [1, 19, 20, 21, 29, 30, 31, 95, 3600] {
            let total = secs(total);
            let mut cursor = Duration::ZERO;
            for phase in default_schedule().plan(total) {
                assert_eq!(phase.offset, cursor);
                assert!(!phase.duration.is_zero());
                cursor = phase.end();
            }
            assert_eq!(cursor, total);
        }
    }

    #[test]
    fn zero_length_halves_are_rejected() {
        assert!(WaveSchedule::new(Duration::ZERO, secs(10)).is_none());
        let cfg = Config {
            wave_off: Duration::ZERO,
            ..Config::default()
        };
        assert_eq!(
            WaveSchedule::from_config(&cfg).unwrap_err().as_label(),
            "invalid_config"
        );
    }
}
