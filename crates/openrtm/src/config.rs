// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed configuration derived from [`Properties`].
//!
//! Each struct reads relative keys from the node its owner hands it:
//!
//! | Struct            | Node                  | Keys                                             |
//! |-------------------|-----------------------|--------------------------------------------------|
//! | [`BufferConfig`]  | `dataport.buffer`     | `length`, `write.full_policy`, `write.timeout`, `read.empty_policy`, `read.timeout` |
//! | [`PublisherConfig`]| `dataport.publisher` | `push_policy`, `skip_count`, `push_rate`         |
//! | [`EcConfig`]      | `exec_cxt`            | `periodic.rate`, `sync_transition`, `transition_timeout` |

use crate::error::{Error, Result};
use crate::properties::Properties;
use std::time::Duration;

/// Default ring capacity.
pub const DEFAULT_BUFFER_LENGTH: usize = 8;
/// Default blocking write/read timeout.
pub const DEFAULT_BUFFER_TIMEOUT: Duration = Duration::from_secs(1);
/// Default periodic publisher rate (Hz).
pub const DEFAULT_PUSH_RATE: f64 = 100.0;
/// Default execution-context rate (Hz).
pub const DEFAULT_EC_RATE: f64 = 1000.0;
/// Default wait for synchronous transitions.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_millis(500);

/// Environment override for the execution-context rate.
pub const ENV_EC_RATE: &str = "OPENRTM_EC_RATE";

/// Period of a rate in Hz, or `None` when the rate is not positive or
/// its period does not fit a `Duration`.
pub fn period_of(hz: f64) -> Option<Duration> {
    if !hz.is_finite() || hz <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / hz).ok()
}

fn invalid(key: &str, value: &str) -> Error {
    Error::InvalidProperty {
        key: key.to_string(),
        value: value.to_string(),
    }
}

// ============================================================================
// Buffer
// ============================================================================

/// What a write does when the ring is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullPolicy {
    /// Drop the oldest record and store the new one.
    #[default]
    Overwrite,
    /// Reject the write with `Full`.
    DoNothing,
    /// Wait for space up to the write timeout.
    Block,
}

impl FullPolicy {
    pub fn parse(key: &str, raw: &str) -> Result<Self> {
        match raw {
            "overwrite" => Ok(Self::Overwrite),
            "do_nothing" => Ok(Self::DoNothing),
            "block" => Ok(Self::Block),
            _ => Err(invalid(key, raw)),
        }
    }
}

/// What a read does when the ring is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPolicy {
    /// Return `Empty` immediately.
    #[default]
    DoNothing,
    /// Re-deliver the most recently consumed record.
    Readback,
    /// Wait for data up to the read timeout.
    Block,
}

impl EmptyPolicy {
    pub fn parse(key: &str, raw: &str) -> Result<Self> {
        match raw {
            "do_nothing" => Ok(Self::DoNothing),
            "readback" => Ok(Self::Readback),
            "block" => Ok(Self::Block),
            _ => Err(invalid(key, raw)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferConfig {
    pub length: usize,
    pub full_policy: FullPolicy,
    pub write_timeout: Duration,
    pub empty_policy: EmptyPolicy,
    pub read_timeout: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_BUFFER_LENGTH,
            full_policy: FullPolicy::default(),
            write_timeout: DEFAULT_BUFFER_TIMEOUT,
            empty_policy: EmptyPolicy::default(),
            read_timeout: DEFAULT_BUFFER_TIMEOUT,
        }
    }
}

impl BufferConfig {
    /// Read the `dataport.buffer` node. Missing keys keep their defaults.
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(length) = props.get_usize("length")? {
            if length == 0 {
                return Err(invalid("length", "0"));
            }
            cfg.length = length;
        }
        if let Some(raw) = props.get_lowercase("write.full_policy") {
            cfg.full_policy = FullPolicy::parse("write.full_policy", &raw)?;
        }
        if let Some(t) = props.get_duration_secs("write.timeout")? {
            cfg.write_timeout = t;
        }
        if let Some(raw) = props.get_lowercase("read.empty_policy") {
            cfg.empty_policy = EmptyPolicy::parse("read.empty_policy", &raw)?;
        }
        if let Some(t) = props.get_duration_secs("read.timeout")? {
            cfg.read_timeout = t;
        }
        Ok(cfg)
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// How the draining thread of a buffered publisher empties its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushPolicy {
    /// Send every buffered record, oldest first.
    #[default]
    All,
    /// Send one record per wake-up.
    Fifo,
    /// Send one of every `skip_count + 1` records, drop the rest.
    Skip,
    /// Send only the newest record, drop the rest.
    New,
}

impl PushPolicy {
    pub fn parse(key: &str, raw: &str) -> Result<Self> {
        match raw {
            "all" => Ok(Self::All),
            "fifo" => Ok(Self::Fifo),
            "skip" => Ok(Self::Skip),
            "new" => Ok(Self::New),
            _ => Err(invalid(key, raw)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublisherConfig {
    pub push_policy: PushPolicy,
    pub skip_count: usize,
    /// Periodic publisher rate (Hz).
    pub push_rate: f64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            push_policy: PushPolicy::default(),
            skip_count: 0,
            push_rate: DEFAULT_PUSH_RATE,
        }
    }
}

impl PublisherConfig {
    /// Read the `dataport.publisher` node.
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(raw) = props.get_lowercase("push_policy") {
            cfg.push_policy = PushPolicy::parse("push_policy", &raw)?;
        }
        if let Some(n) = props.get_usize("skip_count")? {
            cfg.skip_count = n;
        }
        if let Some(rate) = props.get_f64("push_rate")? {
            if period_of(rate).is_none() {
                return Err(invalid("push_rate", &rate.to_string()));
            }
            cfg.push_rate = rate;
        }
        Ok(cfg)
    }

    /// Interval between periodic pushes.
    pub fn push_period(&self) -> Result<Duration> {
        period_of(self.push_rate).ok_or_else(|| invalid("push_rate", &self.push_rate.to_string()))
    }
}

// ============================================================================
// Execution context
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct EcConfig {
    /// Tick rate (Hz).
    pub rate: f64,
    /// Wait for activate/deactivate/reset to be applied before returning.
    pub sync_transition: bool,
    pub transition_timeout: Duration,
}

impl Default for EcConfig {
    fn default() -> Self {
        Self {
            rate: DEFAULT_EC_RATE,
            sync_transition: true,
            transition_timeout: DEFAULT_TRANSITION_TIMEOUT,
        }
    }
}

impl EcConfig {
    /// Read the `exec_cxt` node, then apply `OPENRTM_EC_RATE` if set.
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(rate) = props.get_f64("periodic.rate")? {
            cfg.set_rate(rate)?;
        }
        cfg.sync_transition = props.get_bool("sync_transition", cfg.sync_transition)?;
        if let Some(t) = props.get_duration_secs("transition_timeout")? {
            cfg.transition_timeout = t;
        }
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(ENV_EC_RATE) {
            let rate = raw
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid(ENV_EC_RATE, &raw))?;
            self.set_rate(rate)?;
        }
        Ok(())
    }

    fn set_rate(&mut self, rate: f64) -> Result<()> {
        if period_of(rate).is_none() {
            return Err(invalid("periodic.rate", &rate.to_string()));
        }
        self.rate = rate;
        Ok(())
    }

    /// `Duration::MAX` when `rate` has no representable period.
    pub fn period(&self) -> Duration {
        period_of(self.rate).unwrap_or(Duration::MAX)
    }
}
