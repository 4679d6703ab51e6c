//! Device configuration
//!
//! Loaded with figment from a YAML, TOML or JSON file, then overridden by
//! `KNX_`-prefixed environment variables (`KNX_SERIAL__PORT=/dev/ttyS1`).
//!
//! ```yaml
//! physical_address: "1.1.1"
//! serial:
//!   port: /dev/ttyAMA0
//! objects:
//!   - address: "1/0/1"
//!     dpt: "1.001"
//!     flags: "CWU"
//!   - address: "1/0/2"
//!     dpt: "9.001"
//!     flags: sensor
//! ```

use std::path::Path;

use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action_queue::DEFAULT_ACTION_QUEUE_CAPACITY;
use crate::address::{GroupAddress, IndividualAddress};
use crate::com_object::{ComObject, ObjectFlags};
use crate::dpt::Dpt;
use crate::error::{KnxError, Result};
use crate::telegram::Priority;
use crate::tpuart::constants::{
    ACK_TIMEOUT_MS, EOP_GAP_US, RESET_ATTEMPTS, RESET_ATTEMPT_TIMEOUT_MS,
};
use crate::tpuart::{TpUartMode, TpUartTiming};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "KNX_";

/// Top-level device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Individual address, `"area.line.device"` or the raw 16-bit value
    pub physical_address: IndividualAddress,
    #[serde(default)]
    pub mode: TpUartMode,
    #[serde(default = "default_action_queue_capacity")]
    pub action_queue_capacity: usize,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,
}

fn default_action_queue_capacity() -> usize {
    DEFAULT_ACTION_QUEUE_CAPACITY
}

/// Polling cadence and protocol timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Maximum gap between two RX polls (microseconds)
    pub rx_poll_interval_us: u64,
    /// Maximum gap between two TX polls (microseconds)
    pub tx_poll_interval_us: u64,
    /// Quiet time that ends a telegram (microseconds)
    pub eop_gap_us: u64,
    /// Wait for the data confirm (milliseconds)
    pub ack_timeout_ms: u64,
    /// Spacing of start-up read requests (milliseconds)
    pub init_read_interval_ms: u64,
    pub reset_attempts: u32,
    pub reset_attempt_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            rx_poll_interval_us: 400,
            tx_poll_interval_us: 800,
            eop_gap_us: EOP_GAP_US,
            ack_timeout_ms: ACK_TIMEOUT_MS,
            init_read_interval_ms: 500,
            reset_attempts: RESET_ATTEMPTS,
            reset_attempt_timeout_ms: RESET_ATTEMPT_TIMEOUT_MS,
        }
    }
}

impl TimingConfig {
    /// Timing subset used by the transceiver engine
    pub fn tpuart(&self) -> TpUartTiming {
        TpUartTiming {
            eop_gap_us: self.eop_gap_us,
            ack_timeout_ms: self.ack_timeout_ms,
            reset_attempts: self.reset_attempts,
            reset_attempt_timeout_ms: self.reset_attempt_timeout_ms,
        }
    }
}

/// Serial port settings; framing is fixed at 8E1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyAMA0".to_string(),
            baud_rate: 19_200,
        }
    }
}

/// One communication object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub address: GroupAddress,
    pub dpt: Dpt,
    /// Letters (`"CRT"`), a preset name, or a list of flag names
    pub flags: ObjectFlags,
    #[serde(default)]
    pub priority: Priority,
}

impl DeviceConfig {
    /// Load from a file, picking the format from its extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| KnxError::config("Config file must have an extension"))?;

        let figment = match extension {
            "toml" => Figment::new().merge(Toml::file(path)),
            "yaml" | "yml" => Figment::new().merge(Yaml::file(path)),
            "json" => Figment::new().merge(Json::file(path)),
            _ => {
                return Err(KnxError::config(format!(
                    "Unsupported config file format: {}",
                    extension
                )))
            }
        };

        let config: DeviceConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| {
                KnxError::config(format!("Failed to load configuration from file: {}", e))
            })?;
        config.validate()?;
        debug!(
            "Loaded {} with {} objects for {}",
            path.display(),
            config.objects.len(),
            config.physical_address
        );
        Ok(config)
    }

    /// Reject settings the stack cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.action_queue_capacity == 0 {
            return Err(KnxError::config("action_queue_capacity must be at least 1"));
        }
        if self.timing.reset_attempts == 0 {
            return Err(KnxError::config("timing.reset_attempts must be at least 1"));
        }
        if self.timing.rx_poll_interval_us >= self.timing.eop_gap_us {
            return Err(KnxError::config(format!(
                "timing.rx_poll_interval_us ({}) must be below eop_gap_us ({})",
                self.timing.rx_poll_interval_us, self.timing.eop_gap_us
            )));
        }
        Ok(())
    }

    /// Communication objects in configuration order
    pub fn com_objects(&self) -> Vec<ComObject> {
        self.objects
            .iter()
            .map(|o| ComObject::with_priority(o.address, o.dpt, o.flags, o.priority))
            .collect()
    }
}
