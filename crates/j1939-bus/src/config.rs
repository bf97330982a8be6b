//! Bus configuration
//!
//! ```toml
//! tool_address = 0xF9
//! global_window_ms = 600
//! ds_window_ms = 200
//! ```

use std::path::Path;
use std::time::Duration;

use j1939_core::address::{GLOBAL_ADDR, NULL_ADDR, TOOL_ADDR};
use serde::{Deserialize, Serialize};

use crate::error::{BusError, BusResult};

/// Exchange timing and addressing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Source address the tool transmits from
    #[serde(default = "default_tool_address")]
    pub tool_address: u8,
    /// How long to collect responses to a global request
    #[serde(default = "default_global_window_ms")]
    pub global_window_ms: u64,
    /// How long to wait for a destination-specific response
    #[serde(default = "default_ds_window_ms")]
    pub ds_window_ms: u64,
}

fn default_tool_address() -> u8 {
    TOOL_ADDR
}

fn default_global_window_ms() -> u64 {
    600
}

fn default_ds_window_ms() -> u64 {
    200
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            tool_address: default_tool_address(),
            global_window_ms: default_global_window_ms(),
            ds_window_ms: default_ds_window_ms(),
        }
    }
}

impl BusConfig {
    pub fn from_toml_str(content: &str) -> BusResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> BusResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> BusResult<()> {
        if matches!(self.tool_address, GLOBAL_ADDR | NULL_ADDR) {
            return Err(BusError::InvalidConfig(format!(
                "tool address 0x{:02X} is reserved",
                self.tool_address
            )));
        }
        if self.global_window_ms == 0 || self.ds_window_ms == 0 {
            return Err(BusError::InvalidConfig("response windows must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn global_window(&self) -> Duration {
        Duration::from_millis(self.global_window_ms)
    }

    pub fn ds_window(&self) -> Duration {
        Duration::from_millis(self.ds_window_ms)
    }
}
