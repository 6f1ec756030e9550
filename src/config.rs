use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// RSSI value CoreBluetooth reports when the reading is not available.
pub const RSSI_UNAVAILABLE: i16 = 127;

/// Weakest reading that is still surfaced by default.
pub const DEFAULT_RSSI_FLOOR: i16 = -100;

/// Measured-power byte written into synthesized iBeacon frames (-59 dBm).
pub const DEFAULT_IBEACON_TX_PLACEHOLDER: u8 = 0xc5;

/// Decides which signal readings are dropped before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RssiPolicy {
    pub invalid_sentinel: i16,
    /// Readings below this are dropped. `None` keeps everything.
    pub floor: Option<i16>,
    /// Some platform revisions report 0 for "no reading"; others report it for
    /// a genuinely strong signal. Off by default.
    pub zero_is_invalid: bool,
}

impl Default for RssiPolicy {
    fn default() -> Self {
        Self {
            invalid_sentinel: RSSI_UNAVAILABLE,
            floor: Some(DEFAULT_RSSI_FLOOR),
            zero_is_invalid: false,
        }
    }
}

impl RssiPolicy {
    pub fn accepts(&self, rssi: i16) -> bool {
        if rssi == self.invalid_sentinel {
            return false;
        }
        if self.zero_is_invalid && rssi == 0 {
            return false;
        }
        match self.floor {
            Some(floor) => rssi >= floor,
            None => true,
        }
    }
}

/// Scan session configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SessionConfig {
    /// How long a start request waits for the radio to power on
    pub readiness_timeout: Duration,
    pub rssi: RssiPolicy,
    pub ibeacon_tx_placeholder: u8,
    /// Capacity of the host event channel
    pub event_buffer: usize,
    /// Forget previously merged observations whenever a new scan starts
    pub reset_cache_on_start: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(2),
            rssi: RssiPolicy::default(),
            ibeacon_tx_placeholder: DEFAULT_IBEACON_TX_PLACEHOLDER,
            event_buffer: 256,
            reset_cache_on_start: true,
        }
    }
}

impl SessionConfig {
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    pub fn with_rssi_policy(mut self, policy: RssiPolicy) -> Self {
        self.rssi = policy;
        self
    }

    pub fn with_ibeacon_tx_placeholder(mut self, tx: u8) -> Self {
        self.ibeacon_tx_placeholder = tx;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn with_reset_cache_on_start(mut self, reset: bool) -> Self {
        self.reset_cache_on_start = reset;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.readiness_timeout.is_zero() {
            return Err(Error::from_string(
                "Readiness timeout must be > 0".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(Error::from_string(
                "Event buffer must hold at least one event".to_string(),
            ));
        }
        Ok(())
    }
}
