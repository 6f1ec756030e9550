use async_trait::async_trait;

use crate::Result;

/// Capabilities the scan session needs from a platform radio adapter.
///
/// Implementations report state changes and sightings through the
/// `Sender<RadioEvent>` they are constructed with; the methods here are the
/// commands flowing the other way.
#[async_trait]
pub trait RadioProvider: Send {
    /// Bring up the underlying adapter. Called lazily from the first start
    /// request, since creating the adapter may prompt for permission.
    /// Must be idempotent.
    async fn ensure_radio_ready(&mut self) -> Result<()>;

    async fn radio_state(&mut self) -> Result<RadioState>;

    async fn start_observation(&mut self) -> Result<()>;

    async fn stop_observation(&mut self) -> Result<()>;

    /// Begin proximity ranging for beacons matching `constraints`.
    async fn start_ranging(&mut self, constraints: &[String]) -> Result<()>;

    async fn stop_ranging(&mut self) -> Result<()>;
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScanFilter {
    /// Beacon identity constraints (proximity UUIDs). Empty means a plain
    /// advertisement scan.
    pub identity_constraints: Vec<String>,
}

impl ScanFilter {
    pub fn identities<I, S>(constraints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity_constraints: constraints.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_ranging(&self) -> bool {
        !self.identity_constraints.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RadioState {
    Unknown = 0,
    Resetting = 1,
    Unsupported = 2,
    Unauthorized = 3,
    PoweredOff = 4,
    PoweredOn = 5,
    /// No adapter at all
    Unavailable = 6,
}

impl RadioState {
    pub fn is_ready(self) -> bool {
        self == RadioState::PoweredOn
    }

    /// The error a start request fails with when the radio settles here.
    pub fn as_error(self) -> Option<crate::Error> {
        match self {
            RadioState::PoweredOn | RadioState::Unknown | RadioState::Resetting => None,
            RadioState::PoweredOff => Some(crate::Error::RadioOff),
            RadioState::Unauthorized => Some(crate::Error::RadioUnauthorized),
            RadioState::Unsupported => Some(crate::Error::RadioUnsupported),
            RadioState::Unavailable => Some(crate::Error::RadioUnavailable),
        }
    }
}
