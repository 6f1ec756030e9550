use crate::api::advertisement::{Advertisement, RangingReport, RawAdvertisement};
use crate::api::radio::RadioState;

/// Events a radio provider pushes into the scan session.
#[derive(Debug, Clone)]
pub enum RadioEvent {
    StateUpdate {
        state: RadioState,
    },
    DeviceDiscovered {
        advertisement: RawAdvertisement,
    },
    /// Delayed batch delivery; expanded in order.
    BatchDiscovered {
        advertisements: Vec<RawAdvertisement>,
    },
    BeaconsRanged {
        reports: Vec<RangingReport>,
    },
    /// The platform rejected an already accepted scan.
    ScanFailed {
        failure: ScanFailure,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFailure {
    AlreadyStarted,
    ApplicationRegistrationFailed,
    FeatureUnsupported,
    InternalError,
    Unknown(i32),
}

impl ScanFailure {
    /// Map an Android `ScanCallback` error code.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => ScanFailure::AlreadyStarted,
            2 => ScanFailure::ApplicationRegistrationFailed,
            3 => ScanFailure::InternalError,
            4 => ScanFailure::FeatureUnsupported,
            other => ScanFailure::Unknown(other),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ScanFailure::AlreadyStarted => "Scan already started".to_string(),
            ScanFailure::ApplicationRegistrationFailed => "App registration failed".to_string(),
            ScanFailure::FeatureUnsupported => "Feature not supported".to_string(),
            ScanFailure::InternalError => "Internal error".to_string(),
            ScanFailure::Unknown(code) => format!("Unknown error: {}", code),
        }
    }
}

/// Events the scan session emits toward the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    ScanStarted,
    ScanStopped,
    DeviceFound { advertisement: Advertisement },
    ScanError { error: String },
}

impl ScanEvent {
    /// Host method the event is delivered as.
    pub fn method_name(&self) -> &'static str {
        match self {
            ScanEvent::ScanStarted => "onScanStarted",
            ScanEvent::ScanStopped => "onScanStopped",
            ScanEvent::DeviceFound { .. } => "onDeviceFound",
            ScanEvent::ScanError { .. } => "onScanError",
        }
    }
}
