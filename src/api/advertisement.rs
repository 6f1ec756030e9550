use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One normalized observation of a broadcast or a ranged beacon.
///
/// `tx_power` is 0 when the platform did not report it, which cannot be told
/// apart from a real 0 dBm reading.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Advertisement {
    pub id: String,
    pub display_name: String,
    pub rssi: i16,
    pub tx_power: i16,
    pub connectable: bool,
    pub service_uuids: BTreeSet<String>,
    pub manufacturer_data: BTreeMap<String, String>,
    pub service_data: BTreeMap<String, String>,
    pub is_eddystone: bool,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub ranging: Option<RangingInfo>,
}

/// Fields that only exist on observations synthesized from a ranging report.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RangingInfo {
    pub accuracy: f64,
    pub proximity: Proximity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Proximity {
    Immediate,
    Near,
    Far,
    Unknown,
}

impl Advertisement {
    pub fn accuracy(&self) -> Option<f64> {
        self.ranging.map(|r| r.accuracy)
    }

    pub fn proximity(&self) -> Option<Proximity> {
        self.ranging.map(|r| r.proximity)
    }
}

/// Manufacturer data as platforms hand it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManufacturerRecord {
    /// Whole AD payload, company identifier still in the first two bytes
    /// (CoreBluetooth, raw HCI).
    Raw(Vec<u8>),
    /// Already split by the platform (Android `SparseArray`).
    Keyed { company_id: u16, payload: Vec<u8> },
}

/// A platform scan result before normalization.
///
/// `None` marks a field the platform did not report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAdvertisement {
    pub address: String,
    /// Name carried in the advertisement or scan response
    pub local_name: Option<String>,
    /// Name the platform has cached for the device
    pub device_name: Option<String>,
    pub rssi: i16,
    pub tx_power: Option<i16>,
    pub connectable: Option<bool>,
    pub service_uuids: Vec<String>,
    pub manufacturer_data: Vec<ManufacturerRecord>,
    pub service_data: Vec<(String, Vec<u8>)>,
}

impl RawAdvertisement {
    pub fn new(address: impl Into<String>, rssi: i16) -> Self {
        Self {
            address: address.into(),
            rssi,
            ..Self::default()
        }
    }
}

/// A location-layer proximity report for one beacon identity.
#[derive(Debug, Clone, PartialEq)]
pub struct RangingReport {
    pub uuid: String,
    pub major: u16,
    pub minor: u16,
    pub rssi: i16,
    pub accuracy: f64,
    pub proximity: Proximity,
}
