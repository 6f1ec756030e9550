//! Beacon classification
//!
//! Recognizes Eddystone and iBeacon payloads in decoded advertisements, and
//! builds advertisements out of location-layer ranging reports. Synthesized
//! iBeacon observations are keyed by `{uuid}-{major}-{minor}` rather than a
//! device address, so they never merge with radio sightings of the same
//! beacon; only their `manufacturer_data["76"]` bytes are identical.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use uuid::Uuid;

use crate::api::advertisement::{Advertisement, RangingInfo, RangingReport};
use crate::decoder::{hex, parse_hex};

pub const EDDYSTONE_SERVICE_UUID: &str = "0000feaa-0000-1000-8000-00805f9b34fb";

/// Apple, Inc.
pub const IBEACON_COMPANY_ID: u16 = 76;

pub const IBEACON_DISPLAY_NAME: &str = "iBeacon";

/// Beacon type (0x02) and remaining length (0x15 = 21).
const IBEACON_PREFIX: [u8; 2] = [0x02, 0x15];
const IBEACON_FRAME_LEN: usize = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconFormat {
    Eddystone { frame: Option<EddystoneFrame> },
    IBeacon(IBeaconFrame),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EddystoneFrame {
    Uid,
    Url,
    Tlm,
    Eid,
    Unknown(u8),
}

impl EddystoneFrame {
    pub fn from_type(frame_type: u8) -> Self {
        match frame_type {
            0x00 => EddystoneFrame::Uid,
            0x10 => EddystoneFrame::Url,
            0x20 => EddystoneFrame::Tlm,
            0x30 => EddystoneFrame::Eid,
            other => EddystoneFrame::Unknown(other),
        }
    }
}

/// iBeacon manufacturer payload, company identifier excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IBeaconFrame {
    pub uuid: Uuid,
    pub major: u16,
    pub minor: u16,
    /// Calibrated RSSI at one meter
    pub tx_power: i8,
}

impl IBeaconFrame {
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() != IBEACON_FRAME_LEN || payload[..2] != IBEACON_PREFIX {
            return None;
        }
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&payload[2..18]);
        Some(Self {
            uuid: Uuid::from_bytes(uuid),
            major: u16::from_be_bytes([payload[18], payload[19]]),
            minor: u16::from_be_bytes([payload[20], payload[21]]),
            tx_power: payload[22] as i8,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(IBEACON_FRAME_LEN);
        frame.extend_from_slice(&IBEACON_PREFIX);
        frame.extend_from_slice(self.uuid.as_bytes());
        frame.extend_from_slice(&self.major.to_be_bytes());
        frame.extend_from_slice(&self.minor.to_be_bytes());
        frame.push(self.tx_power as u8);
        frame
    }

    pub fn identity(&self) -> String {
        beacon_identity(&self.uuid.hyphenated().to_string(), self.major, self.minor)
    }
}

pub fn beacon_identity(uuid: &str, major: u16, minor: u16) -> String {
    format!("{}-{}-{}", uuid, major, minor)
}

/// Expects a normalized UUID set; see [`crate::decoder::normalize_uuid`].
pub fn is_eddystone(service_uuids: &BTreeSet<String>) -> bool {
    service_uuids
        .iter()
        .any(|uuid| uuid.eq_ignore_ascii_case(EDDYSTONE_SERVICE_UUID))
}

/// Space separated hex of the iBeacon frame for `uuid`/`major`/`minor`,
/// with `tx_placeholder` as the measured power byte.
pub fn encode_ibeacon_frame(uuid: &Uuid, major: u16, minor: u16, tx_placeholder: u8) -> String {
    let frame = IBeaconFrame {
        uuid: *uuid,
        major,
        minor,
        tx_power: tx_placeholder as i8,
    };
    hex(&frame.encode())
}

/// Build the observation for one ranging report.
pub fn synthesize(report: &RangingReport, tx_placeholder: u8) -> Advertisement {
    let (uuid, uuid_text) = match Uuid::parse_str(report.uuid.trim()) {
        Ok(uuid) => (uuid, uuid.hyphenated().to_string()),
        Err(e) => {
            warn!("ranging report with malformed uuid {:?}: {}", report.uuid, e);
            (Uuid::nil(), report.uuid.trim().to_ascii_lowercase())
        }
    };

    let mut manufacturer_data = BTreeMap::new();
    manufacturer_data.insert(
        IBEACON_COMPANY_ID.to_string(),
        encode_ibeacon_frame(&uuid, report.major, report.minor, tx_placeholder),
    );

    Advertisement {
        id: beacon_identity(&uuid_text, report.major, report.minor),
        display_name: IBEACON_DISPLAY_NAME.to_string(),
        rssi: report.rssi,
        tx_power: 0,
        connectable: false,
        service_uuids: BTreeSet::new(),
        manufacturer_data,
        service_data: BTreeMap::new(),
        is_eddystone: false,
        ranging: Some(RangingInfo {
            accuracy: report.accuracy,
            proximity: report.proximity,
        }),
    }
}

pub fn classify(advertisement: &Advertisement) -> Option<BeaconFormat> {
    if advertisement.is_eddystone {
        let frame = advertisement
            .service_data
            .get(EDDYSTONE_SERVICE_UUID)
            .and_then(|data| parse_hex(data))
            .and_then(|bytes| bytes.first().copied())
            .map(EddystoneFrame::from_type);
        return Some(BeaconFormat::Eddystone { frame });
    }

    advertisement
        .manufacturer_data
        .get(&IBEACON_COMPANY_ID.to_string())
        .and_then(|data| parse_hex(data))
        .and_then(|bytes| IBeaconFrame::parse(&bytes))
        .map(BeaconFormat::IBeacon)
}

impl Advertisement {
    pub fn beacon_format(&self) -> Option<BeaconFormat> {
        classify(self)
    }
}
