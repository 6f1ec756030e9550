//! Advertisement decoding
//!
//! Turns platform scan records, or raw advertising payload bytes, into the
//! normalized [`Advertisement`]. Every function here is total: malformed or
//! missing fields fall back to their documented defaults.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use log::{debug, warn};
use uuid::Uuid;

use crate::api::advertisement::{Advertisement, ManufacturerRecord, RawAdvertisement};
use crate::classifier;

/// Bluetooth base UUID, `00000000-0000-1000-8000-00805f9b34fb`.
pub const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Identity used if a platform hands over a record without an address.
pub const UNKNOWN_DEVICE_ID: &str = "unknown";

/// Only some of the assigned numbers are used, see
/// https://www.bluetooth.com/specifications/assigned-numbers/generic-access-profile/
mod ad_type {
    pub const FLAGS: u8 = 0x01;
    pub const INCOMPLETE_16_BIT_UUIDS: u8 = 0x02;
    pub const COMPLETE_16_BIT_UUIDS: u8 = 0x03;
    pub const INCOMPLETE_32_BIT_UUIDS: u8 = 0x04;
    pub const COMPLETE_32_BIT_UUIDS: u8 = 0x05;
    pub const INCOMPLETE_128_BIT_UUIDS: u8 = 0x06;
    pub const COMPLETE_128_BIT_UUIDS: u8 = 0x07;
    pub const SHORTENED_LOCAL_NAME: u8 = 0x08;
    pub const COMPLETE_LOCAL_NAME: u8 = 0x09;
    pub const TX_POWER_LEVEL: u8 = 0x0a;
    pub const SERVICE_DATA_16_BIT_UUID: u8 = 0x16;
    pub const SERVICE_DATA_32_BIT_UUID: u8 = 0x20;
    pub const SERVICE_DATA_128_BIT_UUID: u8 = 0x21;
    pub const MANUFACTURER_SPECIFIC_DATA: u8 = 0xff;
}

/// Two lowercase hex digits per byte, separated by single spaces.
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Inverse of [`hex`]. `None` on anything [`hex`] would not have produced.
pub fn parse_hex(text: &str) -> Option<Vec<u8>> {
    if text.is_empty() {
        return Some(Vec::new());
    }
    text.split(' ')
        .map(|pair| {
            if pair.len() != 2 {
                return None;
            }
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

pub fn uuid_from_short(short: u32) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Lowercase hyphenated form of a UUID string. 16 and 32 bit short forms
/// (`"FEAA"`) are expanded onto the Bluetooth base UUID; strings that are
/// not UUIDs at all are only trimmed and lowercased.
pub fn normalize_uuid(text: &str) -> String {
    let text = text.trim();
    if (text.len() == 4 || text.len() == 8) && text.chars().all(|c| c.is_ascii_hexdigit()) {
        if let Ok(short) = u32::from_str_radix(text, 16) {
            return uuid_from_short(short).hyphenated().to_string();
        }
    }
    match Uuid::parse_str(text) {
        Ok(uuid) => uuid.hyphenated().to_string(),
        Err(_) => {
            debug!("keeping non-uuid service identifier {:?} as is", text);
            text.to_ascii_lowercase()
        }
    }
}

/// `(company id as decimal, hex payload)`, or `None` when a raw record is too
/// short to carry a company identifier.
pub fn decode_manufacturer_data(record: &ManufacturerRecord) -> Option<(String, String)> {
    match record {
        ManufacturerRecord::Raw(bytes) => {
            if bytes.len() < 2 {
                debug!("dropping {} byte manufacturer data", bytes.len());
                return None;
            }
            let (company_id, payload) = bytes.split_at(2);
            let company_id = u16::from_le_bytes([company_id[0], company_id[1]]);
            Some((company_id.to_string(), hex(payload)))
        }
        ManufacturerRecord::Keyed {
            company_id,
            payload,
        } => Some((company_id.to_string(), hex(payload))),
    }
}

pub fn decode_service_data<'a, I>(entries: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a (String, Vec<u8>)>,
{
    entries
        .into_iter()
        .map(|(uuid, data)| (normalize_uuid(uuid), hex(data)))
        .collect()
}

pub fn decode_service_uuids<'a, I>(uuids: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    uuids.into_iter().map(|uuid| normalize_uuid(uuid)).collect()
}

/// Normalize one platform scan record.
///
/// The RSSI is passed through untouched; sentinel filtering happens before
/// this is called.
pub fn decode(raw: &RawAdvertisement) -> Advertisement {
    let id = if raw.address.trim().is_empty() {
        warn!("scan record without address, using placeholder identity");
        UNKNOWN_DEVICE_ID.to_string()
    } else {
        raw.address.clone()
    };

    let display_name = [&raw.local_name, &raw.device_name]
        .into_iter()
        .flatten()
        .find(|name| !name.is_empty())
        .cloned()
        .unwrap_or_default();

    let service_uuids = decode_service_uuids(&raw.service_uuids);
    let manufacturer_data = raw
        .manufacturer_data
        .iter()
        .filter_map(decode_manufacturer_data)
        .collect();
    let service_data = decode_service_data(&raw.service_data);
    let is_eddystone = classifier::is_eddystone(&service_uuids);

    Advertisement {
        id,
        display_name,
        rssi: raw.rssi,
        tx_power: raw.tx_power.unwrap_or(0),
        connectable: raw.connectable.unwrap_or(true),
        service_uuids,
        manufacturer_data,
        service_data,
        is_eddystone,
        ranging: None,
    }
}

/// Parse an advertising (or scan response) payload of length-type-value AD
/// structures.
pub fn parse_ad_structures(address: &str, rssi: i16, payload: &[u8]) -> RawAdvertisement {
    let mut raw = RawAdvertisement::new(address, rssi);
    extend_from_ad_structures(&mut raw, payload);
    raw
}

/// Fold another payload into `raw`, e.g. the scan response following an
/// advertisement. Parsing stops at the first truncated structure; fields
/// already read are kept.
pub fn extend_from_ad_structures(raw: &mut RawAdvertisement, payload: &[u8]) {
    let mut offset = 0;
    while offset < payload.len() {
        let len = payload[offset] as usize;
        if len == 0 {
            // zero padding fills the rest of the PDU
            break;
        }
        let end = offset + 1 + len;
        if end > payload.len() {
            debug!(
                "truncated AD structure at offset {} ({} > {})",
                offset,
                end,
                payload.len()
            );
            break;
        }
        let ad_type = payload[offset + 1];
        let data = &payload[offset + 2..end];
        apply_ad_structure(raw, ad_type, data);
        offset = end;
    }
}

fn apply_ad_structure(raw: &mut RawAdvertisement, ad_type: u8, data: &[u8]) {
    match ad_type {
        ad_type::FLAGS => {}
        ad_type::INCOMPLETE_16_BIT_UUIDS | ad_type::COMPLETE_16_BIT_UUIDS => {
            raw.service_uuids.extend(
                data.chunks_exact(2)
                    .map(|c| uuid_from_short(u16::from_le_bytes([c[0], c[1]]) as u32).to_string()),
            );
        }
        ad_type::INCOMPLETE_32_BIT_UUIDS | ad_type::COMPLETE_32_BIT_UUIDS => {
            raw.service_uuids.extend(
                data.chunks_exact(4)
                    .map(|c| uuid_from_short(u32::from_le_bytes([c[0], c[1], c[2], c[3]])).to_string()),
            );
        }
        ad_type::INCOMPLETE_128_BIT_UUIDS | ad_type::COMPLETE_128_BIT_UUIDS => {
            raw.service_uuids
                .extend(data.chunks_exact(16).map(|c| uuid_from_le_slice(c).to_string()));
        }
        ad_type::SHORTENED_LOCAL_NAME => {
            if raw.local_name.is_none() {
                raw.local_name = Some(String::from_utf8_lossy(data).into_owned());
            }
        }
        ad_type::COMPLETE_LOCAL_NAME => {
            raw.local_name = Some(String::from_utf8_lossy(data).into_owned());
        }
        ad_type::TX_POWER_LEVEL => {
            if let Some(&level) = data.first() {
                raw.tx_power = Some(level as i8 as i16);
            }
        }
        ad_type::SERVICE_DATA_16_BIT_UUID if data.len() >= 2 => {
            let uuid = uuid_from_short(u16::from_le_bytes([data[0], data[1]]) as u32);
            raw.service_data.push((uuid.to_string(), data[2..].to_vec()));
        }
        ad_type::SERVICE_DATA_32_BIT_UUID if data.len() >= 4 => {
            let uuid = uuid_from_short(u32::from_le_bytes([data[0], data[1], data[2], data[3]]));
            raw.service_data.push((uuid.to_string(), data[4..].to_vec()));
        }
        ad_type::SERVICE_DATA_128_BIT_UUID if data.len() >= 16 => {
            let uuid = uuid_from_le_slice(&data[..16]);
            raw.service_data.push((uuid.to_string(), data[16..].to_vec()));
        }
        ad_type::MANUFACTURER_SPECIFIC_DATA => {
            raw.manufacturer_data
                .push(ManufacturerRecord::Raw(data.to_vec()));
        }
        other => debug!("ignoring AD type {:#04x} ({} bytes)", other, data.len()),
    }
}

// 128 bit UUIDs travel little endian over the air
fn uuid_from_le_slice(bytes: &[u8]) -> Uuid {
    let mut be = [0u8; 16];
    be.copy_from_slice(&bytes[..16]);
    be.reverse();
    Uuid::from_bytes(be)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hex_format() {
        assert_eq!(hex(&[0xfe, 0xaa]), "fe aa");
        assert_eq!(hex(&[0x00, 0x0f, 0xff]), "00 0f ff");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn test_parse_hex_rejects_malformed() {
        assert_eq!(parse_hex("fe aa"), Some(vec![0xfe, 0xaa]));
        assert_eq!(parse_hex("f eaa"), None);
        assert_eq!(parse_hex("zz"), None);
        assert_eq!(parse_hex("fe  aa"), None);
    }

    #[test]
    fn test_manufacturer_data_apple() {
        let record = ManufacturerRecord::Raw(vec![0x4c, 0x00, 0x02, 0x15, 0x01]);
        let (key, payload) = decode_manufacturer_data(&record).unwrap();
        assert_eq!(key, "76");
        assert_eq!(payload, "02 15 01");
    }

    #[test]
    fn test_manufacturer_data_only_company_id() {
        let record = ManufacturerRecord::Raw(vec![0x59, 0x00]);
        assert_eq!(
            decode_manufacturer_data(&record),
            Some(("89".to_string(), String::new()))
        );
    }

    #[test]
    fn test_manufacturer_data_keyed() {
        let record = ManufacturerRecord::Keyed {
            company_id: 0x0499,
            payload: vec![0x05, 0x12],
        };
        assert_eq!(
            decode_manufacturer_data(&record),
            Some(("1177".to_string(), "05 12".to_string()))
        );
    }

    #[test]
    fn test_normalize_uuid() {
        assert_eq!(
            normalize_uuid("0000FEAA-0000-1000-8000-00805F9B34FB"),
            "0000feaa-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(normalize_uuid("FEAA"), "0000feaa-0000-1000-8000-00805f9b34fb");
        assert_eq!(
            normalize_uuid("0000180D"),
            "0000180d-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(normalize_uuid("Not-A-Uuid"), "not-a-uuid");
    }

    #[test]
    fn test_service_uuids_collapse() {
        let uuids = vec![
            "0000FEAA-0000-1000-8000-00805F9B34FB".to_string(),
            "0000feaa-0000-1000-8000-00805f9b34fb".to_string(),
            "feaa".to_string(),
        ];
        let set = decode_service_uuids(&uuids);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_decode_defaults() {
        let raw = RawAdvertisement::new("AA:BB:CC:DD:EE:FF", -61);
        let adv = decode(&raw);
        assert_eq!(adv.id, "AA:BB:CC:DD:EE:FF");
        assert_eq!(adv.display_name, "");
        assert_eq!(adv.tx_power, 0);
        assert!(adv.connectable);
        assert!(adv.manufacturer_data.is_empty());
        assert!(!adv.is_eddystone);
        assert!(adv.ranging.is_none());
    }

    #[test]
    fn test_decode_name_fallback() {
        let mut raw = RawAdvertisement::new("11:22:33:44:55:66", -70);
        raw.local_name = Some(String::new());
        raw.device_name = Some("Thermo".to_string());
        assert_eq!(decode(&raw).display_name, "Thermo");
        raw.local_name = Some("Adv Name".to_string());
        assert_eq!(decode(&raw).display_name, "Adv Name");
    }

    #[test]
    fn test_decode_eddystone_example() {
        let mut raw = RawAdvertisement::new("00:11:22:33:44:55", -50);
        raw.service_uuids = vec!["0000FEAA-0000-1000-8000-00805F9B34FB".to_string()];
        raw.connectable = Some(false);
        raw.service_data = vec![("0000FEAA-0000-1000-8000-00805F9B34FB".to_string(), vec![0x10, 0x00])];
        let adv = decode(&raw);
        assert!(adv.is_eddystone);
        assert!(!adv.connectable);
        assert_eq!(
            adv.service_uuids.iter().collect::<Vec<_>>(),
            vec!["0000feaa-0000-1000-8000-00805f9b34fb"]
        );
        assert_eq!(
            adv.service_data.get("0000feaa-0000-1000-8000-00805f9b34fb"),
            Some(&"10 00".to_string())
        );
    }

    #[test]
    fn test_decode_missing_address() {
        let adv = decode(&RawAdvertisement::new("", -40));
        assert_eq!(adv.id, UNKNOWN_DEVICE_ID);
    }

    #[test]
    fn test_parse_ad_structures() {
        let payload = [
            0x02, 0x01, 0x06, // flags
            0x03, 0x03, 0xaa, 0xfe, // complete 16 bit uuids: FEAA
            0x05, 0x09, b'T', b'a', b'g', b'1', // complete local name
            0x02, 0x0a, 0xf4, // tx power -12
            0x05, 0x16, 0xaa, 0xfe, 0x10, 0x00, // service data FEAA
            0x05, 0xff, 0x4c, 0x00, 0x02, 0x15, // manufacturer
        ];
        let raw = parse_ad_structures("AA:AA:AA:AA:AA:AA", -55, &payload);
        assert_eq!(raw.local_name.as_deref(), Some("Tag1"));
        assert_eq!(raw.tx_power, Some(-12));
        assert_eq!(
            raw.service_uuids,
            vec!["0000feaa-0000-1000-8000-00805f9b34fb".to_string()]
        );
        assert_eq!(raw.service_data.len(), 1);
        assert_eq!(raw.service_data[0].1, vec![0x10, 0x00]);

        let adv = decode(&raw);
        assert!(adv.is_eddystone);
        assert_eq!(adv.tx_power, -12);
        assert_eq!(adv.manufacturer_data.get("76"), Some(&"02 15".to_string()));
    }

    #[test]
    fn test_parse_ad_structures_128_bit_uuid() {
        let mut payload = vec![0x11, 0x07];
        let uuid = Uuid::parse_str("6e400001-b5a3-f393-e0a9-e50e24dcca9e").unwrap();
        let mut le = *uuid.as_bytes();
        le.reverse();
        payload.extend_from_slice(&le);
        let raw = parse_ad_structures("AA", -55, &payload);
        assert_eq!(
            raw.service_uuids,
            vec!["6e400001-b5a3-f393-e0a9-e50e24dcca9e".to_string()]
        );
    }

    #[test]
    fn test_parse_ad_structures_truncated() {
        // second structure claims 9 bytes but only 2 follow
        let payload = [0x02, 0x0a, 0x04, 0x09, 0x09, b'A', b'B'];
        let raw = parse_ad_structures("AA", -55, &payload);
        assert_eq!(raw.tx_power, Some(4));
        assert_eq!(raw.local_name, None);
    }

    #[test]
    fn test_scan_response_extends_record() {
        let mut raw = parse_ad_structures("AA", -60, &[0x03, 0x08, b'T', b'g']);
        extend_from_ad_structures(&mut raw, &[0x04, 0x09, b'T', b'a', b'g']);
        assert_eq!(raw.local_name.as_deref(), Some("Tag"));
    }

    proptest! {
        #[test]
        fn prop_hex_reparses(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let text = hex(&bytes);
            prop_assert_eq!(parse_hex(&text), Some(bytes));
            prop_assert_eq!(text.to_ascii_lowercase(), text.clone());
        }

        #[test]
        fn prop_manufacturer_length_rule(bytes in proptest::collection::vec(any::<u8>(), 0..32)) {
            let decoded = decode_manufacturer_data(&ManufacturerRecord::Raw(bytes.clone()));
            if bytes.len() < 2 {
                prop_assert!(decoded.is_none());
            } else {
                let (key, payload) = decoded.unwrap();
                let company_id = u16::from_le_bytes([bytes[0], bytes[1]]);
                prop_assert_eq!(key, company_id.to_string());
                prop_assert_eq!(parse_hex(&payload), Some(bytes[2..].to_vec()));
            }
        }

        #[test]
        fn prop_ad_parser_is_total(bytes in proptest::collection::vec(any::<u8>(), 0..62)) {
            let raw = parse_ad_structures("AA:BB", -60, &bytes);
            let adv = decode(&raw);
            prop_assert_eq!(adv.id, "AA:BB");
        }
    }
}
