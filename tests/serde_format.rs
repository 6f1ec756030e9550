#![cfg(feature = "serde")]

use rustybeacon::api::advertisement::{Proximity, RangingReport, RawAdvertisement};
use rustybeacon::classifier::synthesize;
use rustybeacon::config::{DEFAULT_IBEACON_TX_PLACEHOLDER, SessionConfig};
use rustybeacon::decoder::decode;
use serde_json::json;

#[test]
fn test_advertisement_wire_fields() {
    let mut raw = RawAdvertisement::new("AA:BB:CC:DD:EE:FF", -48);
    raw.local_name = Some("Tag".to_string());
    raw.service_uuids = vec!["FEAA".to_string()];

    let value = serde_json::to_value(decode(&raw)).unwrap();
    assert_eq!(
        value,
        json!({
            "id": "AA:BB:CC:DD:EE:FF",
            "displayName": "Tag",
            "rssi": -48,
            "txPower": 0,
            "connectable": true,
            "serviceUuids": ["0000feaa-0000-1000-8000-00805f9b34fb"],
            "manufacturerData": {},
            "serviceData": {},
            "isEddystone": true,
        })
    );
}

#[test]
fn test_ranged_advertisement_flattens_ranging_fields() {
    let report = RangingReport {
        uuid: "e2c56db5-dffb-48d2-b060-d0f5a71096e0".to_string(),
        major: 1,
        minor: 2,
        rssi: -71,
        accuracy: 3.5,
        proximity: Proximity::Far,
    };
    let value = serde_json::to_value(synthesize(&report, DEFAULT_IBEACON_TX_PLACEHOLDER)).unwrap();
    assert_eq!(value["accuracy"], json!(3.5));
    assert_eq!(value["proximity"], json!("far"));
    assert_eq!(value["id"], json!("e2c56db5-dffb-48d2-b060-d0f5a71096e0-1-2"));
    assert!(value.get("ranging").is_none());
}

#[test]
fn test_session_config_from_json() {
    let config = SessionConfig::default();
    let text = serde_json::to_string(&config).unwrap();
    let parsed: SessionConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
