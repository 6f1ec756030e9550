use objc2::DowncastTarget;
use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2_core_bluetooth::{CBManager, CBManagerAuthorization, CBManagerState, CBUUID};
use objc2_foundation::{NSDictionary, NSString, NSUUID};

use crate::api::permission::Authorization;
use crate::api::radio::RadioState;

pub fn nsuuid_to_string(uuid: &NSUUID) -> String {
    uuid.UUIDString().to_string()
}

/// CoreBluetooth hands out short forms (`"FEAA"`) for assigned numbers.
pub fn cbuuid_to_string(uuid: &CBUUID) -> String {
    unsafe { uuid.UUIDString() }.to_string()
}

/// Typed lookup in an advertisement data dictionary; `None` when the key is
/// missing or holds something else.
pub fn object_for<T: DowncastTarget>(
    dict: &NSDictionary<NSString, AnyObject>,
    key: &NSString,
) -> Option<Retained<T>> {
    dict.objectForKey(key)?.downcast::<T>().ok()
}

pub fn convert_state(cb_state: CBManagerState) -> RadioState {
    match cb_state {
        CBManagerState::Unknown => RadioState::Unknown,
        CBManagerState::Resetting => RadioState::Resetting,
        CBManagerState::Unsupported => RadioState::Unsupported,
        CBManagerState::Unauthorized => RadioState::Unauthorized,
        CBManagerState::PoweredOff => RadioState::PoweredOff,
        CBManagerState::PoweredOn => RadioState::PoweredOn,
        _ => {
            log::warn!("Unexpected CBManagerState value, treating as Unknown");
            RadioState::Unknown
        }
    }
}

pub fn authorization() -> Authorization {
    let authorization = unsafe { CBManager::authorization_class() };
    if authorization == CBManagerAuthorization::AllowedAlways {
        Authorization::Granted
    } else if authorization == CBManagerAuthorization::Denied {
        Authorization::Denied
    } else if authorization == CBManagerAuthorization::Restricted {
        Authorization::Restricted
    } else {
        Authorization::NotDetermined
    }
}
