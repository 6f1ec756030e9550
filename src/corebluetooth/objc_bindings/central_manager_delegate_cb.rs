use crate::api::advertisement::{ManufacturerRecord, RawAdvertisement};
use crate::api::radio_event::RadioEvent;
use crate::corebluetooth::objc_bindings::mac_extensions_cb::{
    cbuuid_to_string, convert_state, nsuuid_to_string, object_for,
};

use futures::executor;
use log::trace;
use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2::{AnyThread, DeclaredClass, define_class, msg_send};
use objc2_core_bluetooth::{
    CBAdvertisementDataIsConnectable, CBAdvertisementDataLocalNameKey,
    CBAdvertisementDataManufacturerDataKey, CBAdvertisementDataOverflowServiceUUIDsKey,
    CBAdvertisementDataServiceDataKey, CBAdvertisementDataServiceUUIDsKey,
    CBAdvertisementDataTxPowerLevelKey, CBCentralManager, CBCentralManagerDelegate, CBPeripheral,
    CBUUID,
};
use objc2_foundation::{
    NSArray, NSData, NSDictionary, NSNumber, NSObject, NSObjectProtocol, NSString,
};
use tokio::sync::mpsc::Sender;

// Instance Variables that are stored within the ObjC class allowing communication between Rust
// code and the ObjC class.
#[derive(Debug)]
pub struct IVars {
    pub sender: Sender<RadioEvent>,
}

define_class!(
    #[derive(Debug)]
    #[unsafe(super(NSObject))]
    #[thread_kind = AnyThread]
    #[name = "RustyBeaconCentralManagerDelegate"]
    #[ivars = IVars]
    pub struct CentralManagerDelegate;

    unsafe impl NSObjectProtocol for CentralManagerDelegate {}

    unsafe impl CBCentralManagerDelegate for CentralManagerDelegate {
        #[unsafe(method(centralManagerDidUpdateState:))]
        fn delegate_centralmanagerdidupdatestate(&self, central: &CBCentralManager) {
            trace!("delegate_centralmanagerdidupdatestate");
            let state = convert_state(unsafe { central.state() });
            self.send_event(RadioEvent::StateUpdate { state });
        }

        #[unsafe(method(centralManager:didDiscoverPeripheral:advertisementData:RSSI:))]
        fn delegate_centralmanager_diddiscoverperipheral_advertisementdata_rssi(
            &self,
            _central: &CBCentralManager,
            peripheral: &CBPeripheral,
            adv_data: &NSDictionary<NSString, AnyObject>,
            rssi: &NSNumber,
        ) {
            trace!(
                "delegate_centralmanager_diddiscoverperipheral_advertisementdata_rssi {}",
                peripheral_debug(peripheral)
            );
            let advertisement = raw_advertisement(peripheral, adv_data, rssi);
            self.send_event(RadioEvent::DeviceDiscovered { advertisement });
        }
    }
);

impl CentralManagerDelegate {
    pub fn new(sender: Sender<RadioEvent>) -> Retained<Self> {
        let this = CentralManagerDelegate::alloc().set_ivars(IVars { sender });
        unsafe { msg_send![super(this), init] }
    }

    // Callbacks arrive on the serial CoreBluetooth queue, blocking it keeps
    // them in order.
    fn send_event(&self, event: RadioEvent) {
        let sender = self.ivars().sender.clone();
        executor::block_on(async {
            if let Err(e) = sender.send(event).await {
                log::error!("Error sending delegate event: {}", e);
            }
        });
    }
}

fn raw_advertisement(
    peripheral: &CBPeripheral,
    adv_data: &NSDictionary<NSString, AnyObject>,
    rssi: &NSNumber,
) -> RawAdvertisement {
    let address = nsuuid_to_string(&unsafe { peripheral.identifier() });
    let mut raw = RawAdvertisement::new(address, rssi.as_i16());
    raw.device_name = unsafe { peripheral.name() }.map(|name| name.to_string());

    unsafe {
        raw.local_name = object_for::<NSString>(adv_data, CBAdvertisementDataLocalNameKey)
            .map(|name| name.to_string());
        raw.tx_power = object_for::<NSNumber>(adv_data, CBAdvertisementDataTxPowerLevelKey)
            .map(|level| level.as_i16());
        raw.connectable = object_for::<NSNumber>(adv_data, CBAdvertisementDataIsConnectable)
            .map(|connectable| connectable.as_bool());

        if let Some(data) = object_for::<NSData>(adv_data, CBAdvertisementDataManufacturerDataKey)
        {
            raw.manufacturer_data
                .push(ManufacturerRecord::Raw(data.to_vec()));
        }

        if let Some(service_data) = adv_data.objectForKey(CBAdvertisementDataServiceDataKey) {
            // SAFETY: service_data is `NSDictionary<CBUUID, NSData>`
            let service_data: *const AnyObject = Retained::as_ptr(&service_data);
            let service_data: *const NSDictionary<CBUUID, NSData> = service_data.cast();
            let service_data: &NSDictionary<CBUUID, NSData> = &*service_data;

            for uuid in service_data.allKeys().iter() {
                if let Some(data) = service_data.objectForKey(&uuid) {
                    raw.service_data
                        .push((cbuuid_to_string(&uuid), data.to_vec()));
                }
            }
        }

        for key in [
            CBAdvertisementDataServiceUUIDsKey,
            CBAdvertisementDataOverflowServiceUUIDsKey,
        ] {
            if let Some(services) = adv_data.objectForKey(key) {
                // SAFETY: services is `NSArray<CBUUID>`
                let services: *const AnyObject = Retained::as_ptr(&services);
                let services: *const NSArray<CBUUID> = services.cast();
                let services: &NSArray<CBUUID> = &*services;
                raw.service_uuids
                    .extend(services.iter().map(|uuid| cbuuid_to_string(&uuid)));
            }
        }
    }
    raw
}

fn peripheral_debug(peripheral: &CBPeripheral) -> String {
    let uuid = unsafe { peripheral.identifier() }.UUIDString();
    if let Some(name) = unsafe { peripheral.name() } {
        format!("CBPeripheral({}, {})", name, uuid)
    } else {
        format!("CBPeripheral({})", uuid)
    }
}
