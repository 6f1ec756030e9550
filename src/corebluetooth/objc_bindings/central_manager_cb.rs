use super::central_manager_delegate_cb::CentralManagerDelegate;
use super::mac_extensions_cb::convert_state;
use super::mac_utils_cb;
use crate::api::radio::RadioState;
use crate::api::radio_event::RadioEvent;
use crate::{Error, Result};
use objc2::{AnyThread, msg_send};
use objc2::{rc::Retained, runtime::AnyObject};
use objc2_core_bluetooth::{CBCentralManager, CBCentralManagerScanOptionAllowDuplicatesKey};
use objc2_foundation::{NSDictionary, NSNumber, NSString};
use std::sync::OnceLock;
use std::thread;
use tokio::runtime;
use tokio::sync::{
    mpsc::{Receiver, Sender},
    oneshot,
};

#[derive(Debug)]
pub enum ManagerCommand {
    GetState {
        responder: oneshot::Sender<RadioState>,
    },
    StartScanning {
        responder: oneshot::Sender<Result<()>>,
    },
    StopScanning {
        responder: oneshot::Sender<Result<()>>,
    },
}

static CENTRAL_THREAD: OnceLock<()> = OnceLock::new();

// CBCentralManager and its delegate live on their own thread for the life of
// the process. Only the first caller gets to attach its channels.
pub fn run_central_thread(sender: Sender<RadioEvent>, listener: Receiver<ManagerCommand>) {
    CENTRAL_THREAD.get_or_init(|| {
        thread::spawn(move || {
            let runtime = match runtime::Builder::new_current_thread().enable_time().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    log::error!("Failed to create runtime: {}", e);
                    return;
                }
            };
            runtime.block_on(async move {
                let mut central_manager = CentralManager::new(sender, listener);
                while central_manager.handle_command().await {}
                log::debug!("central manager command channel closed");
                central_manager.stop_scanning();
            })
        });
    });
}

#[derive(Debug)]
struct CentralManager {
    manager: Retained<CBCentralManager>,
    _delegate: Retained<CentralManagerDelegate>,
    command_rx: Receiver<ManagerCommand>,
}

impl CentralManager {
    // Creating the manager is what triggers the system permission prompt.
    fn new(radio_tx: Sender<RadioEvent>, command_rx: Receiver<ManagerCommand>) -> Self {
        let delegate: Retained<CentralManagerDelegate> = CentralManagerDelegate::new(radio_tx);

        let queue = unsafe {
            mac_utils_cb::dispatch_queue_create(
                c"rustybeacon.central".as_ptr(),
                mac_utils_cb::DISPATCH_QUEUE_SERIAL,
            )
        };
        let queue: *mut AnyObject = queue.cast();

        let manager: Retained<CBCentralManager> = unsafe {
            msg_send![CBCentralManager::alloc(), initWithDelegate: &*delegate, queue: queue]
        };

        Self {
            manager,
            _delegate: delegate,
            command_rx,
        }
    }

    /// False once every sender is gone.
    async fn handle_command(&mut self) -> bool {
        let Some(command) = self.command_rx.recv().await else {
            return false;
        };
        match command {
            ManagerCommand::GetState { responder } => {
                let _ = responder.send(self.state());
            }
            ManagerCommand::StartScanning { responder } => {
                let _ = responder.send(self.start_scanning());
            }
            ManagerCommand::StopScanning { responder } => {
                self.stop_scanning();
                let _ = responder.send(Ok(()));
            }
        }
        true
    }

    fn state(&self) -> RadioState {
        convert_state(unsafe { self.manager.state() })
    }

    fn start_scanning(&self) -> Result<()> {
        let state = self.state();
        if !state.is_ready() {
            return Err(state.as_error().unwrap_or(Error::RadioUnavailable));
        }

        // every sighting is reported, not only the first one per peripheral
        let keys: [&NSString; 1] = [unsafe { CBCentralManagerScanOptionAllowDuplicatesKey }];
        let objects: [Retained<AnyObject>; 1] =
            [unsafe { Retained::cast_unchecked(NSNumber::new_bool(true)) }];
        let options: Retained<NSDictionary<NSString, AnyObject>> =
            NSDictionary::from_retained_objects(&keys, &objects);

        unsafe {
            self.manager
                .scanForPeripheralsWithServices_options(None, Some(&options));
        }
        log::debug!("CoreBluetooth scan started");
        Ok(())
    }

    fn stop_scanning(&self) {
        unsafe {
            if self.manager.isScanning() {
                self.manager.stopScan();
            }
        }
    }
}
