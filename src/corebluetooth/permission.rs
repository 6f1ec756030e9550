use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{Instant, sleep};

use crate::Result;
use crate::api::permission::{Authorization, PermissionProvider, PermissionStatus};
use crate::corebluetooth::central_manager::CentralLink;
use crate::corebluetooth::objc_bindings;

const PROMPT_POLL: Duration = Duration::from_millis(250);
const PROMPT_TIMEOUT: Duration = Duration::from_secs(60);

fn current_status() -> PermissionStatus {
    // macOS has no separate location grant for scanning
    PermissionStatus::new(objc_bindings::authorization(), Authorization::Granted)
}

/// Bluetooth authorization as reported by `CBManager`.
#[derive(Debug)]
pub struct CoreBluetoothPermissions {
    link: CentralLink,
    status: watch::Sender<PermissionStatus>,
}

impl CoreBluetoothPermissions {
    pub(crate) fn new(link: CentralLink) -> Self {
        let (status, _) = watch::channel(current_status());
        Self { link, status }
    }

    fn refresh(&self) -> PermissionStatus {
        let status = current_status();
        self.status.send_if_modified(|previous| {
            let changed = *previous != status;
            *previous = status;
            changed
        });
        status
    }
}

#[async_trait]
impl PermissionProvider for CoreBluetoothPermissions {
    fn status(&self) -> PermissionStatus {
        self.refresh()
    }

    fn has_host_context(&self) -> bool {
        true
    }

    // The system asks the user as soon as a central manager exists; the
    // answer is polled for since no callback reports it directly.
    async fn prompt(&self) -> Result<PermissionStatus> {
        self.link.connect();
        let deadline = Instant::now() + PROMPT_TIMEOUT;
        let mut status = self.refresh();
        while !status.is_determined() && Instant::now() < deadline {
            sleep(PROMPT_POLL).await;
            status = self.refresh();
        }
        Ok(status)
    }

    fn subscribe(&self) -> watch::Receiver<PermissionStatus> {
        self.refresh();
        self.status.subscribe()
    }
}
