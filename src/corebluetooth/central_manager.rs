use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::mpsc::{self, Sender};
use tokio::sync::oneshot;

use crate::{
    Error, Result,
    api::{radio::RadioProvider, radio::RadioState, radio_event::RadioEvent},
    corebluetooth::objc_bindings::central_manager_cb::{ManagerCommand, run_central_thread},
    corebluetooth::permission::CoreBluetoothPermissions,
};

const COMMAND_BUFFER: usize = 16;

/// Lazily started connection to the CoreBluetooth thread.
#[derive(Debug, Clone)]
pub(crate) struct CentralLink {
    radio_tx: Sender<RadioEvent>,
    manager_tx: Arc<OnceLock<Sender<ManagerCommand>>>,
}

impl CentralLink {
    pub(crate) fn connect(&self) -> &Sender<ManagerCommand> {
        self.manager_tx.get_or_init(|| {
            debug!("starting CoreBluetooth central");
            let (manager_tx, manager_rx) = mpsc::channel(COMMAND_BUFFER);
            run_central_thread(self.radio_tx.clone(), manager_rx);
            manager_tx
        })
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.manager_tx.get().is_some()
    }
}

/// [`RadioProvider`] backed by `CBCentralManager`.
///
/// Only one central is created per process; a second radio shares nothing
/// with the first and its commands fail with [`Error::SessionClosed`].
pub struct CoreBluetoothRadio {
    link: CentralLink,
}

impl CoreBluetoothRadio {
    /// Sightings and state changes are reported into `radio_tx`. Nothing is
    /// created until the first start request.
    pub fn new(radio_tx: Sender<RadioEvent>) -> Self {
        Self {
            link: CentralLink {
                radio_tx,
                manager_tx: Arc::new(OnceLock::new()),
            },
        }
    }

    pub fn permissions(&self) -> CoreBluetoothPermissions {
        CoreBluetoothPermissions::new(self.link.clone())
    }

    async fn send_command<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> ManagerCommand,
    ) -> Result<T> {
        let (responder, response) = oneshot::channel();
        self.link.connect().send(command(responder)).await?;
        Ok(response.await?)
    }
}

#[async_trait]
impl RadioProvider for CoreBluetoothRadio {
    async fn ensure_radio_ready(&mut self) -> Result<()> {
        self.link.connect();
        Ok(())
    }

    async fn radio_state(&mut self) -> Result<RadioState> {
        self.send_command(|responder| ManagerCommand::GetState { responder })
            .await
    }

    async fn start_observation(&mut self) -> Result<()> {
        self.send_command(|responder| ManagerCommand::StartScanning { responder })
            .await?
    }

    async fn stop_observation(&mut self) -> Result<()> {
        if !self.link.is_connected() {
            return Ok(());
        }
        self.send_command(|responder| ManagerCommand::StopScanning { responder })
            .await?
    }

    async fn start_ranging(&mut self, constraints: &[String]) -> Result<()> {
        warn!(
            "beacon ranging is not available on macOS ({} constraints ignored)",
            constraints.len()
        );
        Err(Error::RadioUnsupported)
    }

    async fn stop_ranging(&mut self) -> Result<()> {
        Ok(())
    }
}
