#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rustybeacon::api::advertisement::{Proximity, RangingReport, RawAdvertisement};
use rustybeacon::api::permission::PermissionStatus;
use rustybeacon::api::radio::{RadioProvider, RadioState};
use rustybeacon::api::radio_event::{RadioEvent, ScanEvent};
use rustybeacon::config::SessionConfig;
use rustybeacon::session::{SessionHandle, spawn_session_with_permissions};
use rustybeacon::{Error, Result};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::watch;

pub const BEACON_UUID: &str = "e2c56db5-dffb-48d2-b060-d0f5a71096e0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    EnsureReady,
    StartObservation,
    StopObservation,
    StartRanging(Vec<String>),
    StopRanging,
}

#[derive(Debug)]
struct FakeRadioInner {
    state: RadioState,
    calls: Vec<RadioCall>,
    ready_error: Option<Error>,
    observation_error: Option<Error>,
}

/// Radio whose state is set by the test; records every command it receives.
#[derive(Debug, Clone)]
pub struct FakeRadio {
    inner: Arc<Mutex<FakeRadioInner>>,
}

impl FakeRadio {
    pub fn new(state: RadioState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeRadioInner {
                state,
                calls: Vec::new(),
                ready_error: None,
                observation_error: None,
            })),
        }
    }

    pub fn set_state(&self, state: RadioState) {
        self.inner.lock().unwrap().state = state;
    }

    pub fn fail_ready_with(&self, error: Error) {
        self.inner.lock().unwrap().ready_error = Some(error);
    }

    pub fn fail_observation_with(&self, error: Error) {
        self.inner.lock().unwrap().observation_error = Some(error);
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &RadioCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: RadioCall) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl RadioProvider for FakeRadio {
    async fn ensure_radio_ready(&mut self) -> Result<()> {
        self.record(RadioCall::EnsureReady);
        match self.inner.lock().unwrap().ready_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn radio_state(&mut self) -> Result<RadioState> {
        Ok(self.inner.lock().unwrap().state)
    }

    async fn start_observation(&mut self) -> Result<()> {
        self.record(RadioCall::StartObservation);
        match self.inner.lock().unwrap().observation_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn stop_observation(&mut self) -> Result<()> {
        self.record(RadioCall::StopObservation);
        Ok(())
    }

    async fn start_ranging(&mut self, constraints: &[String]) -> Result<()> {
        self.record(RadioCall::StartRanging(constraints.to_vec()));
        Ok(())
    }

    async fn stop_ranging(&mut self) -> Result<()> {
        self.record(RadioCall::StopRanging);
        Ok(())
    }
}

pub struct Harness {
    pub radio: FakeRadio,
    pub radio_tx: Sender<RadioEvent>,
    pub permissions: watch::Sender<PermissionStatus>,
    pub handle: SessionHandle,
    pub events: Receiver<ScanEvent>,
}

impl Harness {
    pub fn new(state: RadioState) -> Self {
        Self::with_config(state, SessionConfig::default())
    }

    pub fn with_config(state: RadioState, config: SessionConfig) -> Self {
        let radio = FakeRadio::new(state);
        let (radio_tx, radio_rx) = mpsc::channel(64);
        let (permissions, permission_rx) = watch::channel(PermissionStatus::granted());
        let (handle, events) =
            spawn_session_with_permissions(radio.clone(), radio_rx, permission_rx, config)
                .unwrap();
        Self {
            radio,
            radio_tx,
            permissions,
            handle,
            events,
        }
    }

    /// Deliver a radio callback and wait until the session has handled it.
    pub async fn radio_event(&self, event: RadioEvent) {
        self.radio_tx.send(event).await.unwrap();
        self.handle.state().await.unwrap();
    }

    /// Publish a grant change and wait until the session has handled it.
    pub async fn permission(&self, status: PermissionStatus) {
        self.permissions.send(status).unwrap();
        self.handle.state().await.unwrap();
    }

    pub async fn power(&self, state: RadioState) {
        self.radio.set_state(state);
        self.radio_event(RadioEvent::StateUpdate { state }).await;
    }

    pub async fn next_event(&mut self) -> ScanEvent {
        tokio::time::timeout(Duration::from_secs(1), self.events.recv())
            .await
            .expect("timed out waiting for scan event")
            .expect("event channel closed")
    }

    /// Everything emitted so far, without waiting.
    pub fn drain(&mut self) -> Vec<ScanEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

pub fn sighting(address: &str, rssi: i16) -> RawAdvertisement {
    RawAdvertisement::new(address, rssi)
}

pub fn ranging_report(major: u16, minor: u16, rssi: i16) -> RangingReport {
    RangingReport {
        uuid: BEACON_UUID.to_string(),
        major,
        minor,
        rssi,
        accuracy: 2.5,
        proximity: Proximity::Near,
    }
}

pub fn found_ids(events: &[ScanEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            ScanEvent::DeviceFound { advertisement } => Some(advertisement.id.clone()),
            _ => None,
        })
        .collect()
}
