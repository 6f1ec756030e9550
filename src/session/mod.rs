//! Scan session state machine
//!
//! [`ScanSession`] owns the radio provider and every piece of mutable scan
//! state. It is driven from a single task (see [`spawn_session`]) so radio
//! callbacks and host commands never race on it.

mod handle;

pub use handle::{SessionCommand, SessionHandle, spawn_session, spawn_session_with_permissions};

use log::{debug, info, trace, warn};
use tokio::sync::{mpsc::Sender, oneshot};
use tokio::time::Instant;

use crate::api::advertisement::{RangingReport, RawAdvertisement};
use crate::api::permission::PermissionStatus;
use crate::api::radio::{RadioProvider, RadioState, ScanFilter};
use crate::api::radio_event::{RadioEvent, ScanEvent, ScanFailure};
use crate::config::SessionConfig;
use crate::merger::ObservationCache;
use crate::{Error, Result, classifier, decoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// A start request is queued until the radio powers on
    AwaitingRadioReady,
    Active,
    Stopping,
}

#[derive(Debug)]
struct PendingStart {
    filter: ScanFilter,
    responder: oneshot::Sender<Result<bool>>,
    deadline: Instant,
    /// A running scan was torn down to make room for this request
    replaces_active: bool,
}

pub struct ScanSession<R: RadioProvider> {
    radio: R,
    config: SessionConfig,
    state: SessionState,
    pending: Option<PendingStart>,
    active_filter: ScanFilter,
    observations: ObservationCache,
    events: Sender<ScanEvent>,
}

impl<R: RadioProvider> ScanSession<R> {
    /// The session stays inert until the first start request; the radio is
    /// not touched before that.
    pub fn new(radio: R, config: SessionConfig, events: Sender<ScanEvent>) -> Self {
        Self {
            radio,
            config,
            state: SessionState::Idle,
            pending: None,
            active_filter: ScanFilter::default(),
            observations: ObservationCache::new(),
            events,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn active_filter(&self) -> &ScanFilter {
        &self.active_filter
    }

    pub fn pending_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    pub fn observations(&self) -> &ObservationCache {
        &self.observations
    }

    /// Start (or restart) scanning. `responder` is answered once the scan is
    /// active or the request has failed, which may be after the radio
    /// finishes powering on.
    ///
    /// A restart tears the running scan down without `ScanStopped`; the event
    /// is only emitted if the new request does not end up active.
    pub async fn start(&mut self, filter: ScanFilter, responder: oneshot::Sender<Result<bool>>) {
        let mut replaces_active = false;
        if let Some(pending) = self.pending.take() {
            debug!("start request superseded by a newer one");
            replaces_active = pending.replaces_active;
            let _ = pending.responder.send(Err(Error::Cancelled));
            self.state = SessionState::Idle;
        }
        if self.state == SessionState::Active {
            debug!("restarting active scan");
            self.teardown().await;
            self.state = SessionState::Idle;
            replaces_active = true;
        }

        if let Err(e) = self.radio.ensure_radio_ready().await {
            warn!("radio could not be initialized: {}", e);
            self.finish_start(responder, Err(e), replaces_active).await;
            return;
        }

        let radio_state = match self.radio.radio_state().await {
            Ok(radio_state) => radio_state,
            Err(e) => {
                self.finish_start(responder, Err(e), replaces_active).await;
                return;
            }
        };

        match radio_state {
            RadioState::PoweredOn => {
                let result = self.activate(filter).await;
                self.finish_start(responder, result, replaces_active).await;
            }
            RadioState::Unknown | RadioState::Resetting | RadioState::PoweredOff => {
                debug!(
                    "radio is {:?}, waiting up to {:?} for it to power on",
                    radio_state, self.config.readiness_timeout
                );
                self.pending = Some(PendingStart {
                    filter,
                    responder,
                    deadline: Instant::now() + self.config.readiness_timeout,
                    replaces_active,
                });
                self.state = SessionState::AwaitingRadioReady;
            }
            other => {
                let error = other.as_error().unwrap_or(Error::RadioUnavailable);
                info!("cannot start scan, radio is {:?}", other);
                self.finish_start(responder, Err(error), replaces_active).await;
            }
        }
    }

    /// `Ok(true)` if a running scan was stopped, `Ok(false)` if there was
    /// nothing to stop.
    pub async fn stop(&mut self) -> Result<bool> {
        match self.state {
            SessionState::Active => {
                self.state = SessionState::Stopping;
                self.teardown().await;
                self.state = SessionState::Idle;
                self.emit(ScanEvent::ScanStopped).await;
                Ok(true)
            }
            SessionState::AwaitingRadioReady => {
                self.cancel_pending(Error::Cancelled).await;
                Ok(false)
            }
            SessionState::Idle | SessionState::Stopping => Ok(false),
        }
    }

    /// Fail the queued start request once its deadline has passed.
    pub async fn expire_pending(&mut self) {
        let expired = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.deadline <= Instant::now());
        if expired {
            info!(
                "radio not ready after {:?}, giving up",
                self.config.readiness_timeout
            );
            self.cancel_pending(Error::ReadinessTimeout(self.config.readiness_timeout))
                .await;
        }
    }

    pub async fn handle_radio_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::StateUpdate { state } => self.on_radio_state(state).await,
            RadioEvent::DeviceDiscovered { advertisement } => {
                self.on_advertisement(advertisement).await
            }
            RadioEvent::BatchDiscovered { advertisements } => {
                for advertisement in advertisements {
                    self.on_advertisement(advertisement).await;
                }
            }
            RadioEvent::BeaconsRanged { reports } => {
                for report in reports {
                    self.on_ranging_report(report).await;
                }
            }
            RadioEvent::ScanFailed { failure } => self.on_scan_failed(failure).await,
        }
    }

    /// React to a change of the radio or location grant. A revoked grant
    /// ends the scan; a new grant lets a queued start proceed if the radio
    /// is already powered on.
    pub async fn handle_permission_status(&mut self, status: PermissionStatus) {
        debug!("permission status {:?} while {:?}", status, self.state);
        if status.is_granted() {
            if self.state == SessionState::AwaitingRadioReady {
                match self.radio.radio_state().await {
                    Ok(radio_state) if radio_state.is_ready() => self.resume_pending().await,
                    Ok(_) => {}
                    Err(e) => warn!("could not read radio state: {}", e),
                }
            }
            return;
        }
        if !status.is_determined() {
            return;
        }
        match self.state {
            SessionState::Active => {
                info!("permission revoked, scan stopped");
                self.teardown().await;
                self.state = SessionState::Idle;
                self.emit(ScanEvent::ScanStopped).await;
            }
            SessionState::AwaitingRadioReady => {
                self.cancel_pending(Error::RadioUnauthorized).await;
            }
            SessionState::Idle | SessionState::Stopping => {}
        }
    }

    /// Stop everything and fail whatever is still pending. Used when the
    /// session task ends.
    pub async fn shutdown(&mut self) {
        self.cancel_pending(Error::SessionClosed).await;
        if self.state == SessionState::Active {
            self.teardown().await;
            self.state = SessionState::Idle;
            self.emit(ScanEvent::ScanStopped).await;
        }
    }

    async fn on_radio_state(&mut self, radio_state: RadioState) {
        debug!("radio state {:?} while {:?}", radio_state, self.state);
        match self.state {
            SessionState::AwaitingRadioReady => {
                if radio_state.is_ready() {
                    self.resume_pending().await;
                } else if let Some(error) = radio_state.as_error() {
                    self.cancel_pending(error).await;
                }
            }
            SessionState::Active if !radio_state.is_ready() => {
                info!("radio went {:?}, scan stopped", radio_state);
                if self.active_filter.is_ranging() {
                    if let Err(e) = self.radio.stop_ranging().await {
                        warn!("could not stop ranging: {}", e);
                    }
                }
                self.active_filter = ScanFilter::default();
                self.state = SessionState::Idle;
                self.emit(ScanEvent::ScanStopped).await;
            }
            _ => {}
        }
    }

    async fn on_advertisement(&mut self, raw: RawAdvertisement) {
        if self.state != SessionState::Active {
            trace!("discarding advertisement from {} while {:?}", raw.address, self.state);
            return;
        }
        if !self.config.rssi.accepts(raw.rssi) {
            trace!("discarding {} with rssi {}", raw.address, raw.rssi);
            return;
        }
        let advertisement = self.observations.observe(decoder::decode(&raw));
        self.emit(ScanEvent::DeviceFound { advertisement }).await;
    }

    async fn on_ranging_report(&mut self, report: RangingReport) {
        if self.state != SessionState::Active {
            trace!("discarding ranging report for {} while {:?}", report.uuid, self.state);
            return;
        }
        if !self.config.rssi.accepts(report.rssi) {
            trace!("discarding ranging report with rssi {}", report.rssi);
            return;
        }
        let synthesized = classifier::synthesize(&report, self.config.ibeacon_tx_placeholder);
        let advertisement = self.observations.observe(synthesized);
        self.emit(ScanEvent::DeviceFound { advertisement }).await;
    }

    async fn on_scan_failed(&mut self, failure: ScanFailure) {
        if self.state != SessionState::Active {
            debug!("ignoring scan failure {:?} while {:?}", failure, self.state);
            return;
        }
        warn!("scan failed: {}", failure.message());
        if self.active_filter.is_ranging() {
            if let Err(e) = self.radio.stop_ranging().await {
                warn!("could not stop ranging: {}", e);
            }
        }
        self.active_filter = ScanFilter::default();
        self.state = SessionState::Idle;
        self.emit(ScanEvent::ScanError {
            error: failure.message(),
        })
        .await;
    }

    async fn resume_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            let result = self.activate(pending.filter).await;
            self.finish_start(pending.responder, result, pending.replaces_active)
                .await;
        }
    }

    /// Answer a start request. A failed restart reports the scan it replaced
    /// as stopped first.
    async fn finish_start(
        &mut self,
        responder: oneshot::Sender<Result<bool>>,
        result: Result<bool>,
        replaces_active: bool,
    ) {
        if result.is_err() && replaces_active {
            self.emit(ScanEvent::ScanStopped).await;
        }
        let _ = responder.send(result);
    }

    async fn activate(&mut self, filter: ScanFilter) -> Result<bool> {
        if self.config.reset_cache_on_start {
            self.observations.clear();
        }
        if let Err(e) = self.radio.start_observation().await {
            self.state = SessionState::Idle;
            return Err(e);
        }
        if filter.is_ranging() {
            if let Err(e) = self.radio.start_ranging(&filter.identity_constraints).await {
                if let Err(stop_error) = self.radio.stop_observation().await {
                    warn!("could not stop observation: {}", stop_error);
                }
                self.state = SessionState::Idle;
                return Err(e);
            }
        }
        info!(
            "scan started ({} identity constraints)",
            filter.identity_constraints.len()
        );
        self.active_filter = filter;
        self.state = SessionState::Active;
        self.emit(ScanEvent::ScanStarted).await;
        Ok(true)
    }

    // Best effort; the session is considered stopped whatever the radio says.
    async fn teardown(&mut self) {
        if self.active_filter.is_ranging() {
            if let Err(e) = self.radio.stop_ranging().await {
                warn!("could not stop ranging: {}", e);
            }
        }
        if let Err(e) = self.radio.stop_observation().await {
            warn!("could not stop observation: {}", e);
        }
        self.active_filter = ScanFilter::default();
    }

    async fn cancel_pending(&mut self, error: Error) {
        if self.state == SessionState::AwaitingRadioReady {
            self.state = SessionState::Idle;
        }
        if let Some(pending) = self.pending.take() {
            debug!("failing queued start request: {}", error);
            self.finish_start(pending.responder, Err(error), pending.replaces_active)
                .await;
        }
    }

    async fn emit(&mut self, event: ScanEvent) {
        if let Err(e) = self.events.send(event).await {
            log::error!("Error sending scan event: {}", e);
        }
    }
}
