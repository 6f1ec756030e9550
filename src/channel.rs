//! Host method surface
//!
//! The host application talks to the scanner with four named methods and
//! receives [`ScanEvent`](crate::api::radio_event::ScanEvent)s back under the
//! names returned by `ScanEvent::method_name`. The transport carrying these
//! calls lives outside this crate.

use log::debug;
use tokio::sync::mpsc::Receiver;

use crate::api::permission::{PermissionProvider, request_permissions};
use crate::api::radio::{RadioProvider, ScanFilter};
use crate::api::radio_event::{RadioEvent, ScanEvent};
use crate::config::SessionConfig;
use crate::session::{SessionHandle, spawn_session_with_permissions};
use crate::{Error, Result};

pub const CHANNEL_NAME: &str = "native_ble_scanner";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodCall {
    StartScan { filter: ScanFilter },
    StopScan,
    CheckPermissions,
    RequestPermissions,
}

impl MethodCall {
    /// `None` for a method this channel does not implement.
    pub fn parse(method: &str, identity_constraints: Option<Vec<String>>) -> Option<Self> {
        match method {
            "startScan" => Some(MethodCall::StartScan {
                filter: ScanFilter {
                    identity_constraints: identity_constraints.unwrap_or_default(),
                },
            }),
            "stopScan" => Some(MethodCall::StopScan),
            "checkPermissions" => Some(MethodCall::CheckPermissions),
            "requestPermissions" => Some(MethodCall::RequestPermissions),
            _ => None,
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            MethodCall::StartScan { .. } => "startScan",
            MethodCall::StopScan => "stopScan",
            MethodCall::CheckPermissions => "checkPermissions",
            MethodCall::RequestPermissions => "requestPermissions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodResponse {
    Success(bool),
    Error { code: String, message: String },
    NotImplemented,
}

impl From<Result<bool>> for MethodResponse {
    fn from(result: Result<bool>) -> Self {
        match result {
            Ok(value) => MethodResponse::Success(value),
            Err(error) => MethodResponse::Error {
                code: error.code().to_string(),
                message: error.to_string(),
            },
        }
    }
}

pub struct ScanChannel<P: PermissionProvider> {
    session: SessionHandle,
    permissions: P,
}

impl<P: PermissionProvider> ScanChannel<P> {
    pub fn new(session: SessionHandle, permissions: P) -> Self {
        Self {
            session,
            permissions,
        }
    }

    /// Spawn a session for `radio` that stops scanning when `permissions`
    /// reports a revoked grant.
    pub fn spawn<R>(
        radio: R,
        radio_events: Receiver<RadioEvent>,
        permissions: P,
        config: SessionConfig,
    ) -> Result<(Self, Receiver<ScanEvent>)>
    where
        R: RadioProvider + 'static,
    {
        let (session, events) =
            spawn_session_with_permissions(radio, radio_events, permissions.subscribe(), config)?;
        Ok((Self::new(session, permissions), events))
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub async fn handle(
        &self,
        method: &str,
        identity_constraints: Option<Vec<String>>,
    ) -> MethodResponse {
        match MethodCall::parse(method, identity_constraints) {
            Some(call) => self.dispatch(call).await,
            None => {
                debug!("method {} not implemented", method);
                MethodResponse::NotImplemented
            }
        }
    }

    pub async fn dispatch(&self, call: MethodCall) -> MethodResponse {
        debug!("host called {}", call.method_name());
        match call {
            MethodCall::StartScan { filter } => self.start_scan(filter).await.into(),
            MethodCall::StopScan => self.stop_scan().await.into(),
            MethodCall::CheckPermissions => MethodResponse::Success(self.check_permissions()),
            MethodCall::RequestPermissions => self.request_permissions().await.into(),
        }
    }

    /// Prompts first if the user has not answered yet; a refusal fails the
    /// start with [`Error::RadioUnauthorized`].
    pub async fn start_scan(&self, filter: ScanFilter) -> Result<bool> {
        let status = self.permissions.status();
        if !status.is_granted() {
            if status.is_determined() {
                return Err(Error::RadioUnauthorized);
            }
            if !request_permissions(&self.permissions).await? {
                return Err(Error::RadioUnauthorized);
            }
        }
        self.session.start_scan(filter).await
    }

    pub async fn stop_scan(&self) -> Result<bool> {
        self.session.stop_scan().await
    }

    pub fn check_permissions(&self) -> bool {
        self.permissions.status().is_granted()
    }

    pub async fn request_permissions(&self) -> Result<bool> {
        request_permissions(&self.permissions).await
    }
}
