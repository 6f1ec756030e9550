use log::debug;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, sleep_until};

use super::{ScanSession, SessionState};
use crate::Result;
use crate::api::permission::PermissionStatus;
use crate::api::radio::{RadioProvider, ScanFilter};
use crate::api::radio_event::{RadioEvent, ScanEvent};
use crate::config::SessionConfig;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug)]
pub enum SessionCommand {
    StartScan {
        filter: ScanFilter,
        responder: oneshot::Sender<Result<bool>>,
    },
    StopScan {
        responder: oneshot::Sender<Result<bool>>,
    },
    GetState {
        responder: oneshot::Sender<SessionState>,
    },
}

/// Cloneable front end of a running scan session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn start_scan(&self, filter: ScanFilter) -> Result<bool> {
        let (responder, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::StartScan { filter, responder })
            .await?;
        response.await?
    }

    pub async fn stop_scan(&self) -> Result<bool> {
        let (responder, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::StopScan { responder })
            .await?;
        response.await?
    }

    pub async fn state(&self) -> Result<SessionState> {
        let (responder, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::GetState { responder })
            .await?;
        Ok(response.await?)
    }
}

/// Spawn the task owning the session for `radio`.
///
/// `radio_events` is the receiving end of the channel the radio provider
/// reports into. Host-facing events come out of the returned receiver in the
/// order their radio callbacks arrived. The task ends once every
/// [`SessionHandle`] is dropped.
pub fn spawn_session<R>(
    radio: R,
    radio_events: Receiver<RadioEvent>,
    config: SessionConfig,
) -> Result<(SessionHandle, Receiver<ScanEvent>)>
where
    R: RadioProvider + 'static,
{
    spawn(radio, radio_events, None, config)
}

/// Like [`spawn_session`], also following grant changes published on
/// `permissions` (see
/// [`PermissionProvider::subscribe`](crate::api::permission::PermissionProvider::subscribe)).
pub fn spawn_session_with_permissions<R>(
    radio: R,
    radio_events: Receiver<RadioEvent>,
    permissions: watch::Receiver<PermissionStatus>,
    config: SessionConfig,
) -> Result<(SessionHandle, Receiver<ScanEvent>)>
where
    R: RadioProvider + 'static,
{
    spawn(radio, radio_events, Some(permissions), config)
}

fn spawn<R>(
    radio: R,
    radio_events: Receiver<RadioEvent>,
    permissions: Option<watch::Receiver<PermissionStatus>>,
    config: SessionConfig,
) -> Result<(SessionHandle, Receiver<ScanEvent>)>
where
    R: RadioProvider + 'static,
{
    config.validate()?;
    let (event_tx, event_rx) = mpsc::channel(config.event_buffer);
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let session = ScanSession::new(radio, config, event_tx);
    tokio::spawn(run_session(session, command_rx, radio_events, permissions));
    Ok((
        SessionHandle {
            commands: command_tx,
        },
        event_rx,
    ))
}

async fn run_session<R: RadioProvider>(
    mut session: ScanSession<R>,
    mut commands: Receiver<SessionCommand>,
    mut radio_events: Receiver<RadioEvent>,
    mut permissions: Option<watch::Receiver<PermissionStatus>>,
) {
    let mut radio_open = true;
    loop {
        let deadline = session.pending_deadline();
        tokio::select! {
            // radio callbacks first, so a command never overtakes hardware
            // events that were reported before it
            biased;
            event = radio_events.recv(), if radio_open => match event {
                Some(event) => session.handle_radio_event(event).await,
                None => {
                    debug!("radio event channel closed");
                    radio_open = false;
                }
            },
            status = permission_change(&mut permissions) => match status {
                Some(status) => session.handle_permission_status(status).await,
                None => {
                    debug!("permission channel closed");
                    permissions = None;
                }
            },
            command = commands.recv() => match command {
                Some(command) => handle_command(&mut session, command).await,
                None => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                session.expire_pending().await;
            }
        }
    }
    debug!("scan session shutting down");
    session.shutdown().await;
}

// Pends forever without a permission channel.
async fn permission_change(
    permissions: &mut Option<watch::Receiver<PermissionStatus>>,
) -> Option<PermissionStatus> {
    match permissions {
        Some(permissions) => match permissions.changed().await {
            Ok(()) => Some(*permissions.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

async fn handle_command<R: RadioProvider>(session: &mut ScanSession<R>, command: SessionCommand) {
    match command {
        SessionCommand::StartScan { filter, responder } => {
            session.start(filter, responder).await;
        }
        SessionCommand::StopScan { responder } => {
            let _ = responder.send(session.stop().await);
        }
        SessionCommand::GetState { responder } => {
            let _ = responder.send(session.state());
        }
    }
}
