use async_trait::async_trait;
use tokio::sync::watch;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    NotDetermined,
    Restricted,
    Denied,
    Granted,
}

/// Scanning needs both the radio grant and the location-equivalent grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionStatus {
    pub radio: Authorization,
    pub location: Authorization,
}

impl PermissionStatus {
    pub fn new(radio: Authorization, location: Authorization) -> Self {
        Self { radio, location }
    }

    pub fn granted() -> Self {
        Self::new(Authorization::Granted, Authorization::Granted)
    }

    pub fn is_granted(&self) -> bool {
        self.radio == Authorization::Granted && self.location == Authorization::Granted
    }

    /// True once the user has answered every prompt.
    pub fn is_determined(&self) -> bool {
        self.radio != Authorization::NotDetermined && self.location != Authorization::NotDetermined
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    fn status(&self) -> PermissionStatus;

    /// Whether a foreground context exists to attach a prompt to.
    fn has_host_context(&self) -> bool;

    /// Show the system prompt for the missing grants. Resolves once the user
    /// has responded.
    async fn prompt(&self) -> Result<PermissionStatus>;

    fn subscribe(&self) -> watch::Receiver<PermissionStatus>;
}

/// Ask for any missing grant. Resolves `true` straight away when everything
/// is already granted.
pub async fn request_permissions<P>(provider: &P) -> Result<bool>
where
    P: PermissionProvider + ?Sized,
{
    if provider.status().is_granted() {
        return Ok(true);
    }
    if !provider.has_host_context() {
        return Err(Error::NoHostContext);
    }
    let status = provider.prompt().await?;
    log::debug!("permission prompt answered: {:?}", status);
    Ok(status.is_granted())
}
