//! Bluetooth LE advertisement and beacon scanning.
//!
//! Platform scan results and beacon ranging reports are normalized into one
//! [`Advertisement`](api::advertisement::Advertisement) stream by a scan
//! session that follows the radio through power and permission changes.

pub mod api;
pub mod channel;
pub mod classifier;
pub mod config;
pub mod decoder;
mod error;
pub mod merger;
pub mod session;

#[cfg(target_os = "macos")]
pub mod corebluetooth;

pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
