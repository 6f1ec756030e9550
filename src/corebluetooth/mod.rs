//! CoreBluetooth radio backend for macOS.
//!
//! CoreBluetooth has no beacon ranging on macOS, so only plain advertisement
//! scans are available here.

pub mod central_manager;
mod objc_bindings;
pub mod permission;
