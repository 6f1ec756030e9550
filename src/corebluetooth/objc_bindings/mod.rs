pub mod central_manager_cb;
mod central_manager_delegate_cb;
mod mac_extensions_cb;
mod mac_utils_cb;

pub use mac_extensions_cb::authorization;
