use std::ffi::{c_char, c_void};

// libdispatch ships with libSystem, no extra linking needed
pub const DISPATCH_QUEUE_SERIAL: *mut c_void = std::ptr::null_mut();

unsafe extern "C" {
    pub fn dispatch_queue_create(label: *const c_char, attr: *mut c_void) -> *mut c_void;
}
