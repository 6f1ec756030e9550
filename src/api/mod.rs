pub mod advertisement;
pub mod permission;
pub mod radio;
pub mod radio_event;
