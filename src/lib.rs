//! Core event-manipulation pipeline and device lifecycle for a keyboard
//! and pointing-device customization daemon (§1).
//!
//! This crate owns everything from "a HID report arrived" to "a
//! post-processed event was handed to the virtual HID service"; OS-specific
//! HID enumeration, the virtual HID driver itself, configuration-file
//! parsing, and inter-process transport are external collaborators wired in
//! through the traits in [`external`], [`virtual_hid`], and [`config`].

pub mod config;
pub mod connector;
pub mod device;
pub mod device_entry;
pub mod dispatcher;
pub mod entry;
pub mod environment;
pub mod error;
pub mod event;
pub mod external;
pub mod grabber;
pub mod hid_value;
pub mod manager;
pub mod manipulator;
pub mod modifier;
pub mod notification;
pub mod persistence;
pub mod post_to_virtual_device;
pub mod pressed_keys;
pub mod queue;
pub mod stuck_events;
pub mod time;
pub mod virtual_hid;
