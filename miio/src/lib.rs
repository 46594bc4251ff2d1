//! A library for tracking the properties of Xiaomi Mi Air Purifiers over the miio protocol.
//!
//! A [`MiioDevice`] keeps a cache of the properties it has been asked to track, refreshes it by
//! polling the device, and calls back subscribers whenever a property changes. An
//! [`AirPurifier`] wraps one with the property table for a particular purifier model.
//!
//! The protocol itself (handshake, encryption and framing) is left to whatever implements
//! [`Connector`] and [`Session`].

mod cache;
mod client;
mod device;
mod error;
pub mod model;
mod protocol;
mod purifier;
mod registry;
#[cfg(test)]
mod testing;
mod token;
mod value;

pub use cache::{PropertyCache, TrackedProperty};
pub use client::{ClientError, Connector, Session};
pub use device::{
    ConnectionState, DeviceOptions, MiioDevice, DEFAULT_CONNECT_RETRY_INTERVAL,
    DEFAULT_MAX_POLL_FAILURES,
};
pub use error::PropertyError;
pub use model::{keys, DeviceModel};
pub use purifier::{level_to_speed, speed_to_level, AirPurifier};
pub use registry::{ChangeCallback, ChangeRegistry};
pub use token::{ParseTokenError, Token};
pub use value::PropertyValue;
