use crate::client::ClientError;
use thiserror::Error;

/// An error reading or writing a property through the cache.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PropertyError {
    /// The property key isn't in the device model's alias table.
    #[error("Property '{0}' is not defined for this device")]
    UnknownProperty(String),
    /// The wire-level property was never registered with the device.
    #[error("Property '{0}' is not tracked")]
    NotTracked(String),
    /// There is no session, or the last poll failed.
    #[error("Device is not responding")]
    NotResponding,
    /// The property is tracked but no poll has populated it yet.
    #[error("Property '{0}' has no value yet")]
    NoValueYet(String),
    /// The value can't be encoded for the property.
    #[error("Invalid value {value} for property '{property}'")]
    InvalidValue { property: String, value: String },
    /// The device offers no way to write the property.
    #[error("Property '{0}' is read-only")]
    ReadOnly(String),
}

/// Why a background poll didn't update the cache. These are only ever logged.
#[derive(Debug, Error)]
pub(crate) enum PollError {
    #[error("Not connected")]
    NotConnected,
    #[error(transparent)]
    Client(#[from] ClientError),
}
