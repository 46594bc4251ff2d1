//! The boundary to the library which speaks the miio wire protocol.
//!
//! Discovery, the handshake, encryption and packet framing all live on the far side of these
//! traits. This crate only shapes the JSON-RPC calls and interprets their results.

use crate::token::Token;
use async_trait::async_trait;
use serde_json::Value;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// An error talking to a device.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The device didn't answer in time.
    #[error("Device did not respond within {0:?}")]
    Timeout(Duration),
    /// The transport failed.
    #[error("I/O error talking to device: {0}")]
    Io(#[from] std::io::Error),
    /// The device answered the call with an error.
    #[error("Device returned error {code}: {message}")]
    Device { code: i64, message: String },
    /// The device answered with something that couldn't be interpreted.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Opens sessions to miio devices.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: Session;

    /// Perform the handshake with the device at `address` and return a session which can be used
    /// to issue calls to it.
    async fn connect(&self, address: IpAddr, token: &Token) -> Result<Self::Session, ClientError>;
}

/// A live session with a single miio device.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Issue a single RPC call and return its `result` field.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, ClientError>;
}
