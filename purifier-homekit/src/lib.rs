//! A HomeKit accessory adapter for Xiaomi Mi Air Purifiers.
//!
//! [`PurifierAccessory`] exposes a purifier as a HomeKit air purifier with optional sensor, LED
//! and buzzer services. It doesn't speak HAP itself: a HAP server reads and writes
//! characteristics through it, and gets pushed changes through a [`CharacteristicSink`].

mod accessory;
pub mod characteristic;
pub mod config;
mod mapping;

pub use accessory::{AccessoryError, CharacteristicSink, PurifierAccessory, Service, SpawnError};
pub use characteristic::{Characteristic, CharacteristicValue, HapStatus, ServiceKind};
pub use config::{AccessoryConfig, AccessorySettings, ConfigError, OptionalServices};
