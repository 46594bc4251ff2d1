use crate::characteristic::{Characteristic, CharacteristicValue, HapStatus, ServiceKind};
use crate::config::{AccessorySettings, OptionalServices};
use crate::mapping::{self, Write};
use futures::future::try_join;
use futures::{FutureExt, TryFutureExt};
use miio::{AirPurifier, Connector, PropertyError, PropertyValue};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::{self, JoinError, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};

const MANUFACTURER: &str = "Xiaomi";
const FIRMWARE_REVISION: &str = env!("CARGO_PKG_VERSION");

/// Receives characteristic values as they change, to push them on to HomeKit controllers.
pub trait CharacteristicSink: Send + Sync + 'static {
    fn update(
        &self,
        service: ServiceKind,
        characteristic: Characteristic,
        value: CharacteristicValue,
    );
}

/// An error reading or writing a characteristic.
#[derive(Debug, Error)]
pub enum AccessoryError {
    #[error("{0}")]
    Property(#[from] PropertyError),
    #[error("{service} service has no {characteristic} characteristic")]
    NoSuchCharacteristic {
        service: ServiceKind,
        characteristic: Characteristic,
    },
    #[error("{0} is read-only")]
    ReadOnly(Characteristic),
    #[error("Invalid value {value} for {characteristic}")]
    InvalidValue {
        characteristic: Characteristic,
        value: String,
    },
}

impl AccessoryError {
    /// The HAP status to report to the controller for this error.
    pub fn status(&self) -> HapStatus {
        match self {
            Self::Property(PropertyError::NotResponding)
            | Self::Property(PropertyError::NoValueYet(_)) => HapStatus::CommunicationFailure,
            Self::Property(PropertyError::InvalidValue { .. }) | Self::InvalidValue { .. } => {
                HapStatus::InvalidValue
            }
            Self::Property(PropertyError::ReadOnly(_)) | Self::ReadOnly(_) => HapStatus::ReadOnly,
            Self::Property(PropertyError::UnknownProperty(_))
            | Self::Property(PropertyError::NotTracked(_))
            | Self::NoSuchCharacteristic { .. } => HapStatus::ResourceDoesNotExist,
        }
    }
}

/// Error type for futures representing tasks spawned by this crate.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("Task failed: {0}")]
    Join(#[from] JoinError),
}

/// A HomeKit service of the accessory, with the characteristics it has.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Service {
    pub kind: ServiceKind,
    pub name: String,
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    fn new(kind: ServiceKind, name: String, characteristics: &[Characteristic]) -> Self {
        Self {
            kind,
            name,
            characteristics: characteristics.to_vec(),
        }
    }
}

/// A HomeKit air purifier accessory backed by a miio purifier.
///
/// The same adapter serves every supported model. What the accessory reads and writes is
/// determined by the model's property table.
pub struct PurifierAccessory<C: Connector> {
    purifier: AirPurifier<C>,
    serial_number: String,
    polling_interval: Duration,
    services: Vec<Service>,
}

impl<C: Connector> Clone for PurifierAccessory<C> {
    fn clone(&self) -> Self {
        Self {
            purifier: self.purifier.clone(),
            serial_number: self.serial_number.clone(),
            polling_interval: self.polling_interval,
            services: self.services.clone(),
        }
    }
}

impl<C: Connector> PurifierAccessory<C> {
    pub fn new(connector: C, settings: &AccessorySettings) -> Self {
        let purifier = AirPurifier::new(
            connector,
            settings.address,
            settings.token,
            settings.model,
            settings.device_options.clone(),
        )
        .with_favorite_level_max(settings.favorite_level_max);
        let services = build_services(&purifier, &settings.name, settings.services);
        Self {
            purifier,
            serial_number: format!("{:X}", settings.token),
            polling_interval: settings.polling_interval,
            services,
        }
    }

    pub fn purifier(&self) -> &AirPurifier<C> {
        &self.purifier
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn has_characteristic(&self, service: ServiceKind, characteristic: Characteristic) -> bool {
        self.services
            .iter()
            .any(|s| s.kind == service && s.characteristics.contains(&characteristic))
    }

    /// The current value of a characteristic, from the purifier's property cache.
    pub fn read(
        &self,
        service: ServiceKind,
        characteristic: Characteristic,
    ) -> Result<CharacteristicValue, AccessoryError> {
        self.check_exists(service, characteristic)?;
        let info = match characteristic {
            Characteristic::Manufacturer => Some(MANUFACTURER),
            Characteristic::Model => Some(self.purifier.model().display_name),
            Characteristic::SerialNumber => Some(self.serial_number.as_str()),
            Characteristic::FirmwareRevision => Some(FIRMWARE_REVISION),
            _ => None,
        };
        if let Some(info) = info {
            return Ok(CharacteristicValue::String(info.to_owned()));
        }

        let key = mapping::source_key(service, characteristic).ok_or(
            AccessoryError::NoSuchCharacteristic {
                service,
                characteristic,
            },
        )?;
        let value = self.purifier.get(key)?;
        let converted = mapping::to_characteristic(
            characteristic,
            &value,
            self.purifier.favorite_level_max(),
        );
        log::trace!("Read {} {}: {} -> {:?}", service, characteristic, value, converted);
        converted.ok_or_else(|| AccessoryError::InvalidValue {
            characteristic,
            value: value.to_string(),
        })
    }

    /// Write a characteristic through to the purifier. The new value is pushed to the sink once
    /// the purifier reports it.
    pub async fn write(
        &self,
        service: ServiceKind,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> Result<(), AccessoryError> {
        self.check_exists(service, characteristic)?;
        if !characteristic.is_writable() {
            return Err(AccessoryError::ReadOnly(characteristic));
        }
        let write = mapping::from_characteristic(service, characteristic, &value).ok_or_else(
            || AccessoryError::InvalidValue {
                characteristic,
                value: value.to_string(),
            },
        )?;

        log::debug!("Write {} {}: {}", service, characteristic, value);
        match write {
            Write::Property(key, property_value) => self.purifier.set(key, property_value).await?,
            Write::Speed(speed) => self.purifier.set_speed(speed).await?,
            Write::Ignore => log::debug!("Ignoring write of {} to {}", value, characteristic),
        }
        Ok(())
    }

    /// Push every change to a characteristic of the accessory to the given sink.
    pub fn subscribe(&self, sink: Arc<dyn CharacteristicSink>) -> Result<(), AccessoryError> {
        let favorite_level_max = self.purifier.favorite_level_max();
        for alias in self.purifier.model().aliases {
            let targets: Vec<(ServiceKind, Characteristic)> = mapping::affected_by(alias.key)
                .iter()
                .copied()
                .filter(|&(service, characteristic)| {
                    self.has_characteristic(service, characteristic)
                })
                .collect();
            if targets.is_empty() {
                continue;
            }

            let sink = sink.clone();
            self.purifier
                .on_change(alias.key, move |value: &PropertyValue| {
                    for &(service, characteristic) in &targets {
                        match mapping::to_characteristic(characteristic, value, favorite_level_max)
                        {
                            Some(converted) => sink.update(service, characteristic, converted),
                            None => log::warn!(
                                "Can't convert {} to {} for {}",
                                value,
                                characteristic,
                                service
                            ),
                        }
                    }
                })?;
        }
        Ok(())
    }

    /// Subscribe the sink, then start tasks to connect to the purifier and to poll it
    /// periodically.
    ///
    /// # Return value
    /// A pair of the accessory itself, and a `Future` for the tasks. The tasks only end if they
    /// panic, so you should join on this future to find out if that happens.
    pub fn spawn(
        self,
        sink: Arc<dyn CharacteristicSink>,
    ) -> Result<(Self, impl Future<Output = Result<(), SpawnError>>), AccessoryError> {
        self.subscribe(sink)?;

        let device = self.purifier.device().clone();
        let connect_task: JoinHandle<()> = task::spawn(async move { device.run().await });

        let device = self.purifier.device().clone();
        let polling_interval = self.polling_interval;
        let poll_task: JoinHandle<()> = task::spawn(async move {
            // The first poll happens as soon as we connect, so don't tick immediately.
            let mut interval = time::interval_at(Instant::now() + polling_interval, polling_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                device.poll().await;
            }
        });

        let join_handle = try_join(connect_task, poll_task)
            .map(simplify_unit_pair)
            .err_into::<SpawnError>();
        Ok((self, join_handle))
    }

    fn check_exists(
        &self,
        service: ServiceKind,
        characteristic: Characteristic,
    ) -> Result<(), AccessoryError> {
        if self.has_characteristic(service, characteristic) {
            Ok(())
        } else {
            Err(AccessoryError::NoSuchCharacteristic {
                service,
                characteristic,
            })
        }
    }
}

fn build_services<C: Connector>(
    purifier: &AirPurifier<C>,
    name: &str,
    optional: OptionalServices,
) -> Vec<Service> {
    let mut purifier_characteristics = vec![
        Characteristic::Active,
        Characteristic::CurrentAirPurifierState,
        Characteristic::TargetAirPurifierState,
        Characteristic::RotationSpeed,
    ];
    for characteristic in [
        Characteristic::LockPhysicalControls,
        Characteristic::FilterLifeLevel,
        Characteristic::FilterChangeIndication,
    ] {
        if has_source(purifier, ServiceKind::AirPurifier, characteristic) {
            purifier_characteristics.push(characteristic);
        }
    }

    let mut services = vec![
        Service {
            kind: ServiceKind::AirPurifier,
            name: name.to_owned(),
            characteristics: purifier_characteristics,
        },
        Service::new(
            ServiceKind::AccessoryInformation,
            name.to_owned(),
            &[
                Characteristic::Manufacturer,
                Characteristic::Model,
                Characteristic::SerialNumber,
                Characteristic::FirmwareRevision,
            ],
        ),
    ];

    let candidates = [
        (
            optional.air_quality,
            ServiceKind::AirQualitySensor,
            "Air Quality",
            &[Characteristic::AirQuality, Characteristic::Pm2_5Density][..],
        ),
        (
            optional.temperature,
            ServiceKind::TemperatureSensor,
            "Temperature",
            &[Characteristic::CurrentTemperature][..],
        ),
        (
            optional.humidity,
            ServiceKind::HumiditySensor,
            "Humidity",
            &[Characteristic::CurrentRelativeHumidity][..],
        ),
        (
            optional.led,
            ServiceKind::Lightbulb,
            "LED",
            &[Characteristic::On][..],
        ),
        (
            optional.buzzer,
            ServiceKind::Switch,
            "Buzzer",
            &[Characteristic::On][..],
        ),
    ];
    for (enabled, kind, suffix, characteristics) in candidates {
        if !enabled {
            continue;
        }
        if !characteristics
            .iter()
            .all(|&characteristic| has_source(purifier, kind, characteristic))
        {
            log::warn!(
                "{} doesn't support the {} service",
                purifier.model().display_name,
                kind
            );
            continue;
        }
        services.push(Service::new(
            kind,
            format!("{} {}", name, suffix),
            characteristics,
        ));
    }
    services
}

/// Whether the purifier's model has the property a characteristic is derived from.
fn has_source<C: Connector>(
    purifier: &AirPurifier<C>,
    service: ServiceKind,
    characteristic: Characteristic,
) -> bool {
    mapping::source_key(service, characteristic).map_or(false, |key| purifier.has(key))
}

fn simplify_unit_pair<E>(m: Result<((), ()), E>) -> Result<(), E> {
    m.map(|((), ())| ())
}
