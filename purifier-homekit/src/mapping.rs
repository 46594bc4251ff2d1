//! Translation between purifier properties and HomeKit characteristics.

use crate::characteristic::{
    AirQuality, Characteristic, CharacteristicValue, CurrentAirPurifierState,
    FilterChangeIndication, ServiceKind, TargetAirPurifierState,
};
use miio::model::modes;
use miio::{keys, level_to_speed, PropertyValue};

/// Filter life below this percentage means the filter should be changed.
const FILTER_CHANGE_THRESHOLD: f64 = 5.0;

/// What a characteristic write turns into on the purifier.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Write {
    Property(&'static str, PropertyValue),
    /// A rotation speed percentage, to be converted to a favorite level.
    Speed(f64),
    Ignore,
}

/// The property key a characteristic is derived from, if it comes from the device.
pub(crate) fn source_key(
    service: ServiceKind,
    characteristic: Characteristic,
) -> Option<&'static str> {
    Some(match (service, characteristic) {
        (_, Characteristic::Active) | (_, Characteristic::CurrentAirPurifierState) => keys::POWER,
        (_, Characteristic::TargetAirPurifierState) => keys::MODE,
        (_, Characteristic::RotationSpeed) => keys::FAVORITE_LEVEL,
        (_, Characteristic::LockPhysicalControls) => keys::CHILD_LOCK,
        (_, Characteristic::FilterLifeLevel) | (_, Characteristic::FilterChangeIndication) => {
            keys::FILTER_LEVEL
        }
        (_, Characteristic::AirQuality) | (_, Characteristic::Pm2_5Density) => keys::AQI,
        (_, Characteristic::CurrentTemperature) => keys::TEMPERATURE,
        (_, Characteristic::CurrentRelativeHumidity) => keys::HUMIDITY,
        (ServiceKind::Lightbulb, Characteristic::On) => keys::LED,
        (ServiceKind::Switch, Characteristic::On) => keys::BUZZER,
        _ => return None,
    })
}

/// The characteristics which change when the given property does.
pub(crate) fn affected_by(key: &str) -> &'static [(ServiceKind, Characteristic)] {
    match key {
        keys::POWER => &[
            (ServiceKind::AirPurifier, Characteristic::Active),
            (ServiceKind::AirPurifier, Characteristic::CurrentAirPurifierState),
        ],
        keys::MODE => &[(
            ServiceKind::AirPurifier,
            Characteristic::TargetAirPurifierState,
        )],
        keys::FAVORITE_LEVEL => &[(ServiceKind::AirPurifier, Characteristic::RotationSpeed)],
        keys::CHILD_LOCK => &[(ServiceKind::AirPurifier, Characteristic::LockPhysicalControls)],
        keys::FILTER_LEVEL => &[
            (ServiceKind::AirPurifier, Characteristic::FilterLifeLevel),
            (ServiceKind::AirPurifier, Characteristic::FilterChangeIndication),
        ],
        keys::AQI => &[
            (ServiceKind::AirQualitySensor, Characteristic::AirQuality),
            (ServiceKind::AirQualitySensor, Characteristic::Pm2_5Density),
        ],
        keys::TEMPERATURE => &[(
            ServiceKind::TemperatureSensor,
            Characteristic::CurrentTemperature,
        )],
        keys::HUMIDITY => &[(
            ServiceKind::HumiditySensor,
            Characteristic::CurrentRelativeHumidity,
        )],
        keys::LED => &[(ServiceKind::Lightbulb, Characteristic::On)],
        keys::BUZZER => &[(ServiceKind::Switch, Characteristic::On)],
        _ => &[],
    }
}

/// Convert a property value to the value of a characteristic derived from it, or `None` if the
/// value isn't of a type the characteristic can be derived from.
pub(crate) fn to_characteristic(
    characteristic: Characteristic,
    value: &PropertyValue,
    favorite_level_max: u8,
) -> Option<CharacteristicValue> {
    Some(match characteristic {
        Characteristic::Active | Characteristic::LockPhysicalControls => {
            CharacteristicValue::UInt8(u8::from(value.as_bool()?))
        }
        Characteristic::CurrentAirPurifierState => {
            CharacteristicValue::from(if value.as_bool()? {
                CurrentAirPurifierState::PurifyingAir
            } else {
                CurrentAirPurifierState::Inactive
            })
        }
        Characteristic::TargetAirPurifierState => {
            CharacteristicValue::from(if value.as_str()? == modes::AUTO {
                TargetAirPurifierState::Auto
            } else {
                TargetAirPurifierState::Manual
            })
        }
        Characteristic::RotationSpeed => CharacteristicValue::Float(f64::from(level_to_speed(
            value.as_f64()?,
            favorite_level_max,
        ))),
        Characteristic::FilterChangeIndication => {
            CharacteristicValue::from(if value.as_f64()? < FILTER_CHANGE_THRESHOLD {
                FilterChangeIndication::ChangeFilter
            } else {
                FilterChangeIndication::FilterOk
            })
        }
        Characteristic::AirQuality => AirQuality::from_pm25(value.as_f64()?).into(),
        Characteristic::FilterLifeLevel
        | Characteristic::Pm2_5Density
        | Characteristic::CurrentTemperature
        | Characteristic::CurrentRelativeHumidity => CharacteristicValue::Float(value.as_f64()?),
        Characteristic::On => CharacteristicValue::Bool(value.as_bool()?),
        Characteristic::Manufacturer
        | Characteristic::Model
        | Characteristic::SerialNumber
        | Characteristic::FirmwareRevision => return None,
    })
}

/// Work out what to do for a write to a characteristic, or `None` if the value is invalid for it.
///
/// Characteristics which can't be written give [`Write::Ignore`]; callers should check
/// [`Characteristic::is_writable`] first.
pub(crate) fn from_characteristic(
    service: ServiceKind,
    characteristic: Characteristic,
    value: &CharacteristicValue,
) -> Option<Write> {
    Some(match (service, characteristic) {
        (_, Characteristic::Active) => {
            Write::Property(keys::POWER, PropertyValue::Bool(value.as_bool()?))
        }
        (_, Characteristic::TargetAirPurifierState) => {
            let mode = match value.as_u8()? {
                0 => modes::FAVORITE,
                1 => modes::AUTO,
                _ => return None,
            };
            Write::Property(keys::MODE, PropertyValue::from(mode))
        }
        (_, Characteristic::RotationSpeed) => {
            let speed = value.as_f64()?;
            if !(0.0..=100.0).contains(&speed) {
                return None;
            }
            // Turning the purifier off is done through Active.
            if speed == 0.0 {
                Write::Ignore
            } else {
                Write::Speed(speed)
            }
        }
        (_, Characteristic::LockPhysicalControls) => {
            Write::Property(keys::CHILD_LOCK, PropertyValue::Bool(value.as_bool()?))
        }
        (ServiceKind::Lightbulb, Characteristic::On) => {
            Write::Property(keys::LED, PropertyValue::Bool(value.as_bool()?))
        }
        (ServiceKind::Switch, Characteristic::On) => {
            Write::Property(keys::BUZZER, PropertyValue::Bool(value.as_bool()?))
        }
        _ => Write::Ignore,
    })
}
