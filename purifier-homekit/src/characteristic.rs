//! The subset of the HomeKit accessory model which an air purifier accessory uses.

use std::fmt::{self, Display, Formatter};

/// A HomeKit service type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ServiceKind {
    AccessoryInformation,
    AirPurifier,
    AirQualitySensor,
    TemperatureSensor,
    HumiditySensor,
    /// Used for the purifier's display LED.
    Lightbulb,
    /// Used for the purifier's buzzer.
    Switch,
}

impl ServiceKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::AccessoryInformation => "AccessoryInformation",
            Self::AirPurifier => "AirPurifier",
            Self::AirQualitySensor => "AirQualitySensor",
            Self::TemperatureSensor => "TemperatureSensor",
            Self::HumiditySensor => "HumiditySensor",
            Self::Lightbulb => "Lightbulb",
            Self::Switch => "Switch",
        }
    }
}

impl Display for ServiceKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A HomeKit characteristic type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Characteristic {
    Manufacturer,
    Model,
    SerialNumber,
    FirmwareRevision,
    Active,
    CurrentAirPurifierState,
    TargetAirPurifierState,
    RotationSpeed,
    LockPhysicalControls,
    FilterLifeLevel,
    FilterChangeIndication,
    AirQuality,
    Pm2_5Density,
    CurrentTemperature,
    CurrentRelativeHumidity,
    On,
}

impl Characteristic {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Manufacturer => "Manufacturer",
            Self::Model => "Model",
            Self::SerialNumber => "SerialNumber",
            Self::FirmwareRevision => "FirmwareRevision",
            Self::Active => "Active",
            Self::CurrentAirPurifierState => "CurrentAirPurifierState",
            Self::TargetAirPurifierState => "TargetAirPurifierState",
            Self::RotationSpeed => "RotationSpeed",
            Self::LockPhysicalControls => "LockPhysicalControls",
            Self::FilterLifeLevel => "FilterLifeLevel",
            Self::FilterChangeIndication => "FilterChangeIndication",
            Self::AirQuality => "AirQuality",
            Self::Pm2_5Density => "PM2_5Density",
            Self::CurrentTemperature => "CurrentTemperature",
            Self::CurrentRelativeHumidity => "CurrentRelativeHumidity",
            Self::On => "On",
        }
    }

    /// Whether a controller may write the characteristic.
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            Self::Active
                | Self::TargetAirPurifierState
                | Self::RotationSpeed
                | Self::LockPhysicalControls
                | Self::On
        )
    }
}

impl Display for Characteristic {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value of a characteristic, in the format HomeKit uses for it.
#[derive(Clone, Debug, PartialEq)]
pub enum CharacteristicValue {
    Bool(bool),
    /// Enumerations, and booleans which HomeKit represents as 0 or 1.
    UInt8(u8),
    Float(f64),
    String(String),
}

impl CharacteristicValue {
    /// Booleans, and 0 or 1 as an integer.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::UInt8(0) => Some(false),
            Self::UInt8(1) => Some(true),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Self::UInt8(i) => Some(*i),
            Self::Bool(b) => Some(u8::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::UInt8(i) => Some(f64::from(*i)),
            _ => None,
        }
    }
}

impl Display for CharacteristicValue {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::UInt8(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CurrentAirPurifierState {
    Inactive = 0,
    Idle = 1,
    PurifyingAir = 2,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TargetAirPurifierState {
    Manual = 0,
    Auto = 1,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterChangeIndication {
    FilterOk = 0,
    ChangeFilter = 1,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AirQuality {
    Unknown = 0,
    Excellent = 1,
    Good = 2,
    Fair = 3,
    Inferior = 4,
    Poor = 5,
}

impl AirQuality {
    /// Bucket a PM2.5 density in μg/m³, using the Korean PM2.5 standard.
    pub fn from_pm25(pm25: f64) -> Self {
        if pm25 >= 76.0 {
            Self::Poor
        } else if pm25 >= 36.0 {
            Self::Inferior
        } else if pm25 >= 16.0 {
            Self::Fair
        } else if pm25 >= 6.0 {
            Self::Good
        } else if pm25 >= 0.0 {
            Self::Excellent
        } else {
            Self::Unknown
        }
    }
}

macro_rules! impl_from_enum {
    ($($t:ty),*) => {
        $(
            impl From<$t> for CharacteristicValue {
                fn from(value: $t) -> Self {
                    Self::UInt8(value as u8)
                }
            }
        )*
    };
}

impl_from_enum!(
    CurrentAirPurifierState,
    TargetAirPurifierState,
    FilterChangeIndication,
    AirQuality
);

/// HAP status codes for failed reads and writes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HapStatus {
    /// The accessory couldn't talk to the device behind it.
    CommunicationFailure = -70402,
    ReadOnly = -70404,
    ResourceDoesNotExist = -70409,
    InvalidValue = -70410,
}

impl HapStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn air_quality_thresholds() {
        assert_eq!(AirQuality::from_pm25(0.0), AirQuality::Excellent);
        assert_eq!(AirQuality::from_pm25(5.0), AirQuality::Excellent);
        assert_eq!(AirQuality::from_pm25(6.0), AirQuality::Good);
        assert_eq!(AirQuality::from_pm25(15.0), AirQuality::Good);
        assert_eq!(AirQuality::from_pm25(16.0), AirQuality::Fair);
        assert_eq!(AirQuality::from_pm25(36.0), AirQuality::Inferior);
        assert_eq!(AirQuality::from_pm25(75.0), AirQuality::Inferior);
        assert_eq!(AirQuality::from_pm25(76.0), AirQuality::Poor);
        assert_eq!(AirQuality::from_pm25(600.0), AirQuality::Poor);
        assert_eq!(AirQuality::from_pm25(-1.0), AirQuality::Unknown);
        assert_eq!(AirQuality::from_pm25(f64::NAN), AirQuality::Unknown);
    }

    #[test]
    fn enum_values() {
        assert_eq!(
            CharacteristicValue::from(CurrentAirPurifierState::PurifyingAir),
            CharacteristicValue::UInt8(2)
        );
        assert_eq!(
            CharacteristicValue::from(TargetAirPurifierState::Auto),
            CharacteristicValue::UInt8(1)
        );
        assert_eq!(
            CharacteristicValue::from(AirQuality::Poor),
            CharacteristicValue::UInt8(5)
        );
    }

    #[test]
    fn value_conversions() {
        assert_eq!(CharacteristicValue::UInt8(1).as_bool(), Some(true));
        assert_eq!(CharacteristicValue::UInt8(2).as_bool(), None);
        assert_eq!(CharacteristicValue::Bool(true).as_u8(), Some(1));
        assert_eq!(CharacteristicValue::UInt8(40).as_f64(), Some(40.0));
        assert_eq!(CharacteristicValue::String("x".to_string()).as_f64(), None);
    }

    #[test]
    fn status_codes() {
        assert_eq!(HapStatus::CommunicationFailure.code(), -70402);
        assert_eq!(HapStatus::ResourceDoesNotExist.code(), -70409);
        assert_eq!(HapStatus::InvalidValue.code(), -70410);
    }
}
