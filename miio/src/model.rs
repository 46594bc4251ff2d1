//! Per-model property tables.
//!
//! Each supported purifier model maps the domain-facing property keys in [`keys`] onto the
//! wire-level properties the device actually exposes, together with how to read, decode, encode
//! and write each of them.

use crate::client::ClientError;
use crate::value::PropertyValue;
use serde_json::Value;

/// Domain-facing property keys shared by all purifier models.
pub mod keys {
    pub const POWER: &str = "power";
    pub const MODE: &str = "mode";
    pub const AQI: &str = "aqi";
    pub const HUMIDITY: &str = "humidity";
    pub const TEMPERATURE: &str = "temp";
    pub const FILTER_LEVEL: &str = "filter_level";
    pub const CHILD_LOCK: &str = "child_lock";
    pub const LED: &str = "led";
    pub const BUZZER: &str = "buzzer";
    pub const FAVORITE_LEVEL: &str = "favorite_level";
}

/// Operating modes, as exposed in the cache.
pub mod modes {
    pub const AUTO: &str = "auto";
    pub const SILENT: &str = "silent";
    pub const SLEEP: &str = "sleep";
    pub const FAVORITE: &str = "favorite";
    pub const IDLE: &str = "idle";
}

/// MIoT mode values, indexed by their numeric value on the wire.
const MIOT_MODES: [&str; 4] = [modes::AUTO, modes::SLEEP, modes::FAVORITE, modes::IDLE];

/// LED brightness value meaning "off" on MIoT devices. 0 is bright, 1 is dim.
const MIOT_LED_OFF: i64 = 2;

/// Volume written when the buzzer is switched on for models which only expose a volume.
const BUZZER_ON_VOLUME: i64 = 100;

/// How a property is fetched from the device and, if it is writable, how it is written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Source {
    /// Read as part of a batched legacy `get_prop` call, and written with the given method.
    Batched { write: Option<&'static str> },
    /// A legacy property which the batched `get_prop` response omits, so must be read with a
    /// `get_prop` call of its own.
    Separate { write: Option<&'static str> },
    /// A MIoT property, read with `get_properties` and written with `set_properties`.
    Miot { siid: u32, piid: u32, writable: bool },
}

impl Source {
    pub fn is_writable(&self) -> bool {
        match self {
            Self::Batched { write } | Self::Separate { write } => write.is_some(),
            Self::Miot { writable, .. } => *writable,
        }
    }
}

/// How raw values on the wire map to cached values.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Encoding {
    /// Passed through unchanged.
    Plain,
    /// `"on"` or `"off"`, cached as a boolean.
    OnOff,
    /// An integer in tenths, cached as a float.
    Tenths,
    /// A MIoT mode index, cached as the mode name.
    ModeIndex,
    /// A MIoT LED brightness, cached as whether the LED is on.
    LedBrightness,
    /// A volume from 0 to 100, cached as whether the buzzer is on.
    Volume,
}

impl Encoding {
    /// Decode a raw value from a device response. `null` means the device didn't report the
    /// property, and decodes to `None`.
    pub fn decode(&self, raw: &Value) -> Result<Option<PropertyValue>, ClientError> {
        if raw.is_null() {
            return Ok(None);
        }
        let malformed = || ClientError::MalformedResponse(format!("unexpected value {}", raw));
        let value = match self {
            Self::Plain => PropertyValue::from_json(raw).ok_or_else(malformed)?,
            Self::OnOff => match raw {
                Value::String(s) if s == "on" => PropertyValue::Bool(true),
                Value::String(s) if s == "off" => PropertyValue::Bool(false),
                Value::Bool(b) => PropertyValue::Bool(*b),
                _ => return Err(malformed()),
            },
            Self::Tenths => PropertyValue::Float(raw.as_f64().ok_or_else(malformed)? / 10.0),
            Self::ModeIndex => {
                let index = raw.as_u64().ok_or_else(malformed)?;
                let mode = MIOT_MODES.get(index as usize).ok_or_else(malformed)?;
                PropertyValue::from(*mode)
            }
            Self::LedBrightness => {
                PropertyValue::Bool(raw.as_i64().ok_or_else(malformed)? != MIOT_LED_OFF)
            }
            Self::Volume => PropertyValue::Bool(raw.as_i64().ok_or_else(malformed)? > 0),
        };
        Ok(Some(value))
    }

    /// Encode a value to send to the device, or `None` if it is the wrong type for this encoding.
    pub fn encode(&self, value: &PropertyValue) -> Option<Value> {
        match self {
            Self::Plain => Some(value.to_json()).filter(|v| !v.is_null()),
            Self::OnOff => value
                .as_bool()
                .map(|on| Value::from(if on { "on" } else { "off" })),
            Self::Tenths => value.as_f64().map(|x| Value::from((x * 10.0).round() as i64)),
            Self::ModeIndex => {
                let mode = value.as_str()?;
                MIOT_MODES
                    .iter()
                    .position(|m| *m == mode)
                    .map(|index| Value::from(index as u64))
            }
            Self::LedBrightness => value
                .as_bool()
                .map(|on| Value::from(if on { 0 } else { MIOT_LED_OFF })),
            Self::Volume => value
                .as_bool()
                .map(|on| Value::from(if on { BUZZER_ON_VOLUME } else { 0 })),
        }
    }
}

/// A property as the device client knows it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WireProperty {
    /// The name the property is tracked and cached under. For legacy devices this is also the
    /// name used in `get_prop` calls.
    pub name: &'static str,
    pub source: Source,
    pub encoding: Encoding,
}

impl WireProperty {
    pub const fn batched(name: &'static str, encoding: Encoding, write: Option<&'static str>) -> Self {
        WireProperty {
            name,
            source: Source::Batched { write },
            encoding,
        }
    }

    pub const fn separate(
        name: &'static str,
        encoding: Encoding,
        write: Option<&'static str>,
    ) -> Self {
        WireProperty {
            name,
            source: Source::Separate { write },
            encoding,
        }
    }

    pub const fn miot(
        name: &'static str,
        siid: u32,
        piid: u32,
        encoding: Encoding,
        writable: bool,
    ) -> Self {
        WireProperty {
            name,
            source: Source::Miot {
                siid,
                piid,
                writable,
            },
            encoding,
        }
    }
}

/// An entry of a model's alias table, mapping a key from [`keys`] to a wire-level property.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PropertyAlias {
    pub key: &'static str,
    pub wire: WireProperty,
}

/// The property table and speed scale for one family of purifier models.
#[derive(Debug, Eq, PartialEq)]
pub struct DeviceModel {
    /// The miio model identifiers covered by this table.
    pub ids: &'static [&'static str],
    /// Human-readable model name.
    pub display_name: &'static str,
    pub aliases: &'static [PropertyAlias],
    /// The highest favorite level the device accepts, which corresponds to 100% rotation speed.
    pub favorite_level_max: u8,
}

impl DeviceModel {
    /// Look up a built-in model by its miio model identifier.
    pub fn find(model_id: &str) -> Option<&'static DeviceModel> {
        MODELS
            .iter()
            .copied()
            .find(|model| model.ids.iter().any(|id| *id == model_id))
    }

    /// The wire-level property a key maps to, if the model has it.
    pub fn alias(&self, key: &str) -> Option<&'static WireProperty> {
        self.aliases
            .iter()
            .find(|alias| alias.key == key)
            .map(|alias| &alias.wire)
    }

    /// The key a wire-level property name is aliased from.
    pub fn key_for(&self, wire_name: &str) -> Option<&'static str> {
        self.aliases
            .iter()
            .find(|alias| alias.wire.name == wire_name)
            .map(|alias| alias.key)
    }
}

const fn alias(key: &'static str, wire: WireProperty) -> PropertyAlias {
    PropertyAlias { key, wire }
}

/// Air Purifier Pro.
pub static AIR_PURIFIER_PRO: DeviceModel = DeviceModel {
    ids: &["zhimi.airpurifier.v6"],
    display_name: "Air Purifier Pro",
    aliases: &[
        alias(keys::POWER, WireProperty::batched("power", Encoding::OnOff, Some("set_power"))),
        alias(keys::MODE, WireProperty::batched("mode", Encoding::Plain, Some("set_mode"))),
        alias(keys::AQI, WireProperty::batched("aqi", Encoding::Plain, None)),
        alias(keys::HUMIDITY, WireProperty::batched("humidity", Encoding::Plain, None)),
        alias(keys::TEMPERATURE, WireProperty::batched("temp_dec", Encoding::Tenths, None)),
        alias(keys::FILTER_LEVEL, WireProperty::batched("filter1_life", Encoding::Plain, None)),
        alias(
            keys::CHILD_LOCK,
            WireProperty::batched("child_lock", Encoding::OnOff, Some("set_child_lock")),
        ),
        alias(keys::LED, WireProperty::batched("led", Encoding::OnOff, Some("set_led"))),
        alias(keys::BUZZER, WireProperty::batched("volume", Encoding::Volume, Some("set_volume"))),
        alias(
            keys::FAVORITE_LEVEL,
            WireProperty::batched("favorite_level", Encoding::Plain, Some("set_level_favorite")),
        ),
    ],
    favorite_level_max: 16,
};

/// Air Purifier Pro v7. Its batched `get_prop` response leaves out `volume`.
pub static AIR_PURIFIER_PRO_V7: DeviceModel = DeviceModel {
    ids: &["zhimi.airpurifier.v7"],
    display_name: "Air Purifier Pro v7",
    aliases: &[
        alias(keys::POWER, WireProperty::batched("power", Encoding::OnOff, Some("set_power"))),
        alias(keys::MODE, WireProperty::batched("mode", Encoding::Plain, Some("set_mode"))),
        alias(keys::AQI, WireProperty::batched("aqi", Encoding::Plain, None)),
        alias(keys::HUMIDITY, WireProperty::batched("humidity", Encoding::Plain, None)),
        alias(keys::TEMPERATURE, WireProperty::batched("temp_dec", Encoding::Tenths, None)),
        alias(keys::FILTER_LEVEL, WireProperty::batched("filter1_life", Encoding::Plain, None)),
        alias(
            keys::CHILD_LOCK,
            WireProperty::batched("child_lock", Encoding::OnOff, Some("set_child_lock")),
        ),
        alias(keys::LED, WireProperty::batched("led", Encoding::OnOff, Some("set_led"))),
        alias(
            keys::BUZZER,
            WireProperty::separate("volume", Encoding::Volume, Some("set_volume")),
        ),
        alias(
            keys::FAVORITE_LEVEL,
            WireProperty::batched("favorite_level", Encoding::Plain, Some("set_level_favorite")),
        ),
    ],
    favorite_level_max: 16,
};

/// Air Purifier 2S.
pub static AIR_PURIFIER_2S: DeviceModel = DeviceModel {
    ids: &["zhimi.airpurifier.ma2"],
    display_name: "Air Purifier 2S",
    aliases: &[
        alias(keys::POWER, WireProperty::batched("power", Encoding::OnOff, Some("set_power"))),
        alias(keys::MODE, WireProperty::batched("mode", Encoding::Plain, Some("set_mode"))),
        alias(keys::AQI, WireProperty::batched("aqi", Encoding::Plain, None)),
        alias(keys::HUMIDITY, WireProperty::batched("humidity", Encoding::Plain, None)),
        alias(keys::TEMPERATURE, WireProperty::batched("temp_dec", Encoding::Tenths, None)),
        alias(keys::FILTER_LEVEL, WireProperty::batched("filter1_life", Encoding::Plain, None)),
        alias(
            keys::CHILD_LOCK,
            WireProperty::batched("child_lock", Encoding::OnOff, Some("set_child_lock")),
        ),
        alias(keys::LED, WireProperty::batched("led", Encoding::OnOff, Some("set_led"))),
        alias(keys::BUZZER, WireProperty::batched("buzzer", Encoding::OnOff, Some("set_buzzer"))),
        alias(
            keys::FAVORITE_LEVEL,
            WireProperty::batched("favorite_level", Encoding::Plain, Some("set_level_favorite")),
        ),
    ],
    favorite_level_max: 16,
};

/// Air Purifier 3 and 3H, which speak MIoT.
pub static AIR_PURIFIER_3: DeviceModel = DeviceModel {
    ids: &["zhimi.airpurifier.ma4", "zhimi.airpurifier.mb3"],
    display_name: "Air Purifier 3",
    aliases: &[
        alias(keys::POWER, WireProperty::miot("power", 2, 2, Encoding::Plain, true)),
        alias(keys::MODE, WireProperty::miot("mode", 2, 5, Encoding::ModeIndex, true)),
        alias(keys::AQI, WireProperty::miot("pm25", 3, 6, Encoding::Plain, false)),
        alias(keys::HUMIDITY, WireProperty::miot("humidity", 3, 7, Encoding::Plain, false)),
        alias(keys::TEMPERATURE, WireProperty::miot("temperature", 3, 8, Encoding::Plain, false)),
        alias(keys::FILTER_LEVEL, WireProperty::miot("filter_life", 4, 3, Encoding::Plain, false)),
        alias(keys::BUZZER, WireProperty::miot("buzzer", 5, 1, Encoding::Plain, true)),
        alias(keys::LED, WireProperty::miot("led", 6, 1, Encoding::LedBrightness, true)),
        alias(keys::CHILD_LOCK, WireProperty::miot("child_lock", 7, 1, Encoding::Plain, true)),
        alias(
            keys::FAVORITE_LEVEL,
            WireProperty::miot("favorite_level", 10, 10, Encoding::Plain, true),
        ),
    ],
    favorite_level_max: 14,
};

/// All built-in models.
pub static MODELS: &[&DeviceModel] = &[
    &AIR_PURIFIER_PRO,
    &AIR_PURIFIER_PRO_V7,
    &AIR_PURIFIER_2S,
    &AIR_PURIFIER_3,
];
