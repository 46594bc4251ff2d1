use eyre::{Report, WrapErr};
use miio::{
    DeviceModel, DeviceOptions, ParseTokenError, Token, DEFAULT_CONNECT_RETRY_INTERVAL,
    DEFAULT_MAX_POLL_FAILURES,
};
use serde::{Deserialize as _, Deserializer};
use serde_derive::Deserialize;
use std::fs::read_to_string;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_NAME: &str = "Air Purifier";
const DEFAULT_MODEL: &str = "zhimi.airpurifier.v7";
const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(3000);

/// An error in an otherwise well-formed configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("You must provide the IP address of the air purifier.")]
    MissingIp,
    #[error("You must provide the token of the air purifier.")]
    MissingToken,
    #[error("{0}")]
    InvalidToken(#[from] ParseTokenError),
    #[error("Unsupported air purifier model '{0}'")]
    UnknownModel(String),
    #[error("favorite_level_max must be at least 1")]
    InvalidFavoriteLevelMax,
    #[error("polling_interval_ms must be greater than 0")]
    InvalidPollingInterval,
}

/// The configuration of a single purifier accessory, as read from TOML.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessoryConfig {
    /// The accessory name. Sensor services are named with this as a prefix.
    pub name: String,
    pub ip: Option<IpAddr>,
    /// The 32 hex digit miio token.
    pub token: Option<String>,
    /// The miio model identifier, such as `zhimi.airpurifier.ma4`.
    pub model: String,
    /// The device id to send with MIoT property requests.
    pub did: Option<String>,
    #[serde(
        deserialize_with = "de_duration_millis",
        rename = "polling_interval_ms"
    )]
    pub polling_interval: Duration,
    #[serde(
        deserialize_with = "de_duration_seconds",
        rename = "connect_retry_seconds"
    )]
    pub connect_retry_interval: Duration,
    /// How many polls in a row may fail before reconnecting. 0 to never reconnect.
    pub max_poll_failures: u32,
    /// Overrides the model's highest favorite level, which is 100% rotation speed.
    pub favorite_level_max: Option<u8>,
    pub show_air_quality: bool,
    pub show_temperature: bool,
    pub show_humidity: bool,
    pub enable_led: bool,
    pub enable_buzzer: bool,
}

impl Default for AccessoryConfig {
    fn default() -> AccessoryConfig {
        AccessoryConfig {
            name: DEFAULT_NAME.to_owned(),
            ip: None,
            token: None,
            model: DEFAULT_MODEL.to_owned(),
            did: None,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            connect_retry_interval: DEFAULT_CONNECT_RETRY_INTERVAL,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
            favorite_level_max: None,
            show_air_quality: false,
            show_temperature: false,
            show_humidity: false,
            enable_led: false,
            enable_buzzer: false,
        }
    }
}

impl AccessoryConfig {
    pub fn read(filename: &str) -> Result<AccessoryConfig, Report> {
        let config_file =
            read_to_string(filename).wrap_err_with(|| format!("Reading {}", filename))?;
        toml::from_str(&config_file).wrap_err_with(|| format!("Parsing {}", filename))
    }

    /// Check that everything required is present and resolve the model.
    pub fn validate(&self) -> Result<AccessorySettings, ConfigError> {
        let address = self.ip.ok_or(ConfigError::MissingIp)?;
        let token: Token = self
            .token
            .as_deref()
            .ok_or(ConfigError::MissingToken)?
            .parse()?;
        let model = DeviceModel::find(&self.model)
            .ok_or_else(|| ConfigError::UnknownModel(self.model.clone()))?;
        let favorite_level_max = match self.favorite_level_max {
            Some(0) => return Err(ConfigError::InvalidFavoriteLevelMax),
            Some(max) => max,
            None => model.favorite_level_max,
        };
        if self.polling_interval.is_zero() {
            return Err(ConfigError::InvalidPollingInterval);
        }

        Ok(AccessorySettings {
            name: self.name.clone(),
            address,
            token,
            model,
            favorite_level_max,
            polling_interval: self.polling_interval,
            device_options: DeviceOptions {
                connect_retry_interval: self.connect_retry_interval,
                max_poll_failures: self.max_poll_failures,
                did: self.did.clone(),
            },
            services: OptionalServices {
                air_quality: self.show_air_quality,
                temperature: self.show_temperature,
                humidity: self.show_humidity,
                led: self.enable_led,
                buzzer: self.enable_buzzer,
            },
        })
    }
}

/// Which services beyond the purifier itself the accessory exposes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct OptionalServices {
    pub air_quality: bool,
    pub temperature: bool,
    pub humidity: bool,
    pub led: bool,
    pub buzzer: bool,
}

impl OptionalServices {
    pub fn all() -> Self {
        Self {
            air_quality: true,
            temperature: true,
            humidity: true,
            led: true,
            buzzer: true,
        }
    }
}

/// A validated accessory configuration.
#[derive(Clone, Debug)]
pub struct AccessorySettings {
    pub name: String,
    pub address: IpAddr,
    pub token: Token,
    pub model: &'static DeviceModel,
    pub favorite_level_max: u8,
    pub polling_interval: Duration,
    pub device_options: DeviceOptions,
    pub services: OptionalServices,
}

pub fn de_duration_seconds<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    let seconds = u64::deserialize(d)?;
    Ok(Duration::from_secs(seconds))
}

pub fn de_duration_millis<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    let millis = u64::deserialize(d)?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parsing the example config file should not give any errors.
    #[test]
    fn example_config() {
        let config = AccessoryConfig::read("purifier-homekit.example.toml").unwrap();
        config.validate().unwrap();
    }

    /// Parsing an empty config file should not give any errors.
    #[test]
    fn empty_config() {
        let config = toml::from_str::<AccessoryConfig>("").unwrap();
        assert_eq!(config.name, "Air Purifier");
        assert_eq!(config.model, "zhimi.airpurifier.v7");
        assert_eq!(config.polling_interval, Duration::from_secs(3));
        assert_eq!(config.connect_retry_interval, Duration::from_secs(30));
        assert_eq!(config.max_poll_failures, 3);
    }

    #[test]
    fn unknown_field() {
        assert!(toml::from_str::<AccessoryConfig>("showAirQuality = true").is_err());
    }

    #[test]
    fn missing_ip_and_token() {
        let config = AccessoryConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingIp)));

        let config = toml::from_str::<AccessoryConfig>(r#"ip = "192.168.1.20""#).unwrap();
        let error = config.validate().unwrap_err();
        assert!(matches!(error, ConfigError::MissingToken));
        assert_eq!(
            error.to_string(),
            "You must provide the token of the air purifier."
        );
    }

    #[test]
    fn bad_token() {
        let config = toml::from_str::<AccessoryConfig>(
            r#"
            ip = "192.168.1.20"
            token = "not a token"
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidToken(_))
        ));
    }

    #[test]
    fn full_config() {
        let config = toml::from_str::<AccessoryConfig>(
            r#"
            name = "Bedroom"
            ip = "10.0.0.7"
            token = "00112233445566778899AABBCCDDEEFF"
            model = "zhimi.airpurifier.mb3"
            did = "123456789"
            polling_interval_ms = 5000
            connect_retry_seconds = 10
            max_poll_failures = 5
            show_air_quality = true
            enable_led = true
            "#,
        )
        .unwrap();
        let settings = config.validate().unwrap();

        assert_eq!(settings.name, "Bedroom");
        assert_eq!(settings.address, IpAddr::from([10, 0, 0, 7]));
        assert_eq!(settings.model.display_name, "Air Purifier 3");
        assert_eq!(settings.favorite_level_max, 14);
        assert_eq!(settings.polling_interval, Duration::from_secs(5));
        assert_eq!(
            settings.device_options,
            DeviceOptions {
                connect_retry_interval: Duration::from_secs(10),
                max_poll_failures: 5,
                did: Some("123456789".to_string()),
            }
        );
        assert_eq!(
            settings.services,
            OptionalServices {
                air_quality: true,
                led: true,
                ..OptionalServices::default()
            }
        );
    }

    #[test]
    fn unknown_model() {
        let config = toml::from_str::<AccessoryConfig>(
            r#"
            ip = "10.0.0.7"
            token = "00112233445566778899aabbccddeeff"
            model = "zhimi.airpurifier.m1"
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownModel(model)) if model == "zhimi.airpurifier.m1"
        ));
    }

    #[test]
    fn favorite_level_max_override() {
        let mut config = AccessoryConfig {
            ip: Some(IpAddr::from([10, 0, 0, 7])),
            token: Some("00112233445566778899aabbccddeeff".to_string()),
            favorite_level_max: Some(12),
            ..AccessoryConfig::default()
        };
        assert_eq!(config.validate().unwrap().favorite_level_max, 12);

        config.favorite_level_max = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFavoriteLevelMax)
        ));
    }
}
