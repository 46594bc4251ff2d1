use crate::client::Connector;
use crate::device::{DeviceOptions, MiioDevice};
use crate::error::PropertyError;
use crate::model::{keys, DeviceModel, WireProperty};
use crate::token::Token;
use crate::value::PropertyValue;
use std::fmt::{self, Debug, Formatter};
use std::net::IpAddr;

/// Convert a favorite level to a rotation speed percentage.
pub fn level_to_speed(level: f64, favorite_level_max: u8) -> u8 {
    let speed = (level / f64::from(favorite_level_max) * 100.0).round();
    speed.clamp(0.0, 100.0) as u8
}

/// Convert a rotation speed percentage to the nearest favorite level.
pub fn speed_to_level(speed: f64, favorite_level_max: u8) -> i64 {
    (speed.clamp(0.0, 100.0) / 100.0 * f64::from(favorite_level_max)).round() as i64
}

/// An air purifier, addressed by the property keys in [`keys`] rather than by wire names.
///
/// All properties in the model's table are tracked as soon as the purifier is created.
pub struct AirPurifier<C: Connector> {
    device: MiioDevice<C>,
    model: &'static DeviceModel,
    favorite_level_max: u8,
}

impl<C: Connector> Clone for AirPurifier<C> {
    fn clone(&self) -> Self {
        Self {
            device: self.device.clone(),
            model: self.model,
            favorite_level_max: self.favorite_level_max,
        }
    }
}

impl<C: Connector> Debug for AirPurifier<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AirPurifier")
            .field("model", &self.model.display_name)
            .field("device", &self.device)
            .finish()
    }
}

impl<C: Connector> AirPurifier<C> {
    pub fn new(
        connector: C,
        address: IpAddr,
        token: Token,
        model: &'static DeviceModel,
        options: DeviceOptions,
    ) -> Self {
        let device = MiioDevice::new(connector, address, token, options);
        for alias in model.aliases {
            device.track_property(alias.wire);
        }
        Self {
            device,
            model,
            favorite_level_max: model.favorite_level_max,
        }
    }

    /// Use a different top favorite level for speed conversion than the model's default.
    pub fn with_favorite_level_max(mut self, favorite_level_max: u8) -> Self {
        if favorite_level_max == 0 {
            log::warn!(
                "Ignoring favorite_level_max of 0, keeping {}",
                self.favorite_level_max
            );
        } else {
            self.favorite_level_max = favorite_level_max;
        }
        self
    }

    pub fn device(&self) -> &MiioDevice<C> {
        &self.device
    }

    pub fn model(&self) -> &'static DeviceModel {
        self.model
    }

    pub fn favorite_level_max(&self) -> u8 {
        self.favorite_level_max
    }

    /// Whether the model has a property for the given key.
    pub fn has(&self, key: &str) -> bool {
        self.model.alias(key).is_some()
    }

    pub fn get(&self, key: &str) -> Result<PropertyValue, PropertyError> {
        self.device.get_property(self.wire(key)?.name)
    }

    pub async fn set(
        &self,
        key: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), PropertyError> {
        let name = self.wire(key)?.name;
        self.device.set_property(name, value.into()).await
    }

    pub fn on_change<F>(&self, key: &str, callback: F) -> Result<(), PropertyError>
    where
        F: Fn(&PropertyValue) + Send + Sync + 'static,
    {
        self.device.on_change_property(self.wire(key)?.name, callback)
    }

    /// The current favorite level as a rotation speed percentage.
    pub fn get_speed(&self) -> Result<u8, PropertyError> {
        let level = self.get(keys::FAVORITE_LEVEL)?;
        let level = level
            .as_f64()
            .ok_or_else(|| PropertyError::InvalidValue {
                property: keys::FAVORITE_LEVEL.to_owned(),
                value: level.to_string(),
            })?;
        Ok(level_to_speed(level, self.favorite_level_max))
    }

    /// Set the favorite level closest to the given rotation speed percentage.
    pub async fn set_speed(&self, speed: f64) -> Result<(), PropertyError> {
        if !(0.0..=100.0).contains(&speed) {
            return Err(PropertyError::InvalidValue {
                property: "speed".to_owned(),
                value: speed.to_string(),
            });
        }
        let level = speed_to_level(speed, self.favorite_level_max);
        log::debug!("Speed {}% is favorite level {}", speed, level);
        self.set(keys::FAVORITE_LEVEL, level).await
    }

    fn wire(&self, key: &str) -> Result<&'static WireProperty, PropertyError> {
        self.model
            .alias(key)
            .ok_or_else(|| PropertyError::UnknownProperty(key.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AIR_PURIFIER_3, AIR_PURIFIER_PRO_V7};
    use crate::testing::FakeDevice;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn purifier(fake: &FakeDevice, model: &'static DeviceModel) -> AirPurifier<FakeDevice> {
        AirPurifier::new(
            fake.clone(),
            IpAddr::from([192, 168, 1, 21]),
            "ffeeddccbbaa99887766554433221100".parse().unwrap(),
            model,
            DeviceOptions::default(),
        )
    }

    #[test]
    fn speed_conversion() {
        assert_eq!(speed_to_level(50.0, 16), 8);
        assert_eq!(level_to_speed(8.0, 16), 50);
        assert_eq!(speed_to_level(100.0, 14), 14);
        assert_eq!(level_to_speed(14.0, 14), 100);
        assert_eq!(speed_to_level(0.0, 16), 0);
    }

    #[test]
    fn speed_round_trip_is_close() {
        for max in [14, 16] {
            for speed in 0..=100 {
                let back = level_to_speed(speed_to_level(f64::from(speed), max) as f64, max);
                let error = (f64::from(back) - f64::from(speed)).abs();
                // Half a level, plus rounding the percentage.
                assert!(
                    error <= 50.0 / f64::from(max) + 0.5,
                    "{} -> {} at max {}",
                    speed,
                    back,
                    max
                );
            }
        }
        assert_eq!(speed_to_level(25.0, 14), 4);
        assert_eq!(level_to_speed(4.0, 14), 29);
    }

    #[test]
    fn sixteenths_round_trip_exactly() {
        for step in 0..=16 {
            let speed = f64::from(step) * 6.25;
            let level = speed_to_level(speed, 16);
            assert_eq!(level, i64::from(step));
            assert_eq!(level_to_speed(level as f64, 16), speed.round() as u8, "{}", speed);
        }
    }

    #[tokio::test]
    async fn tracks_every_alias() {
        let fake = FakeDevice::air_purifier_pro_v7();
        let purifier = purifier(&fake, &AIR_PURIFIER_PRO_V7);
        for alias in AIR_PURIFIER_PRO_V7.aliases {
            assert!(purifier.device().is_property_tracked(alias.wire.name));
        }
    }

    #[tokio::test]
    async fn get_by_key() {
        let fake = FakeDevice::air_purifier_pro_v7();
        let purifier = purifier(&fake, &AIR_PURIFIER_PRO_V7);
        purifier.device().connect().await;

        assert_eq!(purifier.get(keys::TEMPERATURE), Ok(PropertyValue::Float(21.5)));
        assert_eq!(purifier.get(keys::FILTER_LEVEL), Ok(PropertyValue::Integer(80)));
        assert_eq!(purifier.get(keys::BUZZER), Ok(PropertyValue::Bool(true)));
        assert_eq!(purifier.get_speed(), Ok(50));
    }

    #[tokio::test]
    async fn unknown_key() {
        let fake = FakeDevice::air_purifier_pro_v7();
        let purifier = purifier(&fake, &AIR_PURIFIER_PRO_V7);
        purifier.device().connect().await;

        let unknown = PropertyError::UnknownProperty("speed".to_string());
        assert_eq!(purifier.get("speed"), Err(unknown.clone()));
        assert_eq!(purifier.set("speed", 3).await, Err(unknown.clone()));
        assert_eq!(
            purifier.on_change("speed", |_: &PropertyValue| {}),
            Err(unknown)
        );
        // The wire name isn't a key.
        assert!(purifier.get("temp_dec").is_err());
    }

    #[tokio::test]
    async fn set_speed_writes_favorite_level() {
        let fake = FakeDevice::air_purifier_pro_v7();
        let purifier = purifier(&fake, &AIR_PURIFIER_PRO_V7);
        purifier.device().connect().await;
        fake.clear_calls();

        purifier.set_speed(75.0).await.unwrap();

        assert_eq!(
            fake.calls()[0],
            ("set_level_favorite".to_string(), vec![json!(12)])
        );
        assert_eq!(purifier.get_speed(), Ok(75));
    }

    #[tokio::test]
    async fn set_speed_out_of_range() {
        let fake = FakeDevice::air_purifier_pro_v7();
        let purifier = purifier(&fake, &AIR_PURIFIER_PRO_V7);
        purifier.device().connect().await;
        fake.clear_calls();

        assert!(matches!(
            purifier.set_speed(150.0).await,
            Err(PropertyError::InvalidValue { .. })
        ));
        assert!(purifier.set_speed(f64::NAN).await.is_err());
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn favorite_level_max_override() {
        let fake = FakeDevice::air_purifier_pro_v7();
        let purifier = purifier(&fake, &AIR_PURIFIER_PRO_V7).with_favorite_level_max(10);
        purifier.device().connect().await;

        assert_eq!(purifier.favorite_level_max(), 10);
        assert_eq!(purifier.get_speed(), Ok(80));
    }

    #[tokio::test]
    async fn miot_model() {
        let fake = FakeDevice::air_purifier_3();
        let purifier = purifier(&fake, &AIR_PURIFIER_3);
        let modes = Arc::new(Mutex::new(vec![]));
        {
            let modes = modes.clone();
            purifier
                .on_change(keys::MODE, move |value: &PropertyValue| {
                    modes.lock().unwrap().push(value.to_string())
                })
                .unwrap();
        }
        purifier.device().connect().await;

        assert_eq!(purifier.get(keys::AQI), Ok(PropertyValue::Integer(8)));
        assert_eq!(purifier.get(keys::LED), Ok(PropertyValue::Bool(false)));
        assert_eq!(purifier.get_speed(), Ok(50));

        fake.clear_calls();
        purifier.set(keys::MODE, "favorite").await.unwrap();

        assert_eq!(fake.calls()[0].0, "set_properties");
        assert_eq!(
            fake.calls()[0].1,
            vec![json!({ "did": "mode", "siid": 2, "piid": 5, "value": 2 })]
        );
        assert_eq!(*modes.lock().unwrap(), vec!["auto", "favorite"]);
    }
}
