use crate::error::PropertyError;
use crate::model::WireProperty;
use crate::value::PropertyValue;
use std::collections::HashMap;

/// A property the cache has agreed to track, with its last polled value.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedProperty {
    pub wire: WireProperty,
    /// `None` until the first successful poll which reports the property.
    pub value: Option<PropertyValue>,
}

/// The last known value of each tracked property, in the order the properties were tracked.
#[derive(Clone, Debug, Default)]
pub struct PropertyCache {
    properties: Vec<TrackedProperty>,
}

impl PropertyCache {
    /// Start tracking a property. Tracking the same name again has no effect. Returns whether the
    /// property was newly added.
    pub fn track(&mut self, wire: WireProperty) -> bool {
        if self.is_tracked(wire.name) {
            return false;
        }
        self.properties.push(TrackedProperty { wire, value: None });
        true
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn wire(&self, name: &str) -> Result<&WireProperty, PropertyError> {
        self.find(name)
            .map(|property| &property.wire)
            .ok_or_else(|| PropertyError::NotTracked(name.to_owned()))
    }

    /// The cached value of a tracked property, `None` if it hasn't been polled yet.
    pub fn value(&self, name: &str) -> Result<Option<&PropertyValue>, PropertyError> {
        self.find(name)
            .map(|property| property.value.as_ref())
            .ok_or_else(|| PropertyError::NotTracked(name.to_owned()))
    }

    pub fn properties(&self) -> &[TrackedProperty] {
        &self.properties
    }

    /// Apply a poll response to the cache.
    ///
    /// Returns the properties whose value changed, with their new values, in tracking order.
    /// Every change has been applied by the time this returns. Properties missing from the
    /// response keep their cached value.
    pub fn reconcile(
        &mut self,
        response: &HashMap<&str, PropertyValue>,
    ) -> Vec<(&'static str, PropertyValue)> {
        let staged: Vec<(usize, &PropertyValue)> = self
            .properties
            .iter()
            .enumerate()
            .filter_map(|(index, property)| {
                let new_value = response.get(property.wire.name)?;
                (property.value.as_ref() != Some(new_value)).then_some((index, new_value))
            })
            .collect();

        for (index, new_value) in &staged {
            self.properties[*index].value = Some((*new_value).clone());
        }

        staged
            .into_iter()
            .map(|(index, new_value)| (self.properties[index].wire.name, new_value.clone()))
            .collect()
    }

    fn find(&self, name: &str) -> Option<&TrackedProperty> {
        self.properties
            .iter()
            .find(|property| property.wire.name == name)
    }
}
