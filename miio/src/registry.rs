use crate::value::PropertyValue;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A callback invoked with the new value whenever a property changes.
pub type ChangeCallback = Arc<dyn Fn(&PropertyValue) + Send + Sync>;

/// Callbacks interested in changes to each property. There is no way to unsubscribe.
#[derive(Clone, Default)]
pub struct ChangeRegistry {
    subscriptions: Vec<(&'static str, ChangeCallback)>,
}

impl std::fmt::Debug for ChangeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeRegistry")
            .field(
                "subscriptions",
                &self
                    .subscriptions
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ChangeRegistry {
    pub fn subscribe(&mut self, property: &'static str, callback: ChangeCallback) {
        self.subscriptions.push((property, callback));
    }

    /// The callbacks for a property, in the order they were registered.
    pub fn subscribers(&self, property: &str) -> Vec<ChangeCallback> {
        self.subscriptions
            .iter()
            .filter(|(name, _)| *name == property)
            .map(|(_, callback)| callback.clone())
            .collect()
    }

    /// Invoke every callback registered for `property`.
    pub fn notify(&self, property: &str, value: &PropertyValue) {
        deliver(property, value, &self.subscribers(property));
    }
}

/// Invoke each callback in turn. A callback which panics is logged and skipped, so it doesn't stop
/// the rest from running.
fn deliver(property: &str, value: &PropertyValue, callbacks: &[ChangeCallback]) {
    for callback in callbacks {
        if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
            log::error!("Change callback for {} panicked on value {}", property, value);
        }
    }
}
