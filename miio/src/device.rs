use crate::cache::PropertyCache;
use crate::client::{ClientError, Connector, Session};
use crate::error::{PollError, PropertyError};
use crate::model::WireProperty;
use crate::protocol;
use crate::registry::ChangeRegistry;
use crate::token::Token;
use crate::value::PropertyValue;
use backoff::backoff::Constant;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub const DEFAULT_CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 3;

/// Where the device is in its connection lifecycle.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ConnectionState {
    /// No session, and nothing is currently trying to get one.
    Disconnected,
    /// An attempt to connect is under way.
    Connecting,
    /// We have a session, but no poll has completed on it yet.
    Connected,
    /// The most recent poll succeeded.
    Responding,
    /// The most recent poll failed. The session is kept until enough polls in a row have failed.
    NotResponding,
}

impl ConnectionState {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Responding => "responding",
            Self::NotResponding => "not responding",
        }
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceOptions {
    /// How long to wait between failed connection attempts.
    pub connect_retry_interval: Duration,
    /// After this many polls in a row fail, drop the session and connect again. Zero means never.
    pub max_poll_failures: u32,
    /// The `did` to send in MIoT property calls. Defaults to the property name.
    pub did: Option<String>,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            connect_retry_interval: DEFAULT_CONNECT_RETRY_INTERVAL,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
            did: None,
        }
    }
}

/// At most one poll runs at a time. A poll requested while one is running is folded into a single
/// follow-up poll.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PollSlot {
    Idle,
    Running,
    Pending,
}

struct DeviceState<S> {
    session: Option<Arc<S>>,
    connection: ConnectionState,
    cache: PropertyCache,
    consecutive_failures: u32,
    poll_slot: PollSlot,
}

struct Inner<C: Connector> {
    connector: C,
    address: IpAddr,
    token: Token,
    options: DeviceOptions,
    state: Mutex<DeviceState<C::Session>>,
    registry: Mutex<ChangeRegistry>,
    reconnect: Notify,
}

/// A miio device, with a cache of the properties being tracked on it.
///
/// The cache is only ever updated by polling. Writes go straight to the device, and the new value
/// shows up in the cache once the poll which follows every write has read it back.
///
/// Cloning gives another handle to the same device.
pub struct MiioDevice<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for MiioDevice<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Connector> Debug for MiioDevice<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiioDevice")
            .field("address", &self.inner.address)
            .field("connection", &self.connection_state())
            .finish()
    }
}

impl<C: Connector> MiioDevice<C> {
    /// Create a device handle. Nothing is sent to the device until `connect` or `run` is called.
    pub fn new(connector: C, address: IpAddr, token: Token, options: DeviceOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                address,
                token,
                options,
                state: Mutex::new(DeviceState {
                    session: None,
                    connection: ConnectionState::Disconnected,
                    cache: PropertyCache::default(),
                    consecutive_failures: 0,
                    poll_slot: PollSlot::Idle,
                }),
                registry: Mutex::new(ChangeRegistry::default()),
                reconnect: Notify::new(),
            }),
        }
    }

    pub fn address(&self) -> IpAddr {
        self.inner.address
    }

    pub fn options(&self) -> &DeviceOptions {
        &self.inner.options
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lock_state().connection
    }

    pub fn is_responding(&self) -> bool {
        self.connection_state() == ConnectionState::Responding
    }

    /// Include a property in every subsequent poll. Tracking a property twice has no effect.
    pub fn track_property(&self, wire: WireProperty) {
        if self.lock_state().cache.track(wire) {
            log::trace!("Tracking {} on {}", wire.name, self.inner.address);
        }
    }

    pub fn is_property_tracked(&self, name: &str) -> bool {
        self.lock_state().cache.is_tracked(name)
    }

    /// The cached value of a tracked property. This never talks to the device.
    pub fn get_property(&self, name: &str) -> Result<PropertyValue, PropertyError> {
        let state = self.lock_state();
        let value = state.cache.value(name)?;
        if state.connection != ConnectionState::Responding {
            return Err(PropertyError::NotResponding);
        }
        value
            .cloned()
            .ok_or_else(|| PropertyError::NoValueYet(name.to_owned()))
    }

    /// Ask the device to change a property, then poll to pick up the result.
    ///
    /// This fails for the same reasons as `get_property`, and nothing is sent if the cache already
    /// holds the target value. A failed write is logged but
    /// not returned, as the poll which follows it brings the cache back in line with the device
    /// either way.
    pub async fn set_property(
        &self,
        name: &str,
        target: PropertyValue,
    ) -> Result<(), PropertyError> {
        let (session, call) = {
            let state = self.lock_state();
            let wire = *state.cache.wire(name)?;
            let current = state.cache.value(name)?;
            let session = match (&state.session, state.connection) {
                (Some(session), ConnectionState::Responding) => session.clone(),
                _ => return Err(PropertyError::NotResponding),
            };
            let current = current.ok_or_else(|| PropertyError::NoValueYet(name.to_owned()))?;
            if *current == target {
                log::trace!("{} on {} is already {}", name, self.inner.address, target);
                return Ok(());
            }
            let call = protocol::write_call(&wire, &target, self.inner.options.did.as_deref())?;
            (session, call)
        };

        log::debug!("Setting {} on {} to {}", name, self.inner.address, target);
        if let Err(e) = session.call(call.method, call.params).await {
            log::warn!("Failed to set {} on {}: {}", name, self.inner.address, e);
        }
        self.poll().await;
        Ok(())
    }

    /// Call `callback` with the new value every time a poll finds that the property has changed.
    ///
    /// Callbacks run after the whole poll response has been applied to the cache, and without any
    /// lock held, so they may read other properties from the device.
    pub fn on_change_property<F>(&self, name: &str, callback: F) -> Result<(), PropertyError>
    where
        F: Fn(&PropertyValue) + Send + Sync + 'static,
    {
        let name = self.lock_state().cache.wire(name)?.name;
        self.inner.registry.lock().subscribe(name, Arc::new(callback));
        Ok(())
    }

    /// Keep trying to connect until it works, then poll straight away so the cache is populated.
    pub async fn connect(&self) {
        let inner = &*self.inner;
        let result = backoff::future::retry_notify(
            Constant::new(inner.options.connect_retry_interval),
            move || async move {
                self.set_connection_state(ConnectionState::Connecting);
                inner
                    .connector
                    .connect(inner.address, &inner.token)
                    .await
                    .map_err(backoff::Error::transient)
            },
            move |e: ClientError, retry_in: Duration| {
                log::warn!(
                    "Failed to connect to {}: {}. Retrying in {:?}",
                    inner.address,
                    e,
                    retry_in
                );
                self.set_connection_state(ConnectionState::Disconnected);
            },
        )
        .await;

        match result {
            Ok(session) => {
                {
                    let mut state = self.lock_state();
                    state.session = Some(Arc::new(session));
                    state.connection = ConnectionState::Connected;
                    state.consecutive_failures = 0;
                }
                log::info!("Connected to {}", inner.address);
                self.poll().await;
            }
            // A constant backoff never gives up, but just in case.
            Err(e) => {
                log::error!("Gave up connecting to {}: {}", inner.address, e);
                self.set_connection_state(ConnectionState::Disconnected);
            }
        }
    }

    /// Connect, and connect again whenever the device stops responding. This never returns.
    pub async fn run(&self) {
        loop {
            self.connect().await;
            self.inner.reconnect.notified().await;
            log::info!("Reconnecting to {}", self.inner.address);
        }
    }

    /// Read every tracked property from the device, update the cache, and notify subscribers of
    /// any changes.
    ///
    /// If a poll is already running this doesn't start another one alongside it, but makes sure
    /// one more poll runs after it. Failures are logged, and mark the device as not responding.
    pub async fn poll(&self) {
        {
            let mut state = self.lock_state();
            if state.poll_slot != PollSlot::Idle {
                log::trace!("Poll of {} already running, queueing", self.inner.address);
                state.poll_slot = PollSlot::Pending;
                return;
            }
            state.poll_slot = PollSlot::Running;
        }

        let mut slot = SlotGuard {
            state: &self.inner.state,
            armed: true,
        };
        loop {
            if let Err(e) = self.poll_once().await {
                self.record_poll_failure(e);
            }
            let again = {
                let mut state = self.lock_state();
                if state.poll_slot == PollSlot::Pending {
                    state.poll_slot = PollSlot::Running;
                    true
                } else {
                    state.poll_slot = PollSlot::Idle;
                    false
                }
            };
            if !again {
                slot.armed = false;
                return;
            }
        }
    }

    async fn poll_once(&self) -> Result<(), PollError> {
        let (session, properties) = {
            let state = self.lock_state();
            let session = state.session.clone().ok_or(PollError::NotConnected)?;
            let properties: Vec<WireProperty> = state
                .cache
                .properties()
                .iter()
                .map(|property| property.wire)
                .collect();
            (session, properties)
        };
        // With nothing tracked there is nothing to read, and the session counts as responding.
        let values = if properties.is_empty() {
            HashMap::new()
        } else {
            protocol::read_properties(&*session, &properties, self.inner.options.did.as_deref())
                .await?
        };

        let changes = {
            let mut state = self.lock_state();
            if state.connection != ConnectionState::Responding {
                log::info!("{} is responding", self.inner.address);
            }
            state.connection = ConnectionState::Responding;
            state.consecutive_failures = 0;
            state.cache.reconcile(&values)
        };

        for (name, value) in changes {
            log::debug!("{} on {} changed to {}", name, self.inner.address, value);
            // Clone the registry so callbacks can subscribe without deadlocking.
            let registry = self.inner.registry.lock().clone();
            registry.notify(name, &value);
        }
        Ok(())
    }

    fn record_poll_failure(&self, error: PollError) {
        let error = match error {
            PollError::NotConnected => {
                log::debug!("Not polling {}, no session", self.inner.address);
                self.set_connection_state(ConnectionState::NotResponding);
                return;
            }
            PollError::Client(e) => e,
        };

        let max_failures = self.inner.options.max_poll_failures;
        let (failures, reconnect) = {
            let mut state = self.lock_state();
            state.connection = ConnectionState::NotResponding;
            state.consecutive_failures += 1;
            let failures = state.consecutive_failures;
            let reconnect = max_failures > 0 && failures >= max_failures;
            if reconnect {
                state.session = None;
                state.connection = ConnectionState::Disconnected;
                state.consecutive_failures = 0;
            }
            (failures, reconnect)
        };

        log::warn!(
            "Failed to poll {} ({} in a row): {}",
            self.inner.address,
            failures,
            error
        );
        if reconnect {
            log::warn!(
                "{} stopped responding, dropping session to reconnect",
                self.inner.address
            );
            self.inner.reconnect.notify_one();
        }
    }

    fn set_connection_state(&self, connection: ConnectionState) {
        self.lock_state().connection = connection;
    }

    fn lock_state(&self) -> MutexGuard<'_, DeviceState<C::Session>> {
        self.inner.state.lock()
    }
}

/// Frees the poll slot if a poll is cancelled or panics part way through.
struct SlotGuard<'a, S> {
    state: &'a Mutex<DeviceState<S>>,
    armed: bool,
}

impl<S> Drop for SlotGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            self.state.lock().poll_slot = PollSlot::Idle;
        }
    }
}
