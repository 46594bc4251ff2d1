//! A scripted in-memory purifier, standing in for both the connector and the session.

use crate::client::{ClientError, Connector, Session};
use crate::token::Token;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub(crate) const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct FakeState {
    legacy: HashMap<String, Value>,
    miot: HashMap<(u64, u64), Value>,
    miot_errors: HashSet<(u64, u64)>,
    calls: Vec<(String, Vec<Value>)>,
    connects: usize,
    failing_connects: usize,
    failing: bool,
    truncated: bool,
    ignore_writes: bool,
    failing_method: Option<String>,
    delay: Option<Duration>,
    connect_delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeDevice {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDevice {
    pub fn air_purifier_pro_v7() -> Self {
        let device = FakeDevice::default();
        for (name, value) in [
            ("power", json!("on")),
            ("mode", json!("auto")),
            ("aqi", json!(8)),
            ("humidity", json!(40)),
            ("temp_dec", json!(215)),
            ("filter1_life", json!(80)),
            ("child_lock", json!("off")),
            ("led", json!("on")),
            ("volume", json!(50)),
            ("favorite_level", json!(8)),
        ] {
            device.set_legacy(name, value);
        }
        device
    }

    pub fn air_purifier_3() -> Self {
        let device = FakeDevice::default();
        {
            let mut state = device.lock();
            for ((siid, piid), value) in [
                ((2, 2), json!(true)),
                ((2, 5), json!(0)),
                ((3, 6), json!(8)),
                ((3, 7), json!(40)),
                ((3, 8), json!(21.5)),
                ((4, 3), json!(80)),
                ((5, 1), json!(true)),
                ((6, 1), json!(2)),
                ((7, 1), json!(false)),
                ((10, 10), json!(7)),
            ] {
                state.miot.insert((siid, piid), value);
            }
        }
        device
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn set_legacy(&self, name: &str, value: Value) {
        self.lock().legacy.insert(name.to_string(), value);
    }

    pub fn set_miot_error(&self, siid: u64, piid: u64) {
        self.lock().miot_errors.insert((siid, piid));
    }

    /// Make every call fail with a timeout.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Accept writes without changing any values.
    pub fn set_ignore_writes(&self, ignore: bool) {
        self.lock().ignore_writes = ignore;
    }

    /// Make calls to one method fail with a device error.
    pub fn fail_method(&self, method: &str) {
        self.lock().failing_method = Some(method.to_string());
    }

    pub fn set_get_prop_truncated(&self, truncated: bool) {
        self.lock().truncated = truncated;
    }

    /// Delay every call by the given duration before answering it.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Delay every connection attempt by the given duration before it succeeds or fails.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.lock().connect_delay = Some(delay);
    }

    pub fn fail_connects(&self, count: usize) {
        self.lock().failing_connects = count;
    }

    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|(m, _)| m == method).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

fn legacy_setter(method: &str) -> Option<&'static str> {
    Some(match method {
        "set_power" => "power",
        "set_mode" => "mode",
        "set_led" => "led",
        "set_buzzer" => "buzzer",
        "set_volume" => "volume",
        "set_child_lock" => "child_lock",
        "set_level_favorite" => "favorite_level",
        _ => return None,
    })
}

fn siid_piid(param: &Value) -> (u64, u64) {
    (
        param["siid"].as_u64().unwrap_or_default(),
        param["piid"].as_u64().unwrap_or_default(),
    )
}

#[async_trait]
impl Session for FakeDevice {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, ClientError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push((method.to_string(), params.clone()));
            if state.failing {
                return Err(ClientError::Timeout(TIMEOUT));
            }
            if state.failing_method.as_deref() == Some(method) {
                return Err(ClientError::Device {
                    code: -5001,
                    message: "command error".to_string(),
                });
            }
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        match method {
            "get_prop" => {
                let mut values: Vec<Value> = params
                    .iter()
                    .map(|name| {
                        let name = name.as_str().unwrap_or_default();
                        state.legacy.get(name).cloned().unwrap_or(Value::Null)
                    })
                    .collect();
                if state.truncated {
                    values.pop();
                }
                Ok(Value::Array(values))
            }
            "get_properties" => Ok(Value::Array(
                params
                    .iter()
                    .map(|param| {
                        let key = siid_piid(param);
                        if state.miot_errors.contains(&key) {
                            json!({ "did": param["did"], "siid": key.0, "piid": key.1, "code": -4001 })
                        } else {
                            json!({
                                "did": param["did"],
                                "siid": key.0,
                                "piid": key.1,
                                "code": 0,
                                "value": state.miot.get(&key).cloned().unwrap_or(Value::Null),
                            })
                        }
                    })
                    .collect(),
            )),
            "set_properties" => {
                if state.ignore_writes {
                    return Ok(json!([{ "code": 0 }]));
                }
                for param in &params {
                    state.miot.insert(siid_piid(param), param["value"].clone());
                }
                Ok(json!([{ "code": 0 }]))
            }
            method => match (legacy_setter(method), params.first()) {
                (Some(_), Some(_)) if state.ignore_writes => Ok(json!(["ok"])),
                (Some(name), Some(value)) => {
                    state.legacy.insert(name.to_string(), value.clone());
                    Ok(json!(["ok"]))
                }
                _ => Err(ClientError::Device {
                    code: -32601,
                    message: "Method not found".to_string(),
                }),
            },
        }
    }
}

#[async_trait]
impl Connector for FakeDevice {
    type Session = FakeDevice;

    async fn connect(&self, _address: IpAddr, _token: &Token) -> Result<FakeDevice, ClientError> {
        let delay = self.lock().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.connects += 1;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(ClientError::Timeout(TIMEOUT));
        }
        Ok(self.clone())
    }
}
