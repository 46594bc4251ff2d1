//! Shapes property reads and writes into miio RPC calls, and interprets the results.

use crate::client::{ClientError, Session};
use crate::error::PropertyError;
use crate::model::{Source, WireProperty};
use crate::value::PropertyValue;
use serde_json::{json, Value};
use std::collections::HashMap;

/// A single RPC call.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Call {
    pub method: &'static str,
    pub params: Vec<Value>,
}

/// Read the current values of the given properties.
///
/// Legacy properties are read with one batched `get_prop` and MIoT properties with one batched
/// `get_properties`. Properties the batched response leaves out are then read one at a time and
/// merged in. Properties the device reports as `null` or with an error code are left out of the
/// result.
pub(crate) async fn read_properties<S: Session + ?Sized>(
    session: &S,
    properties: &[WireProperty],
    did: Option<&str>,
) -> Result<HashMap<&'static str, PropertyValue>, ClientError> {
    let mut values = HashMap::new();

    let batched: Vec<&WireProperty> = properties
        .iter()
        .filter(|p| matches!(p.source, Source::Batched { .. }))
        .collect();
    if !batched.is_empty() {
        let params = batched.iter().map(|p| Value::from(p.name)).collect();
        let response = session.call("get_prop", params).await?;
        log::trace!("get_prop response: {}", response);
        let results = as_array(&response)?;
        if results.len() != batched.len() {
            return Err(ClientError::MalformedResponse(format!(
                "expected {} values from get_prop, got {}",
                batched.len(),
                results.len()
            )));
        }
        for (property, raw) in batched.into_iter().zip(results) {
            insert_decoded(&mut values, property, raw)?;
        }
    }

    let miot: Vec<(&WireProperty, u32, u32)> = properties
        .iter()
        .filter_map(|p| match p.source {
            Source::Miot { siid, piid, .. } => Some((p, siid, piid)),
            _ => None,
        })
        .collect();
    if !miot.is_empty() {
        let params = miot
            .iter()
            .map(|(p, siid, piid)| json!({ "did": did.unwrap_or(p.name), "siid": siid, "piid": piid }))
            .collect();
        let response = session.call("get_properties", params).await?;
        log::trace!("get_properties response: {}", response);
        for entry in as_array(&response)? {
            let siid = entry.get("siid").and_then(Value::as_u64);
            let piid = entry.get("piid").and_then(Value::as_u64);
            let property = miot.iter().find(|(_, s, p)| {
                siid == Some(u64::from(*s)) && piid == Some(u64::from(*p))
            });
            let Some((property, _, _)) = property else {
                log::trace!("Ignoring unrequested property in response: {}", entry);
                continue;
            };
            let code = entry.get("code").and_then(Value::as_i64).unwrap_or(0);
            if code != 0 {
                log::debug!("Device reported code {} for {}", code, property.name);
                continue;
            }
            insert_decoded(
                &mut values,
                property,
                entry.get("value").unwrap_or(&Value::Null),
            )?;
        }
    }

    for property in properties
        .iter()
        .filter(|p| matches!(p.source, Source::Separate { .. }))
    {
        let response = session
            .call("get_prop", vec![Value::from(property.name)])
            .await?;
        let raw = as_array(&response)?.first().ok_or_else(|| {
            ClientError::MalformedResponse(format!("empty get_prop response for {}", property.name))
        })?;
        insert_decoded(&mut values, property, raw)?;
    }

    Ok(values)
}

/// Build the call which sets `property` to `value`.
pub(crate) fn write_call(
    property: &WireProperty,
    value: &PropertyValue,
    did: Option<&str>,
) -> Result<Call, PropertyError> {
    let encoded = property
        .encoding
        .encode(value)
        .ok_or_else(|| PropertyError::InvalidValue {
            property: property.name.to_owned(),
            value: value.to_string(),
        })?;
    match property.source {
        Source::Batched { write: Some(method) } | Source::Separate { write: Some(method) } => {
            Ok(Call {
                method,
                params: vec![encoded],
            })
        }
        Source::Miot {
            siid,
            piid,
            writable: true,
        } => Ok(Call {
            method: "set_properties",
            params: vec![json!({
                "did": did.unwrap_or(property.name),
                "siid": siid,
                "piid": piid,
                "value": encoded,
            })],
        }),
        _ => Err(PropertyError::ReadOnly(property.name.to_owned())),
    }
}

fn as_array(response: &Value) -> Result<&Vec<Value>, ClientError> {
    response
        .as_array()
        .ok_or_else(|| ClientError::MalformedResponse(format!("expected an array, got {}", response)))
}

fn insert_decoded(
    values: &mut HashMap<&'static str, PropertyValue>,
    property: &WireProperty,
    raw: &Value,
) -> Result<(), ClientError> {
    if let Some(value) = property.encoding.decode(raw)? {
        values.insert(property.name, value);
    }
    Ok(())
}
