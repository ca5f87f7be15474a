use crate::errors::{Error, Result};
use crate::model::{TelemetryInput, TelemetryRecord, UNKNOWN_DEVICE};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Picks the telemetry fields for a request: a JSON object body wins, the
/// query string is used when the body is empty or carries none of the fields.
pub fn resolve_input(body: &[u8], query: TelemetryInput) -> Result<TelemetryInput> {
    if !body.iter().all(u8::is_ascii_whitespace) {
        let from_body = decode_json_body(body)?;
        if !from_body.is_empty() {
            return Ok(from_body);
        }
    }

    if query.is_empty() {
        return Err(Error::MissingPayload);
    }
    Ok(query)
}

fn decode_json_body(body: &[u8]) -> Result<TelemetryInput> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| Error::Validation(format!("JSON parse error: {}", e)))?;

    let Value::Object(object) = value else {
        return Err(Error::Validation("JSON body must be an object".to_string()));
    };

    Ok(TelemetryInput::new(
        json_field(&object, "device_id")?,
        json_field(&object, "raw")?,
        json_field(&object, "pct")?,
        json_field(&object, "bat")?,
    ))
}

fn json_field(object: &Map<String, Value>, name: &'static str) -> Result<Option<String>> {
    match object.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(Error::InvalidField {
            field: name,
            value: other.to_string(),
            reason: "expected a string or a number".to_string(),
        }),
    }
}

/// Coerces the submitted strings into a table row, defaulting absent fields.
pub fn normalize(
    input: TelemetryInput,
    event_ts: DateTime<Utc>,
    meta_data: &str,
) -> Result<TelemetryRecord> {
    Ok(TelemetryRecord {
        event_ts,
        moisture_raw: parse_int("raw", input.raw.as_deref())?,
        moisture_pct: parse_int("pct", input.pct.as_deref())?,
        battery_volts: parse_float("bat", input.bat.as_deref())?,
        device_id: input
            .device_id
            .unwrap_or_else(|| UNKNOWN_DEVICE.to_string()),
        meta_data: meta_data.to_string(),
    })
}

fn parse_int(field: &'static str, value: Option<&str>) -> Result<i64> {
    let Some(value) = value else {
        return Ok(0);
    };
    value.trim().parse::<i64>().map_err(|e| Error::InvalidField {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_float(field: &'static str, value: Option<&str>) -> Result<f64> {
    let Some(value) = value else {
        return Ok(0.0);
    };
    let parsed = value.trim().parse::<f64>().map_err(|e| Error::InvalidField {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    // Non-finite values have no JSON representation
    if !parsed.is_finite() {
        return Err(Error::InvalidField {
            field,
            value: value.to_string(),
            reason: "value must be finite".to_string(),
        });
    }
    Ok(parsed)
}
