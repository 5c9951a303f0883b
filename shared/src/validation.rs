//! Strict schema validation for inbound structures
//!
//! Every type that crosses the adapter boundary implements [`Validate`].
//! Validation collects one message per violated field instead of stopping at
//! the first problem, and never has side effects. A [`ValidationError`] is
//! never worth retrying.

use crate::limits;
use crate::model::{
    AllowedValue, DeviceMetadata, OperatorSignature, SimulationConfig, StreamDataType,
    TelemetryEnvelope, TelemetryPayload, TelemetryStream, TelemetryValue,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Display;
use std::sync::LazyLock;
use thiserror::Error;

/// Device and operator identifiers: upper-case letters, digits and dashes
pub static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9-]+$").expect("identifier pattern is valid"));

/// Telemetry stream names: lower-case letters and underscores
pub static STREAM_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_]+$").expect("stream name pattern is valid"));

/// Schema violation, one message per offending field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Validation failed [{context}]: {}", .violations.join("; "))]
pub struct ValidationError {
    pub context: &'static str,
    pub violations: Vec<String>,
}

impl ValidationError {
    /// Create an error carrying a single violation
    pub fn single(context: &'static str, message: impl Into<String>) -> Self {
        Self {
            context,
            violations: vec![message.into()],
        }
    }
}

/// Accumulates violations while a structure is checked
#[derive(Debug, Default)]
pub struct Violations {
    items: Vec<String>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation for `path`
    pub fn push(&mut self, path: &str, message: impl Display) {
        self.items.push(format!("{}: {}", path, message));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Require `value` to match `pattern`
    pub fn check_pattern(&mut self, path: &str, value: &str, pattern: &Regex) {
        if !pattern.is_match(value) {
            self.push(path, format!("must match pattern {}", pattern.as_str()));
        }
    }

    /// Require a character count within `min..=max`
    pub fn check_length(&mut self, path: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min {
            self.push(path, format!("length must be at least {} characters", min));
        } else if len > max {
            self.push(
                path,
                format!("length must be less than or equal to {} characters", max),
            );
        }
    }

    /// Check an optional string; present values must be non-empty and at most `max` long
    pub fn check_optional_length(&mut self, path: &str, value: Option<&str>, max: usize) {
        if let Some(value) = value {
            self.check_length(path, value, 1, max);
        }
    }

    /// Require every item of a collection to be a non-empty string
    pub fn check_items<'a>(&mut self, path: &str, items: impl IntoIterator<Item = &'a String>) {
        for (index, item) in items.into_iter().enumerate() {
            if item.is_empty() {
                self.push(&format!("{}[{}]", path, index), "is not allowed to be empty");
            }
        }
    }

    /// Require `value` to lie within `min..=max`
    pub fn check_range<T>(&mut self, path: &str, value: T, min: T, max: T)
    where
        T: PartialOrd + Display + Copy,
    {
        if value < min {
            self.push(path, format!("must be greater than or equal to {}", min));
        } else if value > max {
            self.push(path, format!("must be less than or equal to {}", max));
        }
    }

    /// Require a finite float within `min..=max`
    pub fn check_unit_interval(&mut self, path: &str, value: f64) {
        if !value.is_finite() {
            self.push(path, "must be a finite number");
        } else {
            self.check_range(path, value, 0.0, 1.0);
        }
    }

    /// Turn the collected violations into a result
    pub fn finish(self, context: &'static str) -> Result<(), ValidationError> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                context,
                violations: self.items,
            })
        }
    }
}

/// Implemented by every structure with a fixed schema
pub trait Validate {
    /// Name used in error messages
    const CONTEXT: &'static str;

    /// Record every violation of the schema
    fn collect_violations(&self, violations: &mut Violations);

    /// Check the structure against its schema
    fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Violations::new();
        self.collect_violations(&mut violations);
        violations.finish(Self::CONTEXT)
    }
}

/// Deserialize untyped JSON into `T`, rejecting unknown fields, then validate it
pub fn parse_strict<T>(value: Value) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(value)
        .map_err(|err| ValidationError::single(T::CONTEXT, err.to_string()))?;
    parsed.validate()?;
    Ok(parsed)
}

impl Validate for DeviceMetadata {
    const CONTEXT: &'static str = "DeviceMetadata";

    fn collect_violations(&self, v: &mut Violations) {
        v.check_pattern("deviceId", &self.device_id, &IDENTIFIER_PATTERN);
        v.check_length("vendorName", &self.vendor_name, 2, 100);
        v.check_length("modelNumber", &self.model_number, 2, 50);
        v.check_length("serialNumber", &self.serial_number, 2, 50);

        if self.capabilities.is_empty() {
            v.push("capabilities", "must contain at least 1 items");
        }
        v.check_items("capabilities", &self.capabilities);
        v.check_items("telemetryStreams", &self.telemetry_streams);
        if let Some(command_types) = &self.command_types {
            v.check_items("commandTypes", command_types);
        }
        v.check_optional_length("location", self.location.as_deref(), 200);

        if let Some(window) = &self.maintenance_window {
            v.check_range("maintenanceWindow.startHour", window.start_hour, 0, 23);
            v.check_range("maintenanceWindow.endHour", window.end_hour, 0, 23);
        }
    }
}

impl Validate for TelemetryPayload {
    const CONTEXT: &'static str = "TelemetryPayload";

    fn collect_violations(&self, v: &mut Violations) {
        if let TelemetryValue::Numeric(value) = self.value {
            if !value.is_finite() {
                v.push("value", "must be a finite number");
            }
        }
        v.check_optional_length("unit", self.unit.as_deref(), 50);
        v.check_optional_length("sensorId", self.sensor_id.as_deref(), 100);
        if let Some(confidence) = self.confidence {
            v.check_unit_interval("confidence", confidence);
        }
        v.check_items("derivedFrom", &self.derived_from);
    }
}

impl Validate for OperatorSignature {
    const CONTEXT: &'static str = "OperatorSignature";

    fn collect_violations(&self, v: &mut Violations) {
        v.check_pattern("operatorId", &self.operator_id, &IDENTIFIER_PATTERN);
        v.check_optional_length("operatorName", self.operator_name.as_deref(), 100);
        v.check_length(
            "signature",
            &self.signature,
            limits::MIN_SIGNATURE_LENGTH,
            usize::MAX,
        );
        v.check_optional_length("reason", self.reason.as_deref(), 500);
    }
}

impl Validate for TelemetryStream {
    const CONTEXT: &'static str = "TelemetryStream";

    fn collect_violations(&self, v: &mut Violations) {
        v.check_pattern("streamName", &self.stream_name, &STREAM_NAME_PATTERN);
        v.check_optional_length("unit", self.unit.as_deref(), 50);
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                v.push("minValue", "must be less than or equal to maxValue");
            } else if !(max - min).is_finite() {
                v.push("maxValue", "range from minValue must be finite");
            }
        }
    }
}

impl Validate for SimulationConfig {
    const CONTEXT: &'static str = "SimulationConfig";

    fn collect_violations(&self, v: &mut Violations) {
        if self.duration < 1000 {
            v.push("duration", "must be greater than or equal to 1000");
        }
        if self.telemetry_interval < 100 {
            v.push("telemetryInterval", "must be greater than or equal to 100");
        }
        if let Some(rate) = self.failure_rate {
            v.check_unit_interval("failureRate", rate);
        }
    }
}

impl Validate for TelemetryEnvelope {
    const CONTEXT: &'static str = "TelemetryEnvelope";

    fn collect_violations(&self, v: &mut Violations) {
        v.check_pattern("deviceId", &self.device_id, &IDENTIFIER_PATTERN);
        v.check_pattern("streamName", &self.stream_name, &STREAM_NAME_PATTERN);
        self.payload.collect_violations(v);
    }
}

/// Check a reading against the definition of the stream it was pushed to
pub fn validate_telemetry_against_stream(
    payload: &TelemetryPayload,
    stream: &TelemetryStream,
) -> Result<(), ValidationError> {
    let mut v = Violations::new();

    let type_matches = match stream.data_type {
        StreamDataType::Numeric => matches!(payload.value, TelemetryValue::Numeric(_)),
        StreamDataType::String => matches!(payload.value, TelemetryValue::Text(_)),
        StreamDataType::Boolean => matches!(payload.value, TelemetryValue::Flag(_)),
        StreamDataType::Json => true,
    };
    if !type_matches {
        v.push(
            "value",
            format!(
                "{} value does not match stream {} of type {:?}",
                payload.value.kind(),
                stream.stream_name,
                stream.data_type
            ),
        );
    }

    if let TelemetryValue::Numeric(value) = payload.value {
        if let Some(min) = stream.min_value {
            if value < min {
                v.push("value", format!("must be greater than or equal to {}", min));
            }
        }
        if let Some(max) = stream.max_value {
            if value > max {
                v.push("value", format!("must be less than or equal to {}", max));
            }
        }
    }

    if let Some(allowed) = &stream.allowed_values {
        let permitted = allowed.iter().any(|candidate| match (candidate, &payload.value) {
            (AllowedValue::Number(a), TelemetryValue::Numeric(b)) => a == b,
            (AllowedValue::Text(a), TelemetryValue::Text(b)) => a == b,
            _ => false,
        });
        if !permitted {
            v.push("value", "is not one of the allowed values");
        }
    }

    v.finish("TelemetryStream")
}
