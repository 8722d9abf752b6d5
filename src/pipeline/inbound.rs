use serde_json::Value;

use crate::db::models::{AXIS_COUNT, AXIS_NAMES};
use crate::error::PipelineError;

/// One inbound reading as posted by the device.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundSample {
    pub axes: [f64; AXIS_COUNT],
    /// Label the device computed on its own, if it sent one.
    pub device_label: Option<String>,
}

impl InboundSample {
    /// Parses a JSON object carrying `ax, ay, az, gx, gy, gz` and an optional
    /// `activity` string. Unrecognised keys are ignored.
    pub fn from_json(value: &Value) -> Result<Self, PipelineError> {
        let object = value
            .as_object()
            .ok_or_else(|| PipelineError::InvalidSample("expected a JSON object".into()))?;

        let mut axes = [0.0; AXIS_COUNT];
        for (slot, name) in axes.iter_mut().zip(AXIS_NAMES) {
            let field = object
                .get(name)
                .ok_or_else(|| PipelineError::InvalidSample(format!("missing field `{name}`")))?;
            *slot = field.as_f64().ok_or_else(|| {
                PipelineError::InvalidSample(format!("field `{name}` must be a number"))
            })?;
        }

        let device_label = match object.get("activity") {
            None | Some(Value::Null) => None,
            Some(Value::String(label)) => Some(label.clone()),
            Some(_) => {
                return Err(PipelineError::InvalidSample(
                    "field `activity` must be a string".into(),
                ))
            }
        };

        Ok(Self { axes, device_label })
    }

    pub fn parse_line(line: &str) -> Result<Self, PipelineError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|err| PipelineError::InvalidSample(format!("malformed JSON: {err}")))?;
        Self::from_json(&value)
    }
}
