use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

pub type InstrumentId = i64;
pub type RunId = i64;
pub type SampleId = i64;

/// A unit of work submitted as part of a run. Only the identifier is
/// captured; it is supplied by the caller and is not unique across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sample {
    #[serde(deserialize_with = "deserialize_sample_id")]
    pub id: SampleId,
}

/// JSON Schema counts `1.0` and `1e2` as integers, so the decoder has to as
/// well. Anything with a fractional part or outside `i64` is still rejected.
fn deserialize_sample_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SampleId, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(id) = number.as_i64() {
        return Ok(id);
    }

    match number.as_f64() {
        Some(value)
            if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 =>
        {
            Ok(value as SampleId)
        }
        _ => Err(D::Error::custom(format!(
            "sample id {} is not a 64-bit integer",
            number
        ))),
    }
}

impl Sample {
    pub fn new(id: SampleId) -> Self {
        Self { id }
    }
}

/// Everything needed to record a run on a given lab instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub instrument_id: InstrumentId,
    pub samples: Vec<Sample>,
}

impl Run {
    pub fn new(instrument_id: InstrumentId, samples: Vec<Sample>) -> Self {
        Self {
            instrument_id,
            samples,
        }
    }
}

/// Body returned when a run has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSuccessResponse {
    #[serde(rename = "runId")]
    pub run_id: RunId,
}

/// Body of every 400 response: one human-readable reason per problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrorResponse {
    pub errors: Vec<String>,
}

impl ValidationErrorResponse {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }
}
