use anyhow::{anyhow, Context, Result};
use jsonschema::{Draft, Validator};
use serde_json::{json, Value};
use std::path::Path;

/// Reason reported when the payload is not JSON at all.
pub const MALFORMED_JSON: &str = "Malformed JSON";

/// Upper bound on the number of samples in one run unless configured otherwise.
pub const DEFAULT_MAX_SAMPLES: usize = 10;

/// Outcome of checking a payload against a structural schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// One reason per violation, in the order the checker reported them.
    Invalid(Vec<String>),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// Anything that can accept or reject a raw request payload before it is
/// decoded. Implementations must be pure: the same bytes always produce the
/// same result.
pub trait StructuralValidator: Send + Sync {
    fn validate(&self, raw: &[u8]) -> Validation;
}

/// Validator backed by a compiled JSON Schema document.
pub struct JsonSchemaValidator {
    schema: Validator,
}

impl JsonSchemaValidator {
    /// Compile a schema document. The draft is taken from its `$schema`
    /// keyword; documents without one are treated as Draft 7.
    pub fn compile(schema: &Value) -> Result<Self> {
        let mut options = jsonschema::options();
        if schema.get("$schema").is_none() {
            options = options.with_draft(Draft::Draft7);
        }
        let schema = options
            .build(schema)
            .map_err(|err| anyhow!("invalid JSON schema: {}", err))?;

        Ok(Self { schema })
    }

    /// Read and compile a schema file, e.g. `json-schemas/samples.json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file {}", path.display()))?;
        let document: Value = serde_json::from_str(&contents)
            .with_context(|| format!("Schema file {} is not valid JSON", path.display()))?;

        Self::compile(&document)
            .with_context(|| format!("Failed to compile schema file {}", path.display()))
    }

    /// The samples schema: a non-empty array of at most `max_samples`
    /// objects, each carrying exactly one integer `id`.
    pub fn samples(max_samples: usize) -> Result<Self> {
        Self::compile(&samples_schema(max_samples))
    }
}

impl StructuralValidator for JsonSchemaValidator {
    fn validate(&self, raw: &[u8]) -> Validation {
        let instance: Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            Err(_) => return Validation::Invalid(vec![MALFORMED_JSON.to_string()]),
        };

        let errors: Vec<String> = self
            .schema
            .iter_errors(&instance)
            .map(|err| err.to_string())
            .collect();

        if errors.is_empty() {
            Validation::Valid
        } else {
            Validation::Invalid(errors)
        }
    }
}

/// Build the samples schema document for a given batch size bound.
pub fn samples_schema(max_samples: usize) -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Samples",
        "type": "array",
        "minItems": 1,
        "maxItems": max_samples,
        "items": {
            "type": "object",
            "properties": {
                "id": {
                    "type": "integer",
                    "minimum": i64::MIN,
                    "maximum": i64::MAX
                }
            },
            "required": ["id"],
            "additionalProperties": false
        }
    })
}
