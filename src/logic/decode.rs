use crate::model::Sample;

/// Decode a payload that has already passed structural validation.
///
/// A failure here means the validator accepted something the decoder cannot
/// represent, so callers must treat it as an internal error rather than a
/// client one.
pub fn decode_samples(raw: &[u8]) -> Result<Vec<Sample>, serde_json::Error> {
    serde_json::from_slice(raw)
}
