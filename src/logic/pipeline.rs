use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::logic::decode::decode_samples;
use crate::logic::validate::{StructuralValidator, Validation};
use crate::model::{InstrumentId, Run, RunId};
use crate::store::traits::RunStore;

pub const INVALID_INSTRUMENT_ID: &str = "Instrument ID in URL must be an integer.";

/// The stages a submission moves through. Every stage but the last can end
/// the request with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    ParsingInstrumentId,
    Validating,
    Decoding,
    Persisting,
    Succeeded,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::ParsingInstrumentId => "parsing instrument id",
            IngestStage::Validating => "validating",
            IngestStage::Decoding => "decoding",
            IngestStage::Persisting => "persisting",
            IngestStage::Succeeded => "succeeded",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{}", INVALID_INSTRUMENT_ID)]
    InvalidInstrumentId,

    #[error("payload failed schema validation: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The validator accepted a payload the decoder could not read. This is
    /// a bug in the schema or the decoder, never the client's fault.
    #[error("validated payload could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to persist run: {0:#}")]
    Store(anyhow::Error),
}

impl IngestError {
    /// Stage at which the submission stopped.
    pub fn stage(&self) -> IngestStage {
        match self {
            IngestError::InvalidInstrumentId => IngestStage::ParsingInstrumentId,
            IngestError::Validation(_) => IngestStage::Validating,
            IngestError::Decode(_) => IngestStage::Decoding,
            IngestError::Store(_) => IngestStage::Persisting,
        }
    }

    /// True when the caller sent something wrong; false for server faults.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IngestError::InvalidInstrumentId | IngestError::Validation(_)
        )
    }

    /// Reasons reported back to the client, if this is a client error.
    pub fn reasons(&self) -> Option<Vec<String>> {
        match self {
            IngestError::InvalidInstrumentId => Some(vec![INVALID_INSTRUMENT_ID.to_string()]),
            IngestError::Validation(reasons) => Some(reasons.clone()),
            _ => None,
        }
    }
}

/// Parse the instrument id path segment as a decimal integer.
pub fn parse_instrument_id(raw: &str) -> Result<InstrumentId, IngestError> {
    raw.parse::<InstrumentId>()
        .map_err(|_| IngestError::InvalidInstrumentId)
}

/// Validates, decodes and persists one batch of samples per call.
///
/// Holds no per-request state; the store and validator are shared and
/// injected at construction.
pub struct IngestionPipeline<S, V> {
    store: Arc<S>,
    validator: Arc<V>,
}

impl<S: RunStore, V: StructuralValidator> IngestionPipeline<S, V> {
    pub fn new(store: Arc<S>, validator: Arc<V>) -> Self {
        Self { store, validator }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn ingest(
        &self,
        raw_instrument_id: &str,
        body: &[u8],
    ) -> Result<RunId, IngestError> {
        let result = self.run_stages(raw_instrument_id, body).await;

        match &result {
            Ok(run_id) => log::debug!(
                "Submission for instrument {} {} with run {}",
                raw_instrument_id,
                IngestStage::Succeeded,
                run_id
            ),
            Err(err) if err.is_client_error() => log::warn!(
                "Rejected submission for instrument {:?} while {}: {}",
                raw_instrument_id,
                err.stage(),
                err
            ),
            Err(err @ IngestError::Decode(_)) => log::error!(
                "BUG: schema and decoder disagree for instrument {}: {}",
                raw_instrument_id,
                err
            ),
            Err(err) => log::error!(
                "Submission for instrument {} failed while {}: {}",
                raw_instrument_id,
                err.stage(),
                err
            ),
        }

        result
    }

    async fn run_stages(&self, raw_instrument_id: &str, body: &[u8]) -> Result<RunId, IngestError> {
        log::debug!("{} {:?}", IngestStage::ParsingInstrumentId, raw_instrument_id);
        let instrument_id = parse_instrument_id(raw_instrument_id)?;

        log::debug!("{} {} byte payload", IngestStage::Validating, body.len());
        if let Validation::Invalid(reasons) = self.validator.validate(body) {
            return Err(IngestError::Validation(reasons));
        }

        log::debug!("{} payload", IngestStage::Decoding);
        let samples = decode_samples(body).map_err(IngestError::Decode)?;

        log::debug!(
            "{} {} samples on instrument {}",
            IngestStage::Persisting,
            samples.len(),
            instrument_id
        );
        let run = Run::new(instrument_id, samples);
        self.store
            .persist_run(&run)
            .await
            .map_err(IngestError::Store)
    }
}
