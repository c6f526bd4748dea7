use crate::model::InstrumentId;

/// Reference entity that every run targets. Rows are seeded at startup and
/// never written by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub instrument_id: InstrumentId,
    pub description: String,
}

impl Instrument {
    pub fn new(instrument_id: InstrumentId, description: impl Into<String>) -> Self {
        Self {
            instrument_id,
            description: description.into(),
        }
    }

    /// The instruments a fresh lab database starts out with.
    pub fn reference_set() -> Vec<Instrument> {
        (1..=3)
            .map(|id| Instrument::new(id, format!("Instrument {}", id)))
            .collect()
    }
}
