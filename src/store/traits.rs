use crate::model::{Run, RunId};
use anyhow::Result;

#[async_trait::async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a run and link every one of its samples to it, atomically.
    ///
    /// Returns the identifier the store generated for the new run. On error
    /// nothing from this call is left behind.
    async fn persist_run(&self, run: &Run) -> Result<RunId>;
}
