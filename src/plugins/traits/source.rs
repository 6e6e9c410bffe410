use async_trait::async_trait;

use crate::models::{Observation, SourceKind, Target};
use crate::utils::error::Result;

/// Fetches and interprets one target, producing availability observations.
///
/// An `Err` means the target failed for this cycle; the scheduler records
/// it and moves on. An `Ok` with an empty vector is a successful scan of an
/// empty listing.
#[async_trait]
pub trait SourceStrategy: Send + Sync {
    /// Source kind this strategy handles
    fn kind(&self) -> SourceKind;

    async fn fetch_observations(&self, target: &Target) -> Result<Vec<Observation>>;
}
