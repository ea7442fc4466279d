//! Outbound contract to the scan record storage collaborator

use crate::error::Result;
use crate::types::{CascadeOutcome, RecordId};

/// Durable, append-only sink for actionable scan outcomes.
///
/// Called only after the persistence policy says yes. Writes are
/// fire-and-commit: the caller never reads back what was stored.
pub trait ScanStore: Send + Sync {
    /// Persist a snapshot of `outcome` for the requesting principal
    fn persist(
        &self,
        outcome: &CascadeOutcome,
        requester_id: &str,
        subject_id: Option<&str>,
    ) -> Result<RecordId>;
}
