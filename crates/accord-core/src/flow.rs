use crate::error::AccordError;
use crate::types::{CollectionPhase, CollectionState, ContractDocument, DocumentStatus};
use chrono::Utc;

/// Enforces uninitialized->extracting->collecting->finalized, with cancellation from the
/// two working phases.
///
/// `collecting -> collecting` is the re-entry taken on resumption.
pub fn phase_allows(from: CollectionPhase, to: CollectionPhase) -> bool {
    use CollectionPhase::*;
    matches!(
        (from, to),
        (Uninitialized, Extracting)
            | (Extracting, Collecting)
            | (Extracting, Cancelled)
            | (Collecting, Collecting)
            | (Collecting, Finalized)
            | (Collecting, Cancelled)
    )
}

/// Document lifecycle: template, then ready, then exactly one terminal status.
pub fn status_allows(from: DocumentStatus, to: DocumentStatus) -> bool {
    use DocumentStatus::*;
    matches!(
        (from, to),
        (CollectingData, ReadyForSignature)
            | (ReadyForSignature, Signed)
            | (ReadyForSignature, Rejected)
    )
}

/// Move a collection state to `next`, or fail without touching it.
pub fn advance_phase(
    state: &mut CollectionState,
    next: CollectionPhase,
) -> Result<(), AccordError> {
    if !phase_allows(state.phase, next) {
        return Err(AccordError::transition(state.phase.name(), next.name()));
    }
    state.phase = next;
    state.touch();
    Ok(())
}

/// Move a document to `next`, or fail without touching it.
pub fn advance_status(
    document: &mut ContractDocument,
    next: DocumentStatus,
) -> Result<(), AccordError> {
    if !status_allows(document.status, next) {
        return Err(AccordError::transition(document.status.name(), next.name()));
    }
    document.status = next;
    document.updated_at = Utc::now();
    Ok(())
}
