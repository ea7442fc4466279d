//! Decides whether a cascade outcome becomes a durable scan record
//!
//! Only actionable findings are recorded: a positive diagnosis on a scan
//! that references a known subject. Gate rejections and healthy scans are
//! returned to the caller but never written.

use herdscan_core::CascadeOutcome;
use serde::{Deserialize, Serialize};

/// Outcome of the persistence policy, with the reason when skipping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceDecision {
    Persist,
    SkipNoSubject,
    SkipGateRejected,
    SkipNegativeDiagnosis,
}

impl PersistenceDecision {
    pub fn should_persist(&self) -> bool {
        matches!(self, Self::Persist)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persist => "persist",
            Self::SkipNoSubject => "skip_no_subject",
            Self::SkipGateRejected => "skip_gate_rejected",
            Self::SkipNegativeDiagnosis => "skip_negative_diagnosis",
        }
    }
}

/// Evaluate the persistence rule, keeping the reason
pub fn evaluate_persistence(
    outcome: &CascadeOutcome,
    has_subject_reference: bool,
) -> PersistenceDecision {
    if !has_subject_reference {
        return PersistenceDecision::SkipNoSubject;
    }

    match &outcome.diagnosis {
        None => PersistenceDecision::SkipGateRejected,
        Some(diagnosis) if diagnosis.is_positive() => PersistenceDecision::Persist,
        Some(_) => PersistenceDecision::SkipNegativeDiagnosis,
    }
}

/// Persist iff a subject reference was supplied and the diagnosis is positive
pub fn should_persist(outcome: &CascadeOutcome, has_subject_reference: bool) -> bool {
    evaluate_persistence(outcome, has_subject_reference).should_persist()
}
