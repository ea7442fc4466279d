//! herdscan Core
//!
//! Core types, traits, and utilities shared across herdscan components.
//!
//! This crate provides:
//! - Result types for the gate/diagnostic cascade
//! - The numerically stable softmax and the two-class probability pair
//! - Error types and result handling
//! - The storage collaborator contract

pub mod error;
pub mod probability;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use probability::{stable_softmax, ClassProbabilities, ProbabilityError};
pub use store::ScanStore;
pub use types::{
    CascadeOutcome, DiagnosisLabel, DiagnosisResult, GateBranch, GateResult, ModelKind, RecordId,
    ScanResponse,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::probability::ClassProbabilities;
    pub use crate::store::ScanStore;
    pub use crate::types::{
        CascadeOutcome, DiagnosisLabel, DiagnosisResult, GateResult, ModelKind, RecordId,
    };
}
