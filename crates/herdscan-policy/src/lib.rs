//! herdscan Policy
//!
//! Pure decision functions for the two-stage cascade:
//! - the gate acceptance rule, with its confidence-dependent escalation
//! - the persistence policy deciding which outcomes become scan records
//!
//! Neither performs I/O, so both are testable with literal inputs.

pub mod gate;
pub mod persistence;

pub use gate::{
    decide_gate, GatePolicy, DEFAULT_THRESHOLD, ESCALATED_MIN_PRIMARY, ESCALATION_TRIGGER,
};
pub use persistence::{evaluate_persistence, should_persist, PersistenceDecision};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::gate::{decide_gate, GatePolicy};
    pub use crate::persistence::{should_persist, PersistenceDecision};
}
