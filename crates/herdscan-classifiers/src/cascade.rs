//! Two-stage cascade: gate model, gate rule, then the diagnostic model
//!
//! The input is preprocessed once and the same tensor feeds both stages. The
//! diagnostic model is neither loaded nor invoked unless the gate passes.

use crate::cache::ModelProvider;
use crate::preprocess::{preprocess, ImageTensor};
use crate::scoring::score;
use herdscan_core::{
    CascadeOutcome, ClassProbabilities, DiagnosisLabel, DiagnosisResult, Error, RecordId, Result,
    ScanResponse, ScanStore,
};
use herdscan_policy::{evaluate_persistence, GatePolicy, PersistenceDecision};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Cascade result plus what happened on the persistence side
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub outcome: CascadeOutcome,
    pub persistence: PersistenceDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
}

impl ScanReport {
    pub fn to_response(&self) -> ScanResponse {
        self.outcome.to_response()
    }
}

/// Label a diagnostic probability pair `[negative, positive]`.
///
/// Positive requires a strict win; a tie is negative.
pub fn diagnose(probabilities: ClassProbabilities, labels: [&str; 2]) -> DiagnosisResult {
    let negative = probabilities.primary();
    let positive = probabilities.secondary();

    let (label, index) = if positive > negative {
        (DiagnosisLabel::Positive, 1)
    } else {
        (DiagnosisLabel::Negative, 0)
    };

    DiagnosisResult {
        label,
        class_name: labels[index].to_string(),
        confidence: probabilities.max(),
        probabilities,
    }
}

/// Reject thresholds that are NaN or outside `[0, 1]`
pub fn validate_threshold(threshold: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(Error::InvalidThreshold(threshold))
    }
}

fn record_latency(stage: &'static str, start: Instant) {
    metrics::histogram!("herdscan_stage_latency_us", "stage" => stage)
        .record(start.elapsed().as_micros() as f64);
}

fn record_error(err: &Error) {
    if err.is_client_error() {
        tracing::warn!(category = err.category(), "Scan rejected: {}", err);
    } else {
        tracing::error!(category = err.category(), "Scan failed: {}", err);
    }
    metrics::counter!("herdscan_errors_total", "category" => err.category()).increment(1);
    metrics::counter!("herdscan_scans_total", "outcome" => "error").increment(1);
}

/// Orchestrates the gate and diagnostic stages
pub struct Cascade {
    models: Arc<dyn ModelProvider>,
    policy: GatePolicy,
    store: Option<Arc<dyn ScanStore>>,
}

impl Cascade {
    /// Create a cascade with the default gate policy and no store
    pub fn new(models: Arc<dyn ModelProvider>) -> Self {
        Self {
            models,
            policy: GatePolicy::default(),
            store: None,
        }
    }

    /// Set the gate rule parameters
    pub fn with_policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the storage collaborator used by [`Cascade::scan`]
    pub fn with_store(mut self, store: Arc<dyn ScanStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Run the cascade with the policy's default threshold unless one is given
    pub fn infer(&self, image_bytes: &[u8], threshold: Option<f32>) -> Result<CascadeOutcome> {
        let threshold = threshold.unwrap_or(self.policy.default_threshold);
        self.run_cascade(image_bytes, threshold)
    }

    /// Run both stages on one image
    pub fn run_cascade(&self, image_bytes: &[u8], threshold: f32) -> Result<CascadeOutcome> {
        let result = self.run_stages(image_bytes, threshold);
        match &result {
            Ok(outcome) => {
                let label = match &outcome.diagnosis {
                    None => "rejected",
                    Some(d) if d.is_positive() => "positive",
                    Some(_) => "negative",
                };
                metrics::counter!("herdscan_scans_total", "outcome" => label).increment(1);
            }
            Err(e) => record_error(e),
        }
        result
    }

    fn run_stages(&self, image_bytes: &[u8], threshold: f32) -> Result<CascadeOutcome> {
        let threshold = validate_threshold(threshold)?;
        let start = Instant::now();

        let stage_start = Instant::now();
        let tensor = preprocess(image_bytes)?;
        record_latency("preprocess", stage_start);

        let gate_model = self.models.gate_model()?;
        let stage_start = Instant::now();
        let gate_probs = score(&tensor, gate_model.as_ref())?;
        record_latency("gate", stage_start);

        let gate = self
            .policy
            .decide(gate_probs.primary(), gate_probs.secondary(), threshold);

        tracing::debug!(
            model = gate_model.name(),
            branch = ?gate.branch,
            rule = %gate.rule_description,
            "Gate decided"
        );

        if !gate.passed {
            tracing::info!(
                primary_prob = gate.primary_prob,
                secondary_prob = gate.secondary_prob,
                threshold,
                elapsed = ?start.elapsed(),
                "Scan rejected at gate: {}",
                gate.rule_description
            );
            return Ok(CascadeOutcome {
                gate,
                diagnosis: None,
                threshold,
            });
        }

        let diagnosis = self.run_diagnostic(&tensor)?;

        tracing::info!(
            label = %diagnosis.label,
            class = %diagnosis.class_name,
            confidence = diagnosis.confidence,
            elapsed = ?start.elapsed(),
            "Scan diagnosed"
        );

        Ok(CascadeOutcome {
            gate,
            diagnosis: Some(diagnosis),
            threshold,
        })
    }

    fn run_diagnostic(&self, tensor: &ImageTensor) -> Result<DiagnosisResult> {
        let model = self.models.diagnostic_model()?;
        let stage_start = Instant::now();
        let probs = score(tensor, model.as_ref())?;
        record_latency("diagnostic", stage_start);
        Ok(diagnose(probs, model.labels()))
    }

    /// Run the cascade and persist the outcome when the persistence policy says so
    pub fn scan(
        &self,
        image_bytes: &[u8],
        threshold: Option<f32>,
        requester_id: &str,
        subject_id: Option<&str>,
    ) -> Result<ScanReport> {
        let outcome = self.infer(image_bytes, threshold)?;
        let persistence = evaluate_persistence(&outcome, subject_id.is_some());

        tracing::debug!(decision = persistence.as_str(), "Persistence evaluated");

        let record_id = match persistence {
            PersistenceDecision::Persist => Some(self.persist(&outcome, requester_id, subject_id)?),
            _ => None,
        };

        Ok(ScanReport {
            outcome,
            persistence,
            record_id,
        })
    }

    fn persist(
        &self,
        outcome: &CascadeOutcome,
        requester_id: &str,
        subject_id: Option<&str>,
    ) -> Result<RecordId> {
        let store = self.store.as_ref().ok_or_else(|| {
            Error::storage("positive scan must be recorded but no scan store is configured")
        })?;

        match store.persist(outcome, requester_id, subject_id) {
            Ok(id) => {
                metrics::counter!("herdscan_records_persisted_total").increment(1);
                tracing::info!(record_id = %id, requester = requester_id, "Scan record written");
                Ok(id)
            }
            Err(e) => {
                tracing::error!(error = %e, requester = requester_id, "Failed to write scan record");
                metrics::counter!("herdscan_errors_total", "category" => e.category()).increment(1);
                Err(e)
            }
        }
    }
}
