//! Core types for herdscan

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::probability::ClassProbabilities;

/// The two classifiers of the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Stage 1: is this the expected kind of subject
    Gate,
    /// Stage 2: domain-specific diagnosis
    Diagnostic,
}

impl ModelKind {
    /// Both kinds, in cascade order
    pub const ALL: [ModelKind; 2] = [ModelKind::Gate, ModelKind::Diagnostic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gate => "gate",
            Self::Diagnostic => "diagnostic",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which branch of the gate rule determined the outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateBranch {
    /// Base rule satisfied, no escalation
    Passed,
    /// Secondary class above the escalation trigger, tightened floor met
    PassedEscalated,
    /// Primary class did not strictly beat the secondary class
    NotPreferred,
    /// Primary class won but stayed under the threshold
    BelowThreshold,
    /// Base rule satisfied but the tightened floor was not
    EscalationFailed,
}

impl GateBranch {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed | Self::PassedEscalated)
    }
}

/// Stage-1 acceptance decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub passed: bool,
    pub primary_prob: f32,
    pub secondary_prob: f32,
    pub branch: GateBranch,
    /// Human-readable trace of the rule that fired
    pub rule_description: String,
}

/// Diagnostic label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosisLabel {
    /// Adverse finding (diagnostic class index 1)
    Positive,
    /// Healthy finding (diagnostic class index 0)
    Negative,
}

impl DiagnosisLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "POSITIVE",
            Self::Negative => "NEGATIVE",
        }
    }
}

impl fmt::Display for DiagnosisLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage-2 result, present only when the gate passed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub label: DiagnosisLabel,
    /// Class name from the diagnostic model's label mapping (e.g. "infected")
    pub class_name: String,
    pub confidence: f32,
    /// `[negative, positive]`
    pub probabilities: ClassProbabilities,
}

impl DiagnosisResult {
    pub fn negative_prob(&self) -> f32 {
        self.probabilities.primary()
    }

    pub fn positive_prob(&self) -> f32 {
        self.probabilities.secondary()
    }

    pub fn is_positive(&self) -> bool {
        self.label == DiagnosisLabel::Positive
    }
}

/// Top-level result of one cascade run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeOutcome {
    pub gate: GateResult,
    pub diagnosis: Option<DiagnosisResult>,
    /// Threshold the gate was evaluated with
    pub threshold: f32,
}

impl CascadeOutcome {
    pub fn passed_gate(&self) -> bool {
        self.gate.passed
    }

    /// Build the response shape exposed to upstream consumers
    pub fn to_response(&self) -> ScanResponse {
        ScanResponse {
            passed_gate: self.gate.passed,
            primary_prob: self.gate.primary_prob,
            secondary_prob: self.gate.secondary_prob,
            threshold: self.threshold,
            gate_rule: self.gate.rule_description.clone(),
            diagnosis: self.diagnosis.as_ref().map(|d| DiagnosisResponse {
                label: d.label,
                class_name: d.class_name.clone(),
                confidence: d.confidence,
                probabilities: DiagnosisProbabilities {
                    negative: d.negative_prob(),
                    positive: d.positive_prob(),
                },
            }),
        }
    }
}

/// Wire shape returned to the request-handling layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub passed_gate: bool,
    pub primary_prob: f32,
    pub secondary_prob: f32,
    pub threshold: f32,
    pub gate_rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<DiagnosisResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResponse {
    pub label: DiagnosisLabel,
    pub class_name: String,
    pub confidence: f32,
    pub probabilities: DiagnosisProbabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisProbabilities {
    pub negative: f32,
    pub positive: f32,
}

/// Identifier of a persisted scan record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected_outcome() -> CascadeOutcome {
        CascadeOutcome {
            gate: GateResult {
                passed: false,
                primary_prob: 0.3,
                secondary_prob: 0.7,
                branch: GateBranch::NotPreferred,
                rule_description: "primary_prob=0.300 <= secondary_prob=0.700".to_string(),
            },
            diagnosis: None,
            threshold: 0.5,
        }
    }

    #[test]
    fn test_rejected_response_omits_diagnosis() {
        let json = serde_json::to_value(rejected_outcome().to_response()).unwrap();

        assert_eq!(json["passedGate"], false);
        assert!(json.get("diagnosis").is_none());
        assert!(json.get("primaryProb").is_some());
        assert!(json.get("secondaryProb").is_some());
    }

    #[test]
    fn test_accepted_response_includes_diagnosis() {
        let mut outcome = rejected_outcome();
        outcome.gate.passed = true;
        outcome.gate.branch = GateBranch::Passed;
        outcome.diagnosis = Some(DiagnosisResult {
            label: DiagnosisLabel::Positive,
            class_name: "infected".to_string(),
            confidence: 0.9,
            probabilities: ClassProbabilities::from_logits(&[0.0, 9f32.ln()]).unwrap(),
        });

        let json = serde_json::to_value(outcome.to_response()).unwrap();
        assert_eq!(json["passedGate"], true);
        assert_eq!(json["diagnosis"]["label"], "POSITIVE");
        assert_eq!(json["diagnosis"]["className"], "infected");
        let positive = json["diagnosis"]["probabilities"]["positive"].as_f64().unwrap();
        assert!((positive - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_model_kind_serde() {
        assert_eq!(serde_json::to_string(&ModelKind::Gate).unwrap(), "\"gate\"");
        let kind: ModelKind = serde_json::from_str("\"diagnostic\"").unwrap();
        assert_eq!(kind, ModelKind::Diagnostic);
        assert!(serde_json::from_str::<ModelKind>("\"segmenter\"").is_err());
    }

    #[test]
    fn test_gate_branch_passed() {
        assert!(GateBranch::Passed.passed());
        assert!(GateBranch::PassedEscalated.passed());
        assert!(!GateBranch::EscalationFailed.passed());
        assert!(!GateBranch::BelowThreshold.passed());
        assert!(!GateBranch::NotPreferred.passed());
    }
}
