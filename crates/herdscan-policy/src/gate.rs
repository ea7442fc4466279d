//! Stage-1 gate acceptance rule
//!
//! A subject is accepted when its class beats the competing class and clears
//! the caller's threshold. When the competing class is itself moderately
//! confident (above the escalation trigger) the primary class must also clear
//! a tightened floor, `max(threshold, escalated_min_primary)`.

use herdscan_core::{Error, GateBranch, GateResult, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Threshold applied when the caller does not supply one
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Secondary probability above which the tightened floor applies (strict `>`)
pub const ESCALATION_TRIGGER: f32 = 0.4;

/// Minimum primary probability once escalation applies
pub const ESCALATED_MIN_PRIMARY: f32 = 0.8;

/// Gate rule parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Threshold used when a request does not override it
    #[serde(default = "default_threshold")]
    pub default_threshold: f32,

    /// Secondary probability that triggers the tightened floor
    #[serde(default = "default_escalation_trigger")]
    pub escalation_trigger: f32,

    /// Floor the primary probability must reach once escalated
    #[serde(default = "default_escalated_min_primary")]
    pub escalated_min_primary: f32,
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_escalation_trigger() -> f32 {
    ESCALATION_TRIGGER
}

fn default_escalated_min_primary() -> f32 {
    ESCALATED_MIN_PRIMARY
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            escalation_trigger: ESCALATION_TRIGGER,
            escalated_min_primary: ESCALATED_MIN_PRIMARY,
        }
    }
}

impl GatePolicy {
    /// Load a gate policy from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read gate policy {}: {}", path.display(), e))
        })?;
        let policy = Self::from_yaml(&contents)?;
        tracing::info!(
            "Loaded gate policy from {} (default_threshold={}, escalation_trigger={}, escalated_min_primary={})",
            path.display(),
            policy.default_threshold,
            policy.escalation_trigger,
            policy.escalated_min_primary
        );
        Ok(policy)
    }

    /// Parse and validate a gate policy from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let policy: GatePolicy = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse gate policy: {}", e)))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Every parameter must be a probability
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("default_threshold", self.default_threshold),
            ("escalation_trigger", self.escalation_trigger),
            ("escalated_min_primary", self.escalated_min_primary),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::config(format!(
                    "gate policy {} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Apply the gate rule.
    ///
    /// Total over all inputs: never panics, NaN probabilities are rejected by
    /// the comparisons themselves.
    pub fn decide(&self, primary_prob: f32, secondary_prob: f32, threshold: f32) -> GateResult {
        let preferred = primary_prob > secondary_prob;
        let meets_threshold = primary_prob >= threshold;
        let escalated = secondary_prob > self.escalation_trigger;
        let required = threshold.max(self.escalated_min_primary);

        let branch = if !preferred {
            GateBranch::NotPreferred
        } else if !meets_threshold {
            GateBranch::BelowThreshold
        } else if escalated && primary_prob < required {
            GateBranch::EscalationFailed
        } else if escalated {
            GateBranch::PassedEscalated
        } else {
            GateBranch::Passed
        };

        let rule_description = match branch {
            GateBranch::Passed => "passed".to_string(),
            GateBranch::PassedEscalated => format!(
                "passed (secondary_prob={:.3} > {}, primary_prob={:.3} >= max(threshold,{}))",
                secondary_prob, self.escalation_trigger, primary_prob, self.escalated_min_primary
            ),
            GateBranch::NotPreferred => format!(
                "primary_prob={:.3} <= secondary_prob={:.3}",
                primary_prob, secondary_prob
            ),
            GateBranch::BelowThreshold => format!(
                "primary_prob={:.3} < threshold={:.3}",
                primary_prob, threshold
            ),
            GateBranch::EscalationFailed => format!(
                "secondary_prob={:.3} > {}, required primary_prob>=max(threshold,{})={:.3}, got {:.3}",
                secondary_prob,
                self.escalation_trigger,
                self.escalated_min_primary,
                required,
                primary_prob
            ),
        };

        GateResult {
            passed: branch.passed(),
            primary_prob,
            secondary_prob,
            branch,
            rule_description,
        }
    }
}

/// Apply the gate rule with the default escalation constants
pub fn decide_gate(primary_prob: f32, secondary_prob: f32, threshold: f32) -> GateResult {
    GatePolicy::default().decide(primary_prob, secondary_prob, threshold)
}
