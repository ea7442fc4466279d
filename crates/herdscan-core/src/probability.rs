//! Numerically stable softmax and the two-class probability pair

use serde::{Deserialize, Serialize};

/// Tolerance used when checking that a distribution sums to one
pub const SUM_TOLERANCE: f32 = 1e-3;

/// Errors raised while turning raw scores into probabilities
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbabilityError {
    /// The classifier head produced the wrong number of scores
    #[error("expected 2 class scores, got {0}")]
    WrongArity(usize),

    /// NaN or infinite values in the raw scores or probabilities
    #[error("non-finite class score: {0}")]
    NonFinite(f32),

    /// Deserialized pair does not form a distribution
    #[error("probabilities {0} and {1} do not form a distribution")]
    NotADistribution(f32, f32),
}

/// Normalized exponential over raw scores.
///
/// The maximum is subtracted before exponentiating, so the result is
/// invariant to adding a constant to every score and large scores do not
/// overflow. Accumulation happens in `f64`.
pub fn stable_softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max = logits
        .iter()
        .map(|&l| l as f64)
        .fold(f64::NEG_INFINITY, f64::max);

    let exps: Vec<f64> = logits.iter().map(|&l| (l as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();

    exps.into_iter().map(|e| (e / sum) as f32).collect()
}

/// Ordered probability pair produced by a two-class head.
///
/// Index 0 is the *primary* class (gate: the expected subject; diagnostic:
/// the negative/healthy class), index 1 the *secondary* class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f32; 2]", into = "[f32; 2]")]
pub struct ClassProbabilities {
    values: [f32; 2],
}

impl ClassProbabilities {
    /// Convert raw logits from a two-class head into probabilities
    pub fn from_logits(logits: &[f32]) -> Result<Self, ProbabilityError> {
        if logits.len() != 2 {
            return Err(ProbabilityError::WrongArity(logits.len()));
        }
        if let Some(&bad) = logits.iter().find(|l| !l.is_finite()) {
            return Err(ProbabilityError::NonFinite(bad));
        }

        let probs = stable_softmax(logits);
        Ok(Self {
            values: [probs[0], probs[1]],
        })
    }

    /// Probability of class index 0
    pub fn primary(&self) -> f32 {
        self.values[0]
    }

    /// Probability of class index 1
    pub fn secondary(&self) -> f32 {
        self.values[1]
    }

    /// Larger of the two probabilities
    pub fn max(&self) -> f32 {
        self.values[0].max(self.values[1])
    }

    /// Both values in class-index order
    pub fn as_array(&self) -> [f32; 2] {
        self.values
    }
}

impl TryFrom<[f32; 2]> for ClassProbabilities {
    type Error = ProbabilityError;

    fn try_from(values: [f32; 2]) -> Result<Self, Self::Error> {
        for &v in &values {
            if !v.is_finite() {
                return Err(ProbabilityError::NonFinite(v));
            }
            if !(0.0..=1.0).contains(&v) {
                return Err(ProbabilityError::NotADistribution(values[0], values[1]));
            }
        }
        if ((values[0] + values[1]) - 1.0).abs() > SUM_TOLERANCE {
            return Err(ProbabilityError::NotADistribution(values[0], values[1]));
        }
        Ok(Self { values })
    }
}

impl From<ClassProbabilities> for [f32; 2] {
    fn from(probs: ClassProbabilities) -> Self {
        probs.values
    }
}
