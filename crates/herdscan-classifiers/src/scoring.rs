//! Scoring engine: one forward pass, then a stable softmax

use crate::preprocess::ImageTensor;
use herdscan_core::{ClassProbabilities, Error, ModelKind, Result};
use std::sync::Arc;

/// A loaded two-class image classifier.
///
/// Implementations must be safe to share across threads; the cache hands out
/// the same instance to every caller.
pub trait ScoringModel: Send + Sync {
    /// Human-readable model name, used in logs
    fn name(&self) -> &str;

    /// Which stage of the cascade this model serves
    fn kind(&self) -> ModelKind;

    /// Class names in output order (index 0 is the primary class)
    fn labels(&self) -> [&str; 2];

    /// Raw logits for a single input
    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>>;
}

/// Shared, read-only model handle
pub type ModelHandle = Arc<dyn ScoringModel>;

/// Run one forward pass and convert logits to probabilities.
///
/// Any backend failure or malformed output surfaces as an inference error
/// tagged with the model's kind. The model remains usable afterwards.
pub fn score(tensor: &ImageTensor, model: &dyn ScoringModel) -> Result<ClassProbabilities> {
    let kind = model.kind();
    let logits = model.forward(tensor).map_err(|e| match e {
        Error::Inference { .. } => e,
        other => Error::inference(kind, other.to_string()),
    })?;

    let probs = ClassProbabilities::from_logits(&logits)
        .map_err(|e| Error::inference(kind, format!("{}: {}", model.name(), e)))?;

    tracing::debug!(
        model = model.name(),
        kind = %kind,
        primary = probs.primary(),
        secondary = probs.secondary(),
        "Scored input"
    );

    Ok(probs)
}
