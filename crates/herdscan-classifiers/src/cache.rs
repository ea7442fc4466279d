//! Process-wide, load-once model cache
//!
//! Each model kind has its own cell. The first caller runs the loader; any
//! concurrent callers block on the cell until that single load finishes and
//! then share its result. A failed load is remembered too, so a broken model
//! fails fast on every later request instead of being reloaded.

use crate::scoring::ModelHandle;
use herdscan_core::{Error, ModelKind, Result};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Produces a model handle for a kind; called at most once per kind by the cache
pub trait ModelLoader: Send + Sync {
    fn load(&self, kind: ModelKind) -> Result<ModelHandle>;
}

impl<L: ModelLoader + ?Sized> ModelLoader for Arc<L> {
    fn load(&self, kind: ModelKind) -> Result<ModelHandle> {
        (**self).load(kind)
    }
}

/// Read access to the cascade's two models
pub trait ModelProvider: Send + Sync {
    fn gate_model(&self) -> Result<ModelHandle>;

    fn diagnostic_model(&self) -> Result<ModelHandle>;

    fn get_model(&self, kind: ModelKind) -> Result<ModelHandle> {
        match kind {
            ModelKind::Gate => self.gate_model(),
            ModelKind::Diagnostic => self.diagnostic_model(),
        }
    }
}

type Slot = OnceCell<std::result::Result<ModelHandle, String>>;

/// Lazily loaded gate and diagnostic models
pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    gate: Slot,
    diagnostic: Slot,
}

impl ModelCache {
    /// Create an empty cache; nothing is loaded until first use
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self::with_loader(Arc::new(loader))
    }

    pub fn with_loader(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            gate: OnceCell::new(),
            diagnostic: OnceCell::new(),
        }
    }

    fn slot(&self, kind: ModelKind) -> &Slot {
        match kind {
            ModelKind::Gate => &self.gate,
            ModelKind::Diagnostic => &self.diagnostic,
        }
    }

    /// Get the model for `kind`, loading it on first use
    pub fn get(&self, kind: ModelKind) -> Result<ModelHandle> {
        let slot = self.slot(kind).get_or_init(|| match self.loader.load(kind) {
            Ok(model) => {
                tracing::debug!(kind = %kind, model = model.name(), "Cached model");
                Ok(model)
            }
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "Model load failed; not retrying");
                Err(match e {
                    Error::ModelLoad { message, .. } => message,
                    other => other.to_string(),
                })
            }
        });

        match slot {
            Ok(model) => Ok(Arc::clone(model)),
            Err(message) => Err(Error::model_load(kind, message.clone())),
        }
    }

    /// Whether `kind` has been loaded successfully
    pub fn is_ready(&self, kind: ModelKind) -> bool {
        matches!(self.slot(kind).get(), Some(Ok(_)))
    }

    /// Whether a load for `kind` has been attempted, successful or not
    pub fn is_initialized(&self, kind: ModelKind) -> bool {
        self.slot(kind).get().is_some()
    }

    /// Load both models now, failing on the first kind that cannot load
    pub fn warm_up(&self) -> Result<()> {
        for kind in ModelKind::ALL {
            self.get(kind)?;
        }
        tracing::info!("Model cache warm: gate and diagnostic models loaded");
        Ok(())
    }
}

impl ModelProvider for ModelCache {
    fn gate_model(&self) -> Result<ModelHandle> {
        self.get(ModelKind::Gate)
    }

    fn diagnostic_model(&self) -> Result<ModelHandle> {
        self.get(ModelKind::Diagnostic)
    }
}

impl<P: ModelProvider + ?Sized> ModelProvider for Arc<P> {
    fn gate_model(&self) -> Result<ModelHandle> {
        (**self).gate_model()
    }

    fn diagnostic_model(&self) -> Result<ModelHandle> {
        (**self).diagnostic_model()
    }
}
