//! herdscan Classifiers
//!
//! The inference side of the two-stage cascade:
//! - `preprocess`: image bytes to a normalized `[1, 3, 224, 224]` tensor
//! - `scoring`: the model trait and softmax scoring
//! - `model_config` / `model_loader`: YAML registry and Candle backbones
//! - `cache`: load-once model cells shared by every request
//! - `cascade`: gate, gate rule, diagnosis, persistence
//!
//! All inference is synchronous and CPU-bound; callers on an async runtime
//! should run it on a blocking thread.

pub mod cache;
pub mod cascade;
pub mod model_config;
pub mod model_loader;
pub mod preprocess;
pub mod scoring;

pub use cache::{ModelCache, ModelLoader, ModelProvider};
pub use cascade::{diagnose, validate_threshold, Cascade, ScanReport};
pub use model_config::{Backbone, DeviceSpec, ModelEntry, ModelSource, ModelsConfig, WeightFormat};
pub use model_loader::{create_device, CandleClassifier, CandleModelLoader};
pub use preprocess::{preprocess, ImageTensor};
pub use scoring::{score, ModelHandle, ScoringModel};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cache::{ModelCache, ModelLoader, ModelProvider};
    pub use crate::cascade::{Cascade, ScanReport};
    pub use crate::model_config::ModelsConfig;
    pub use crate::model_loader::CandleModelLoader;
    pub use crate::preprocess::{preprocess, ImageTensor};
    pub use crate::scoring::{ModelHandle, ScoringModel};
}
