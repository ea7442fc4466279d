//! Model loading for Candle-based image classifiers

use crate::cache::ModelLoader;
use crate::model_config::{Backbone, DeviceSpec, ModelEntry, ModelSource, ModelsConfig, WeightFormat};
use crate::preprocess::ImageTensor;
use crate::scoring::{ModelHandle, ScoringModel};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::efficientnet::{EfficientNet, MBConvConfig};
use candle_transformers::models::resnet;
use herdscan_core::{Error, ModelKind, Result};
use hf_hub::{api::sync::ApiBuilder, Repo, RepoType};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Network with its classification head, ready for forward passes
pub type Network = Box<dyn Module + Send + Sync>;

impl Backbone {
    /// Build the network for this backbone from loaded weights.
    ///
    /// This is the only place backbone names map to constructors.
    pub fn build(&self, vb: VarBuilder<'static>, num_classes: usize) -> candle_core::Result<Network> {
        let network: Network = match self {
            Self::Resnet18 => Box::new(resnet::resnet18(num_classes, vb)?),
            Self::Resnet34 => Box::new(resnet::resnet34(num_classes, vb)?),
            Self::Resnet50 => Box::new(resnet::resnet50(num_classes, vb)?),
            Self::EfficientnetB0 => {
                Box::new(EfficientNet::new(vb, MBConvConfig::b0(), num_classes)?)
            }
        };
        Ok(network)
    }
}

/// Create Candle device from the configured device
pub fn create_device(spec: DeviceSpec) -> candle_core::Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda { index } => Device::new_cuda(index.unwrap_or(0)),
        DeviceSpec::Metal { index } => Device::new_metal(index.unwrap_or(0)),
    }
}

/// A two-class image classifier backed by a Candle network
pub struct CandleClassifier {
    name: String,
    kind: ModelKind,
    labels: [String; 2],
    device: Device,
    network: Network,
}

impl CandleClassifier {
    fn run(&self, input: &ImageTensor) -> candle_core::Result<Vec<f32>> {
        let tensor = Tensor::from_slice(input.as_slice(), ImageTensor::SHAPE, &self.device)?;
        let logits = self.network.forward(&tensor)?;
        logits.squeeze(0)?.to_dtype(DType::F32)?.to_vec1::<f32>()
    }
}

impl ScoringModel for CandleClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn labels(&self) -> [&str; 2] {
        [&self.labels[0], &self.labels[1]]
    }

    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        self.run(input).map_err(|e| {
            tracing::error!(model = %self.name, kind = %self.kind, error = %e, "Forward pass failed");
            Error::inference(self.kind, e.to_string())
        })
    }
}

/// Loads cascade models described by a [`ModelsConfig`]
pub struct CandleModelLoader {
    config: Arc<ModelsConfig>,
    cache_dir: PathBuf,
}

impl CandleModelLoader {
    /// Create a new loader; Hugging Face downloads go to `~/.cache/herdscan/models`
    pub fn new(config: ModelsConfig) -> Self {
        let cache_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cache/herdscan/models");

        Self {
            config: Arc::new(config),
            cache_dir,
        }
    }

    /// Override the Hugging Face download directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn config(&self) -> &ModelsConfig {
        &self.config
    }

    /// Resolve weights path, downloading if needed
    fn resolve_weights(&self, kind: ModelKind, entry: &ModelEntry) -> Result<PathBuf> {
        match &entry.source {
            ModelSource::Local { path } => {
                if !path.exists() {
                    return Err(Error::model_load(
                        kind,
                        format!("weights not found: {}", path.display()),
                    ));
                }
                Ok(path.clone())
            }
            ModelSource::HuggingFace {
                repo,
                revision,
                filename,
            } => {
                tracing::info!("Downloading {} model from HuggingFace: {} @ {}", kind, repo, revision);

                let api = ApiBuilder::new()
                    .with_cache_dir(self.cache_dir.clone())
                    .build()
                    .map_err(|e| {
                        Error::model_load(kind, format!("Failed to initialize HF API: {}", e))
                    })?;

                let repo = api.repo(Repo::with_revision(
                    repo.clone(),
                    RepoType::Model,
                    revision.clone(),
                ));

                repo.get(filename).map_err(|e| {
                    Error::model_load(kind, format!("Failed to download {}: {}", filename, e))
                })
            }
        }
    }

    fn var_builder(
        &self,
        kind: ModelKind,
        entry: &ModelEntry,
        weights: &Path,
        device: &Device,
    ) -> Result<VarBuilder<'static>> {
        let format = entry
            .format
            .or_else(|| WeightFormat::from_path(weights))
            .ok_or_else(|| {
                Error::model_load(
                    kind,
                    format!(
                        "cannot infer weight format of {}; set `format`",
                        weights.display()
                    ),
                )
            })?;

        match format {
            WeightFormat::SafeTensors => {
                // SAFETY: the file is memory-mapped read-only and must not be
                // modified while the model is alive.
                unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, device) }
                    .map_err(|e| {
                        Error::model_load(kind, format!("Failed to load SafeTensors: {}", e))
                    })
            }
            WeightFormat::PyTorch => VarBuilder::from_pth(weights, DType::F32, device)
                .map_err(|e| Error::model_load(kind, format!("Failed to load PyTorch weights: {}", e))),
        }
    }
}

impl ModelLoader for CandleModelLoader {
    fn load(&self, kind: ModelKind) -> Result<ModelHandle> {
        let entry = self.config.entry(kind);
        let labels = entry
            .label_pair()
            .map_err(|e| Error::model_load(kind, e.to_string()))?;
        let name = entry.display_name();
        let start = Instant::now();

        tracing::info!("Loading {} model '{}' ({})", kind, name, entry.backbone.as_str());

        let weights = self.resolve_weights(kind, entry)?;
        let device = create_device(entry.device)
            .map_err(|e| Error::model_load(kind, format!("Failed to create device: {}", e)))?;
        let vb = self.var_builder(kind, entry, &weights, &device)?;

        let network = entry.backbone.build(vb, labels.len()).map_err(|e| {
            Error::model_load(
                kind,
                format!(
                    "weights {} do not match backbone {}: {}",
                    weights.display(),
                    entry.backbone.as_str(),
                    e
                ),
            )
        })?;

        tracing::info!(
            "Loaded {} model '{}' from {} in {:?}",
            kind,
            name,
            weights.display(),
            start.elapsed()
        );

        Ok(Arc::new(CandleClassifier {
            name,
            kind,
            labels,
            device,
            network,
        }))
    }
}
