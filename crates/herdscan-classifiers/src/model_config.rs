//! Model registry configuration
//!
//! One YAML document names the two models of the cascade:
//!
//! ```yaml
//! gate:
//!   source:
//!     type: local
//!     path: ./models/gate.safetensors
//!   backbone: resnet18
//!   labels: [cattle, non_cattle]
//! diagnostic:
//!   source:
//!     type: huggingface
//!     repo: acme/fmd-classifier
//!     filename: model.safetensors
//!   backbone: efficientnet-b0
//!   device:
//!     type: cuda
//!     index: 0
//!   labels: [healthy, infected]
//! gate_policy:
//!   default_threshold: 0.5
//! ```

use herdscan_core::{Error, ModelKind, Result};
use herdscan_policy::GatePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Both cascade models plus the gate rule parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_version")]
    pub version: String,

    pub gate: ModelEntry,

    pub diagnostic: ModelEntry,

    #[serde(default)]
    pub gate_policy: GatePolicy,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Configuration for one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Display name, defaults to the file stem of the weights
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub source: ModelSource,

    pub backbone: Backbone,

    /// Weight format, inferred from the file extension when omitted
    #[serde(default)]
    pub format: Option<WeightFormat>,

    #[serde(default)]
    pub device: DeviceSpec,

    /// Class names in output order, exactly two
    pub labels: Vec<String>,
}

/// Where the weights live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Load from local filesystem
    Local { path: PathBuf },

    /// Download from HuggingFace Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
        #[serde(default = "default_filename")]
        filename: String,
    },
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_filename() -> String {
    "model.safetensors".to_string()
}

/// Supported image backbones with a two-class head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backbone {
    Resnet18,
    Resnet34,
    Resnet50,
    EfficientnetB0,
}

impl Backbone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resnet18 => "resnet18",
            Self::Resnet34 => "resnet34",
            Self::Resnet50 => "resnet50",
            Self::EfficientnetB0 => "efficientnet-b0",
        }
    }
}

/// Weight file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightFormat {
    SafeTensors,
    PyTorch,
}

impl WeightFormat {
    /// Guess the format from a weights filename
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("safetensors") => Some(Self::SafeTensors),
            Some("pt") | Some("pth") | Some("bin") => Some(Self::PyTorch),
            _ => None,
        }
    }
}

/// Inference device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda {
        #[serde(default)]
        index: Option<usize>,
    },
    Metal {
        #[serde(default)]
        index: Option<usize>,
    },
}

impl ModelEntry {
    /// Entry loading local weights with default device and inferred format
    pub fn local(path: impl Into<PathBuf>, backbone: Backbone, labels: [&str; 2]) -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            source: ModelSource::Local { path: path.into() },
            backbone,
            format: None,
            device: DeviceSpec::Cpu,
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Display name, falling back to the weights file stem
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        match &self.source {
            ModelSource::Local { path } => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unnamed")
                .to_string(),
            ModelSource::HuggingFace { repo, .. } => repo.clone(),
        }
    }

    /// Both labels, once validated
    pub fn label_pair(&self) -> Result<[String; 2]> {
        match self.labels.as_slice() {
            [primary, secondary] => Ok([primary.clone(), secondary.clone()]),
            other => Err(Error::config(format!(
                "model '{}' must declare exactly 2 labels, got {}",
                self.display_name(),
                other.len()
            ))),
        }
    }

    fn validate(&self, kind: ModelKind) -> Result<()> {
        self.label_pair()?;
        if let ModelSource::HuggingFace { repo, filename, .. } = &self.source {
            if repo.is_empty() || filename.is_empty() {
                return Err(Error::config(format!(
                    "{} model: huggingface source needs both repo and filename",
                    kind
                )));
            }
        }
        Ok(())
    }
}

impl ModelsConfig {
    /// Load the registry from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read model registry {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate the registry
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ModelsConfig = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse model registry: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.gate.validate(ModelKind::Gate)?;
        self.diagnostic.validate(ModelKind::Diagnostic)?;
        self.gate_policy.validate()
    }

    pub fn entry(&self, kind: ModelKind) -> &ModelEntry {
        match kind {
            ModelKind::Gate => &self.gate,
            ModelKind::Diagnostic => &self.diagnostic,
        }
    }

    /// Point one model at a local weights file, keeping backbone and labels
    pub fn with_local_weights(mut self, kind: ModelKind, path: impl Into<PathBuf>) -> Self {
        let entry = match kind {
            ModelKind::Gate => &mut self.gate,
            ModelKind::Diagnostic => &mut self.diagnostic,
        };
        entry.source = ModelSource::Local { path: path.into() };
        entry.format = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"
version: "1.0"
gate:
  name: cattle-gate
  source:
    type: local
    path: ./models/gate.safetensors
  backbone: resnet18
  labels: [cattle, non_cattle]
diagnostic:
  source:
    type: huggingface
    repo: acme/fmd-classifier
  backbone: efficientnet-b0
  device:
    type: cuda
    index: 1
  labels: [healthy, infected]
gate_policy:
  default_threshold: 0.6
"#;

    #[test]
    fn test_parse_registry() {
        let config = ModelsConfig::from_yaml(REGISTRY).unwrap();

        assert_eq!(config.gate.display_name(), "cattle-gate");
        assert_eq!(config.gate.backbone, Backbone::Resnet18);
        assert_eq!(config.gate.device, DeviceSpec::Cpu);
        assert_eq!(config.diagnostic.backbone, Backbone::EfficientnetB0);
        assert_eq!(config.diagnostic.device, DeviceSpec::Cuda { index: Some(1) });
        assert_eq!(config.gate_policy.default_threshold, 0.6);

        match &config.diagnostic.source {
            ModelSource::HuggingFace {
                repo,
                revision,
                filename,
            } => {
                assert_eq!(repo, "acme/fmd-classifier");
                assert_eq!(revision, "main");
                assert_eq!(filename, "model.safetensors");
            }
            other => panic!("Expected huggingface source, got {:?}", other),
        }
    }

    #[test]
    fn test_device_forms() {
        let yaml = REGISTRY.replace("    type: cuda\n    index: 1\n", "    type: metal\n");
        let config = ModelsConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.diagnostic.device, DeviceSpec::Metal { index: None });

        let yaml = REGISTRY.replace("    type: cuda\n    index: 1\n", "    type: cpu\n");
        let config = ModelsConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.diagnostic.device, DeviceSpec::Cpu);

        let yaml = REGISTRY.replace("type: cuda", "type: tpu");
        assert!(ModelsConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_unknown_backbone_rejected() {
        let yaml = REGISTRY.replace("resnet18", "mobilenet_v2");
        assert!(ModelsConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_label_count_validated() {
        let yaml = REGISTRY.replace("[cattle, non_cattle]", "[cattle, non_cattle, unsure]");
        let err = ModelsConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("exactly 2 labels"));
    }

    #[test]
    fn test_invalid_gate_policy_rejected() {
        let yaml = REGISTRY.replace("default_threshold: 0.6", "default_threshold: 1.5");
        assert!(ModelsConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_local_override() {
        let config = ModelsConfig::from_yaml(REGISTRY)
            .unwrap()
            .with_local_weights(ModelKind::Diagnostic, "/opt/models/fmd.pth");

        let entry = config.entry(ModelKind::Diagnostic);
        assert_eq!(
            entry.source,
            ModelSource::Local {
                path: PathBuf::from("/opt/models/fmd.pth")
            }
        );
        assert_eq!(entry.display_name(), "fmd");
        assert_eq!(entry.backbone, Backbone::EfficientnetB0);
    }

    #[test]
    fn test_format_inference() {
        assert_eq!(
            WeightFormat::from_path(Path::new("a/b.safetensors")),
            Some(WeightFormat::SafeTensors)
        );
        assert_eq!(
            WeightFormat::from_path(Path::new("b.pth")),
            Some(WeightFormat::PyTorch)
        );
        assert_eq!(WeightFormat::from_path(Path::new("b.onnx")), None);
    }
}
