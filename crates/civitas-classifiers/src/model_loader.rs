//! Model file resolution for Candle-based classifiers

use candle_core::Device;
use civitas_core::{Error, Result};
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default hub repository for the primary hate-speech classifier
pub const DEFAULT_REPO_ID: &str = "irlab-udc/MetaHateBERT";

const DEFAULT_MAX_LENGTH: usize = 512;

/// Configuration for loading a sequence classification model
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Source of the model
    pub source: ModelSource,

    /// Device to run inference on
    pub device: DeviceType,

    /// Maximum number of tokens fed to the model
    pub max_length: usize,
}

/// Source location for model files
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// Directory on the local file system
    LocalDir(PathBuf),

    /// Download from Hugging Face Hub
    HuggingFace {
        repo_id: String,
        revision: Option<String>,
    },
}

/// Device type for inference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// CPU inference (always available)
    #[default]
    Cpu,
    /// First CUDA GPU
    Cuda,
    /// Apple Silicon
    Metal,
}

impl DeviceType {
    /// Create the Candle device
    pub fn create(self) -> Result<Device> {
        match self {
            Self::Cpu => Ok(Device::Cpu),
            Self::Cuda => Device::new_cuda(0)
                .map_err(|e| Error::classifier(format!("Failed to create CUDA device: {}", e))),
            Self::Metal => Device::new_metal(0)
                .map_err(|e| Error::classifier(format!("Failed to create Metal device: {}", e))),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::from_hf(DEFAULT_REPO_ID)
    }
}

impl ModelConfig {
    /// Load from a local directory holding config, weights and tokenizer
    pub fn from_local(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::LocalDir(path.into()),
            device: DeviceType::Cpu,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    /// Download from Hugging Face
    pub fn from_hf(repo_id: impl Into<String>) -> Self {
        Self {
            source: ModelSource::HuggingFace {
                repo_id: repo_id.into(),
                revision: None,
            },
            device: DeviceType::Cpu,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    /// Set device
    pub fn with_device(mut self, device: DeviceType) -> Self {
        self.device = device;
        self
    }

    /// Set maximum token length
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Set Hugging Face revision
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        if let ModelSource::HuggingFace { repo_id, .. } = self.source {
            self.source = ModelSource::HuggingFace {
                repo_id,
                revision: Some(revision.into()),
            };
        }
        self
    }

    /// Human readable name of the model
    pub fn display_name(&self) -> String {
        match &self.source {
            ModelSource::LocalDir(path) => path.display().to_string(),
            ModelSource::HuggingFace { repo_id, .. } => repo_id.clone(),
        }
    }
}

/// Weight file found for a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsFile {
    SafeTensors(PathBuf),
    PyTorch(PathBuf),
}

/// Tokenizer definition found for a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerFile {
    /// Full `tokenizer.json`
    Json(PathBuf),
    /// WordPiece vocabulary only
    Vocab(PathBuf),
}

/// Paths of every file needed to build a classifier
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub weights: WeightsFile,
    pub tokenizer: TokenizerFile,
}

const SAFETENSORS: &str = "model.safetensors";
const PYTORCH: &str = "pytorch_model.bin";
const TOKENIZER_JSON: &str = "tokenizer.json";
const VOCAB_TXT: &str = "vocab.txt";

impl ModelFiles {
    /// Resolve model files, downloading from the hub when needed.
    ///
    /// Blocks on network IO for hub sources.
    pub fn resolve(config: &ModelConfig) -> Result<Self> {
        match &config.source {
            ModelSource::LocalDir(dir) => Self::from_dir(dir),
            ModelSource::HuggingFace { repo_id, revision } => {
                Self::download(repo_id, revision.as_deref())
            }
        }
    }

    /// Resolve files inside a local model directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::config(format!(
                "Model directory not found: {}",
                dir.display()
            )));
        }

        let config = dir.join("config.json");
        if !config.exists() {
            return Err(Error::classifier(format!(
                "config.json not found in {}",
                dir.display()
            )));
        }

        let weights = if dir.join(SAFETENSORS).exists() {
            WeightsFile::SafeTensors(dir.join(SAFETENSORS))
        } else if dir.join(PYTORCH).exists() {
            WeightsFile::PyTorch(dir.join(PYTORCH))
        } else {
            return Err(Error::classifier(format!(
                "No model weights found in {} (tried {}, {})",
                dir.display(),
                SAFETENSORS,
                PYTORCH
            )));
        };

        let tokenizer = if dir.join(TOKENIZER_JSON).exists() {
            TokenizerFile::Json(dir.join(TOKENIZER_JSON))
        } else if dir.join(VOCAB_TXT).exists() {
            TokenizerFile::Vocab(dir.join(VOCAB_TXT))
        } else {
            return Err(Error::classifier(format!(
                "No tokenizer found in {} (tried {}, {})",
                dir.display(),
                TOKENIZER_JSON,
                VOCAB_TXT
            )));
        };

        Ok(Self {
            config,
            weights,
            tokenizer,
        })
    }

    fn download(repo_id: &str, revision: Option<&str>) -> Result<Self> {
        tracing::info!("Fetching model from HuggingFace: {}", repo_id);

        let api = Api::new()
            .map_err(|e| Error::config(format!("Failed to initialize HF API: {}", e)))?;
        let repo = api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            revision.unwrap_or("main").to_string(),
        ));

        let config = repo
            .get("config.json")
            .map_err(|e| Error::classifier(format!("Failed to download config.json: {}", e)))?;

        let weights = match repo.get(SAFETENSORS) {
            Ok(path) => WeightsFile::SafeTensors(path),
            Err(_) => repo.get(PYTORCH).map(WeightsFile::PyTorch).map_err(|e| {
                Error::classifier(format!(
                    "No model weights found in {} (tried {}, {}): {}",
                    repo_id, SAFETENSORS, PYTORCH, e
                ))
            })?,
        };

        let tokenizer = match repo.get(TOKENIZER_JSON) {
            Ok(path) => TokenizerFile::Json(path),
            Err(_) => repo.get(VOCAB_TXT).map(TokenizerFile::Vocab).map_err(|e| {
                Error::classifier(format!(
                    "No tokenizer found in {} (tried {}, {}): {}",
                    repo_id, TOKENIZER_JSON, VOCAB_TXT, e
                ))
            })?,
        };

        tracing::debug!("Model files cached under {:?}", config.parent());

        Ok(Self {
            config,
            weights,
            tokenizer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_hf() {
        let config = ModelConfig::from_hf("irlab-udc/MetaHateBERT")
            .with_revision("main")
            .with_device(DeviceType::Cpu)
            .with_max_length(256);

        if let ModelSource::HuggingFace { repo_id, revision } = &config.source {
            assert_eq!(repo_id, "irlab-udc/MetaHateBERT");
            assert_eq!(revision.as_deref(), Some("main"));
        } else {
            panic!("Expected HuggingFace source");
        }
        assert_eq!(config.max_length, 256);
    }

    #[test]
    fn test_revision_ignored_for_local_source() {
        let config = ModelConfig::from_local("/models/bert").with_revision("v2");
        assert!(matches!(config.source, ModelSource::LocalDir(_)));
        assert_eq!(config.display_name(), "/models/bert");
    }

    #[test]
    fn test_local_dir_prefers_safetensors_and_tokenizer_json() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["config.json", SAFETENSORS, PYTORCH, TOKENIZER_JSON, VOCAB_TXT] {
            std::fs::write(dir.path().join(name), b"{}").unwrap();
        }

        let files = ModelFiles::from_dir(dir.path()).unwrap();
        assert_eq!(
            files.weights,
            WeightsFile::SafeTensors(dir.path().join(SAFETENSORS))
        );
        assert_eq!(
            files.tokenizer,
            TokenizerFile::Json(dir.path().join(TOKENIZER_JSON))
        );
    }

    #[test]
    fn test_local_dir_falls_back_to_pytorch_and_vocab() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["config.json", PYTORCH, VOCAB_TXT] {
            std::fs::write(dir.path().join(name), b"{}").unwrap();
        }

        let files = ModelFiles::from_dir(dir.path()).unwrap();
        assert!(matches!(files.weights, WeightsFile::PyTorch(_)));
        assert!(matches!(files.tokenizer, TokenizerFile::Vocab(_)));
    }

    #[test]
    fn test_local_dir_without_weights_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), b"{}").unwrap();
        std::fs::write(dir.path().join(TOKENIZER_JSON), b"{}").unwrap();

        let err = ModelFiles::from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("No model weights"));
    }

    #[test]
    fn test_missing_dir_is_config_error() {
        let err = ModelFiles::from_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_device_deserializes_lowercase() {
        let device: DeviceType = serde_yaml::from_str("cuda").unwrap();
        assert_eq!(device, DeviceType::Cuda);
    }
}
