//! # Model Artifacts
//!
//! A model artifact is one trained model file plus the configuration it was
//! trained with. [`NpzModelStore`] reads numpy `.npz` archives: every entry is
//! a named parameter except [`METADATA_ENTRY`], a u8 array holding the model
//! configuration as a flat YAML mapping. The text may be NUL-terminated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use candle_core::{DType, Device, Tensor};
use tracing::debug;
use crate::config::Options;
use crate::error::{DecodeError, Result};

/// Name of the archive entry carrying the embedded model configuration.
pub const METADATA_ENTRY: &str = "special:model.yml";

/// A loaded model file.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    path: PathBuf,
    metadata: Options,
    parameters: HashMap<String, Tensor>,
}

impl ModelArtifact {
    pub fn new(path: impl Into<PathBuf>, metadata: Options, parameters: HashMap<String, Tensor>) -> Self {
        Self {
            path: path.into(),
            metadata,
            parameters,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The model's embedded configuration.
    pub fn metadata(&self) -> &Options {
        &self.metadata
    }

    pub fn parameter(&self, name: &str) -> Option<&Tensor> {
        self.parameters.get(name)
    }

    /// Like [`Self::parameter`], but a missing entry is a metadata error.
    pub fn require(&self, name: &str) -> Result<&Tensor> {
        self.parameters
            .get(name)
            .ok_or_else(|| DecodeError::metadata(&self.path, format!("missing parameter `{name}`")))
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &String> {
        self.parameters.keys()
    }

    /// Writes parameters and metadata as an npz archive readable by [`NpzModelStore`].
    pub fn save_npz(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = self
            .metadata
            .to_yaml_string()
            .map_err(|e| DecodeError::metadata(path, e.to_string()))?;
        let bytes = text.into_bytes();
        let len = bytes.len();
        let metadata = Tensor::from_vec(bytes, len, &Device::Cpu)?;

        let mut entries: Vec<(&str, &Tensor)> = self
            .parameters
            .iter()
            .map(|(name, tensor)| (name.as_str(), tensor))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.push((METADATA_ENTRY, &metadata));

        Tensor::write_npz(&entries, path).map_err(|source| DecodeError::Artifact {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Source of model artifacts.
pub trait ModelStore {
    /// Loads the artifact at `path`. Unreadable files and malformed metadata
    /// are errors.
    fn load(&self, path: &Path) -> Result<ModelArtifact>;
}

/// Reads `.npz` model archives with candle.
#[derive(Debug, Clone, Copy, Default)]
pub struct NpzModelStore;

impl NpzModelStore {
    fn parse_metadata(path: &Path, tensor: &Tensor) -> Result<Options> {
        let bytes = tensor
            .flatten_all()
            .and_then(|t| t.to_dtype(DType::U8))
            .and_then(|t| t.to_vec1::<u8>())
            .map_err(|e| DecodeError::metadata(path, e.to_string()))?;
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        let text = std::str::from_utf8(&bytes[..end])
            .map_err(|e| DecodeError::metadata(path, e.to_string()))?;
        Options::from_yaml_str(text).map_err(|e| DecodeError::metadata(path, e.to_string()))
    }
}

impl ModelStore for NpzModelStore {
    fn load(&self, path: &Path) -> Result<ModelArtifact> {
        let entries = Tensor::read_npz(path).map_err(|source| DecodeError::Artifact {
            path: path.to_path_buf(),
            source,
        })?;

        let mut metadata = None;
        let mut parameters = HashMap::with_capacity(entries.len());
        for (name, tensor) in entries {
            if name == METADATA_ENTRY {
                metadata = Some(Self::parse_metadata(path, &tensor)?);
            } else {
                parameters.insert(name, tensor);
            }
        }

        let metadata = metadata
            .ok_or_else(|| DecodeError::metadata(path, format!("no `{METADATA_ENTRY}` entry")))?;
        debug!(path = ?path, parameters = parameters.len(), "loaded model artifact");
        Ok(ModelArtifact::new(path, metadata, parameters))
    }
}
