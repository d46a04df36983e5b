use std::path::PathBuf;
use tracing::debug;
use crate::batch::TruncationPolicy;
use crate::error::{DecodeError, Result};
use super::keys;
use super::options::{OptionValue, Options};

const DEFAULT_MATH_THREADS: usize = 1;
const DEFAULT_WORKSPACE_MB: usize = 500;
const DEFAULT_BEAM_SIZE: usize = 12;
const DEFAULT_MAX_LENGTH_FACTOR: f32 = 3.0;
const DEFAULT_UNK_ID: u32 = 1;

/// Immutable decoding configuration.
///
/// Built through [`DecodingConfigBuilder`] or converted from raw [`Options`];
/// both paths apply [`DecodingConfig::forced_options`] last.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodingConfig {
    options: Options,
}

impl DecodingConfig {
    /// Keys whose values are fixed for this decoder.
    pub const FORCED_KEYS: [&'static str; 5] = [
        keys::INFERENCE,
        keys::WORD_PENALTY,
        keys::NORMALIZE,
        keys::N_BEST,
        keys::ALLOW_UNK,
    ];

    pub fn builder() -> DecodingConfigBuilder {
        DecodingConfigBuilder::default()
    }

    /// The values every decoding configuration carries for [`Self::FORCED_KEYS`].
    ///
    /// Inference mode on, no word penalty, no length normalization, single
    /// best output only, unknown words never produced.
    pub fn forced_options() -> Options {
        let mut options = Options::new();
        options.set(keys::INFERENCE, true);
        options.set(keys::WORD_PENALTY, 0);
        options.set(keys::NORMALIZE, 0);
        options.set(keys::N_BEST, false);
        options.set(keys::ALLOW_UNK, false);
        options
    }

    /// All options, forced keys included.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Ordered model artifact paths. At least one is required.
    pub fn model_paths(&self) -> Result<Vec<PathBuf>> {
        let models: Vec<String> = self.options.get(keys::MODEL)?;
        if models.is_empty() {
            return Err(DecodeError::config(keys::MODEL, "at least one model path is required"));
        }
        Ok(models.into_iter().map(PathBuf::from).collect())
    }

    pub fn math_threads(&self) -> Result<usize> {
        self.options.get_or(keys::MATH_THREADS, DEFAULT_MATH_THREADS)
    }

    pub fn workspace_mb(&self) -> Result<usize> {
        self.options.get_or(keys::WORKSPACE, DEFAULT_WORKSPACE_MB)
    }

    pub fn beam_size(&self) -> Result<usize> {
        let beam_size = self.options.get_or(keys::BEAM_SIZE, DEFAULT_BEAM_SIZE)?;
        if beam_size == 0 {
            return Err(DecodeError::config(keys::BEAM_SIZE, "must be at least 1"));
        }
        Ok(beam_size)
    }

    pub fn max_length_factor(&self) -> Result<f32> {
        let factor: f32 = self.options.get_or(keys::MAX_LENGTH_FACTOR, DEFAULT_MAX_LENGTH_FACTOR)?;
        if !(factor.is_finite() && factor > 0.0) {
            return Err(DecodeError::config(keys::MAX_LENGTH_FACTOR, "must be a positive number"));
        }
        Ok(factor)
    }

    pub fn unk_id(&self) -> Result<u32> {
        self.options.get_or(keys::UNK_ID, DEFAULT_UNK_ID)
    }

    pub fn truncation(&self) -> Result<TruncationPolicy> {
        let strict = self.options.get_or(keys::STRICT_LENGTH, false)?;
        Ok(if strict {
            TruncationPolicy::Strict
        } else {
            TruncationPolicy::Silent
        })
    }

    /// Checks every known key for a well-typed value.
    pub fn validate(&self) -> Result<()> {
        self.model_paths()?;
        self.math_threads()?;
        self.workspace_mb()?;
        self.beam_size()?;
        self.max_length_factor()?;
        self.unk_id()?;
        self.truncation()?;
        Ok(())
    }

    fn apply_forced(mut options: Options) -> Options {
        for (key, value) in Self::forced_options().iter() {
            if let Some(previous) = options.set(key.clone(), value.clone()) {
                if &previous != value {
                    debug!(key = %key, ?previous, forced = ?value, "overriding caller option");
                }
            }
        }
        options
    }
}

impl From<Options> for DecodingConfig {
    fn from(options: Options) -> Self {
        Self {
            options: Self::apply_forced(options),
        }
    }
}

/// Builder for [`DecodingConfig`].
///
/// ```rust
/// use beamdecode::config::DecodingConfig;
///
/// let config = DecodingConfig::builder()
///     .models(["model.npz"])
///     .beam_size(4)
///     .set("normalize", 1.0)
///     .build();
///
/// // forced keys always win
/// assert_eq!(config.options().get::<f32>("normalize").unwrap(), 0.0);
/// assert_eq!(config.beam_size().unwrap(), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DecodingConfigBuilder {
    options: Options,
}

impl DecodingConfigBuilder {
    /// Start from an existing option set.
    pub fn from_options(options: Options) -> Self {
        Self { options }
    }

    pub fn models<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        self.options.set(keys::MODEL, paths);
        self
    }

    pub fn math_threads(mut self, threads: usize) -> Self {
        self.options.set(keys::MATH_THREADS, threads);
        self
    }

    pub fn workspace_mb(mut self, megabytes: usize) -> Self {
        self.options.set(keys::WORKSPACE, megabytes);
        self
    }

    pub fn beam_size(mut self, beam_size: usize) -> Self {
        self.options.set(keys::BEAM_SIZE, beam_size);
        self
    }

    pub fn max_length_factor(mut self, factor: f32) -> Self {
        self.options.set(keys::MAX_LENGTH_FACTOR, factor);
        self
    }

    pub fn unk_id(mut self, unk_id: u32) -> Self {
        self.options.set(keys::UNK_ID, unk_id);
        self
    }

    pub fn truncation(mut self, policy: TruncationPolicy) -> Self {
        self.options
            .set(keys::STRICT_LENGTH, matches!(policy, TruncationPolicy::Strict));
        self
    }

    /// Set an arbitrary option. Forced keys set here are overwritten by `build`.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.set(key, value);
        self
    }

    pub fn build(self) -> DecodingConfig {
        DecodingConfig::from(self.options)
    }
}
