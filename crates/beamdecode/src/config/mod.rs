//! # Decoding Configuration
//!
//! Typed option storage ([`Options`]) and the validated decoding configuration
//! ([`DecodingConfig`]) a decoder is constructed from.
//!
//! A handful of keys are forced to fixed values for this decoder regardless of
//! what the caller supplies. They are part of the public contract:
//! [`DecodingConfig::FORCED_KEYS`] names them and
//! [`DecodingConfig::forced_options`] returns their values. The builder applies
//! them as the very last step, so caller-supplied values for those keys are
//! always replaced.

mod decoding;
mod options;

pub use decoding::{DecodingConfig, DecodingConfigBuilder};
pub use options::{FromOptionValue, OptionValue, Options};

/// Option names understood by the decoder.
pub mod keys {
    /// Ordered list of model artifact paths
    pub const MODEL: &str = "model";
    /// Worker threads for the math library
    pub const MATH_THREADS: &str = "mkl-threads";
    pub const INFERENCE: &str = "inference";
    pub const WORD_PENALTY: &str = "word-penalty";
    /// Length normalization exponent, `0` disables normalization
    pub const NORMALIZE: &str = "normalize";
    pub const N_BEST: &str = "n-best";
    pub const ALLOW_UNK: &str = "allow-unk";
    pub const BEAM_SIZE: &str = "beam-size";
    pub const MAX_LENGTH_FACTOR: &str = "max-length-factor";
    /// Workspace reservation in megabytes
    pub const WORKSPACE: &str = "workspace";
    /// Fail instead of truncating sentences longer than the length bound
    pub const STRICT_LENGTH: &str = "strict-length";
    pub const UNK_ID: &str = "unk-id";
    /// Model type tag inside embedded metadata
    pub const TYPE: &str = "type";

    /// Keys owned by the decoding run rather than by any one model.
    ///
    /// When the global configuration defines one of these, an artifact's
    /// embedded metadata can not override it.
    pub const SHARED_DECODE_KEYS: &[&str] = &[
        MODEL,
        MATH_THREADS,
        INFERENCE,
        WORD_PENALTY,
        NORMALIZE,
        N_BEST,
        ALLOW_UNK,
        BEAM_SIZE,
        MAX_LENGTH_FACTOR,
        WORKSPACE,
        STRICT_LENGTH,
        UNK_ID,
    ];
}
