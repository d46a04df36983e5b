//! # beamdecode
//!
//! Batch decoding for translation model ensembles.
//!
//! ## Overview
//!
//! A [`BeamSearchDecoder`] takes tokenized source sentences, packs them into a
//! padded, mask-annotated batch, drives an ensemble of trained models through
//! beam search, and returns the best-scoring hypothesis for every sentence.
//! Callers never see the tensor layout or the search machinery.
//!
//! ## Architecture
//!
//! ### Ensemble
//!
//! Every configured model artifact becomes one [`Scorer`], tagged `F0`, `F1`,
//! ... in configuration order. All scorers are bound once to a single shared
//! [`ExecutionContext`] and hold only a weak handle to it.
//!
//! ### Packed batches
//!
//! [`pack`] lays sentences out *time-major*: entry `(t, b)` of the token and
//! mask grids lives at offset `t * batch_size + b`. Sentences longer than the
//! length bound are truncated, or rejected under [`TruncationPolicy::Strict`].
//!
//! ### Vocabulary restriction
//!
//! A decode call may pass a set of permitted output ids. It applies to that
//! call only; an empty set means no restriction.
//!
//! ### Forced options
//!
//! Some decoding options have fixed values for this decoder, see
//! [`DecodingConfig::FORCED_KEYS`].
//!
//! ## Features
//!
//! - **service** - Asynchronous request batching in front of one decoder (default)
//!
//! ## Example
//!
//! ```no_run
//! use std::collections::HashSet;
//! use beamdecode::{BeamSearchDecoder, DecodingConfig};
//!
//! # fn main() -> beamdecode::Result<()> {
//! let config = DecodingConfig::builder()
//!     .models(["ende.npz", "ende.r2l.npz"])
//!     .workspace_mb(1024)
//!     .build();
//! let mut decoder = BeamSearchDecoder::new(config, 0)?;
//!
//! let sentences = vec![vec![12, 98, 4, 0], vec![7, 0]];
//! let nbest = decoder.decode(&sentences, 50, &HashSet::new())?;
//! for hypothesis in &nbest[0] {
//!     println!("{:.3} {:?}", hypothesis.score, hypothesis.words);
//! }
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod batch;
pub mod config;
pub mod context;
pub mod ensemble;
pub mod models;
pub mod scorer;
pub mod search;
pub mod shortlist;

mod decoder;
mod error;

#[cfg(feature = "service")]
pub mod service;

/// A token id.
pub type Word = u32;

pub use batch::{pack, PackedBatch, TruncationPolicy};
pub use config::{DecodingConfig, DecodingConfigBuilder, Options};
pub use context::ExecutionContext;
pub use decoder::{BeamSearchDecoder, Hypothesis, NBest, NBestBatch};
pub use error::{DecodeError, Result};
pub use scorer::Scorer;
