//! # Decoder
//!
//! [`BeamSearchDecoder`] is the batch-decoding boundary. Construction loads
//! the ensemble and binds it to one shared [`ExecutionContext`]; every
//! `decode` call then restricts, packs and searches one batch.
//!
//! ```no_run
//! use std::collections::HashSet;
//! use beamdecode::{BeamSearchDecoder, DecodingConfig};
//!
//! # fn main() -> beamdecode::Result<()> {
//! let config = DecodingConfig::builder()
//!     .models(["model.npz"])
//!     .beam_size(6)
//!     .build();
//! let mut decoder = BeamSearchDecoder::new(config, 2)?;
//!
//! let nbest = decoder.decode(&[vec![5, 7, 2]], 3, &HashSet::new())?;
//! let best = &nbest[0][0];
//! println!("{} {:?}", best.score, best.words);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use crate::Word;
use crate::artifact::{ModelStore, NpzModelStore};
use crate::batch::pack;
use crate::config::DecodingConfig;
use crate::context::ExecutionContext;
use crate::ensemble::{init_ensemble, load_ensemble};
use crate::error::{DecodeError, Result};
use crate::scorer::Scorer;
use crate::search::{BeamSearch, Search};
use crate::shortlist::restrict;

/// Best output for one sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub score: f32,
    pub words: Vec<Word>,
}

/// One hypothesis per sentence of a batch, in input order.
pub type NBest = Vec<Hypothesis>;

/// Results of a decode call. Always holds exactly one [`NBest`].
pub type NBestBatch = Vec<NBest>;

/// Ensemble beam-search decoder.
///
/// Not internally synchronized. Concurrent callers each need their own
/// decoder, or a [`TranslationService`](crate::service::TranslationService)
/// in front of one.
pub struct BeamSearchDecoder {
    config: DecodingConfig,
    eos: Word,
    context: Arc<ExecutionContext>,
    scorers: Vec<Box<dyn Scorer>>,
}

impl BeamSearchDecoder {
    /// Loads every configured `.npz` model.
    pub fn new(config: DecodingConfig, eos: Word) -> Result<Self> {
        Self::with_store(config, eos, &NpzModelStore)
    }

    /// Loads every configured model through `store`.
    pub fn with_store(config: DecodingConfig, eos: Word, store: &dyn ModelStore) -> Result<Self> {
        config.validate()?;
        let scorers = load_ensemble(&config, store)?;
        Self::from_scorers(config, eos, scorers)
    }

    /// Builds a decoder over an already constructed ensemble.
    ///
    /// Creates the execution context and initializes every scorer against it.
    pub fn from_scorers(config: DecodingConfig, eos: Word, mut scorers: Vec<Box<dyn Scorer>>) -> Result<Self> {
        let mut context = ExecutionContext::cpu();
        context.reserve_workspace_mb(config.workspace_mb()?);
        context.set_math_threads(config.math_threads()?);
        // validate search options before any call needs them
        BeamSearch::new(&config, eos)?;

        let context = Arc::new(context);
        init_ensemble(&mut scorers, &context)?;
        info!(
            scorers = scorers.len(),
            workspace_bytes = context.workspace_bytes(),
            math_threads = context.math_threads(),
            device = ?context.device(),
            eos,
            "decoder ready"
        );

        Ok(Self {
            config,
            eos,
            context,
            scorers,
        })
    }

    pub fn config(&self) -> &DecodingConfig {
        &self.config
    }

    pub fn eos(&self) -> Word {
        self.eos
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    pub fn scorers(&self) -> &[Box<dyn Scorer>] {
        &self.scorers
    }

    /// Decodes `sentences` with beam search.
    ///
    /// # Parameters
    ///
    /// * `sentences` - Source token ids, one sequence per sentence
    /// * `max_length` - Packed batch width, longer sentences are truncated
    ///   (or rejected under [`TruncationPolicy::Strict`](crate::batch::TruncationPolicy::Strict))
    /// * `permitted` - Output vocabulary for this call only, empty for no restriction
    pub fn decode(
        &mut self,
        sentences: &[Vec<Word>],
        max_length: usize,
        permitted: &HashSet<Word>,
    ) -> Result<NBestBatch> {
        let search = BeamSearch::new(&self.config, self.eos)?;
        self.decode_with(&search, sentences, max_length, permitted)
    }

    /// Like [`Self::decode`], with a caller-supplied search procedure.
    pub fn decode_with(
        &mut self,
        search: &dyn Search,
        sentences: &[Vec<Word>],
        max_length: usize,
        permitted: &HashSet<Word>,
    ) -> Result<NBestBatch> {
        let restricted = restrict(&mut self.scorers, permitted);
        let batch = pack(sentences, max_length, self.config.truncation()?)?;
        self.context.check_allocation(batch.byte_size())?;
        debug!(
            sentences = batch.size(),
            width = batch.width(),
            restricted,
            permitted = permitted.len(),
            "decoding batch"
        );

        let histories = search.search(&self.context, &mut self.scorers, &batch)?;
        if histories.len() != batch.size() {
            return Err(DecodeError::NoHypothesis(histories.len()));
        }

        let nbest = histories
            .iter()
            .enumerate()
            .map(|(sentence, history)| {
                history
                    .top()
                    .map(|top| Hypothesis {
                        score: top.score,
                        words: top.words,
                    })
                    .ok_or(DecodeError::NoHypothesis(sentence))
            })
            .collect::<Result<NBest>>()?;
        Ok(vec![nbest])
    }
}
