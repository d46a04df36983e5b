//! # Scorers
//!
//! An ensemble is a list of trait objects implementing [`Scorer`]. The search
//! only ever talks to this interface; what sits behind it (a loaded model, a
//! language model, a test double) is up to the implementation.
//!
//! ## Lifecycle
//!
//! 1. `init` binds the scorer to the decoder's shared [`ExecutionContext`] once
//! 2. Per decode call, `set_shortlist_generator` installs or clears a restriction
//! 3. `start_state` encodes the packed batch, one state row per sentence
//! 4. `score` is called once per search step on the rows of live hypotheses

mod model_scorer;

#[cfg(test)]
pub(crate) mod mock_scorer;

use std::sync::Arc;
use candle_core::Tensor;
use crate::Word;
use crate::batch::PackedBatch;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::shortlist::{Shortlist, ShortlistGenerator};

pub use model_scorer::ModelScorer;

/// Per-hypothesis scorer state. Row `i` belongs to hypothesis `i` of the
/// current search step.
#[derive(Debug, Clone)]
pub struct ScorerState {
    hidden: Tensor,
}

impl ScorerState {
    pub fn new(hidden: Tensor) -> Self {
        Self { hidden }
    }

    pub fn hidden(&self) -> &Tensor {
        &self.hidden
    }

    pub fn rows(&self) -> Result<usize> {
        Ok(self.hidden.dim(0)?)
    }

    /// Gathers `rows` (in order, repeats allowed) into a new state.
    pub fn select(&self, rows: &[u32]) -> Result<Self> {
        let index = Tensor::from_slice(rows, rows.len(), self.hidden.device())?;
        Ok(Self {
            hidden: self.hidden.index_select(&index, 0)?,
        })
    }
}

/// Output of one scoring step.
#[derive(Debug, Clone)]
pub struct StepScores {
    /// `(hypotheses, columns)` log-probabilities. Columns are vocabulary ids,
    /// or shortlist columns while a shortlist is active.
    pub log_probs: Tensor,
    /// State after consuming the step, rows aligned with `log_probs`
    pub state: ScorerState,
}

/// One member of a decoding ensemble.
pub trait Scorer: Send {
    /// Unique tag within the ensemble.
    fn name(&self) -> &str;

    /// Weight of this scorer's log-probs in the ensemble sum.
    fn weight(&self) -> f32;

    /// Binds the scorer to the shared context. Called once, before any decode.
    fn init(&mut self, context: &Arc<ExecutionContext>) -> Result<()>;

    /// Initial state for `batch`, one row per sentence. Also resolves the
    /// shortlist for this batch when a generator is installed.
    fn start_state(&mut self, batch: &PackedBatch) -> Result<ScorerState>;

    /// Scores the next word for every row of `state`.
    ///
    /// `prev_words` holds the last word of each hypothesis, `None` on the
    /// first step.
    fn score(&self, state: &ScorerState, prev_words: Option<&[Word]>) -> Result<StepScores>;

    /// Installs (`Some`) or removes (`None`) the vocabulary restriction.
    fn set_shortlist_generator(&mut self, generator: Option<Arc<dyn ShortlistGenerator>>);

    /// Shortlist resolved by the last `start_state`, if restricted.
    fn shortlist(&self) -> Option<Arc<Shortlist>>;
}
