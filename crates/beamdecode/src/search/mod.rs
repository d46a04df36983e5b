//! # Search
//!
//! A [`Search`] drives the ensemble over a packed batch and returns one
//! [`History`] per sentence, in batch order. The decoder only ever asks a
//! history for its [`History::top`] result.

mod beam;

use std::sync::Arc;
use crate::Word;
use crate::batch::PackedBatch;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::scorer::Scorer;

pub use beam::BeamSearch;

/// A search procedure over an ensemble.
pub trait Search {
    /// Searches every sentence of `batch`.
    ///
    /// # Returns
    ///
    /// One history per sentence of `batch`, in order. An empty batch yields
    /// no histories.
    fn search(
        &self,
        context: &Arc<ExecutionContext>,
        scorers: &mut [Box<dyn Scorer>],
        batch: &PackedBatch,
    ) -> Result<Vec<History>>;
}

/// One finished (or best-partial) output of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub words: Vec<Word>,
    /// Ensemble log-probability of each word
    pub step_scores: Vec<f32>,
    pub score: f32,
}

impl SearchResult {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Collected results of one sentence.
#[derive(Debug, Clone)]
pub struct History {
    sentence: usize,
    results: Vec<SearchResult>,
    normalize: f32,
}

impl History {
    /// `normalize` is the length normalization exponent used by [`Self::top`].
    pub fn new(sentence: usize, normalize: f32) -> Self {
        Self {
            sentence,
            results: vec![],
            normalize,
        }
    }

    /// Position of the sentence in its batch.
    pub fn sentence(&self) -> usize {
        self.sentence
    }

    pub fn push(&mut self, result: SearchResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    fn normalized(&self, result: &SearchResult) -> f32 {
        if self.normalize > 0.0 {
            result.score / (result.len().max(1) as f32).powf(self.normalize)
        } else {
            result.score
        }
    }

    /// Best result by normalized score. The returned score is normalized too.
    /// Ties go to the result pushed first.
    pub fn top(&self) -> Option<SearchResult> {
        let mut best: Option<(f32, &SearchResult)> = None;
        for result in self.results.iter() {
            let score = self.normalized(result);
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, result));
            }
        }
        best.map(|(score, result)| SearchResult {
            score,
            ..result.clone()
        })
    }
}
