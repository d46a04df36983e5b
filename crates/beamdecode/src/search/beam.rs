use std::sync::Arc;
use tracing::{debug, trace};
use crate::Word;
use crate::batch::PackedBatch;
use crate::config::{keys, DecodingConfig};
use crate::context::ExecutionContext;
use crate::error::{DecodeError, Result};
use crate::scorer::{Scorer, ScorerState, StepScores};
use super::{History, Search, SearchResult};

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// A live partial hypothesis.
#[derive(Debug, Clone)]
struct Hypothesis {
    words: Vec<Word>,
    step_scores: Vec<f32>,
    score: f32,
    /// Row of this hypothesis in the current scorer states
    row: usize,
}

impl Hypothesis {
    fn root(row: usize) -> Self {
        Self {
            words: vec![],
            step_scores: vec![],
            score: 0.0,
            row,
        }
    }

    fn extend(&self, word: Word, log_prob: f32, score: f32) -> Self {
        let mut words = self.words.clone();
        words.push(word);
        let mut step_scores = self.step_scores.clone();
        step_scores.push(log_prob);
        Self {
            words,
            step_scores,
            score,
            row: self.row,
        }
    }

    fn into_result(self) -> SearchResult {
        SearchResult {
            words: self.words,
            step_scores: self.step_scores,
            score: self.score,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    /// Index into the sentence's live hypotheses
    parent: usize,
    word: Word,
    log_prob: f32,
    score: f32,
}

/// Ensemble beam search.
///
/// Each sentence keeps up to `beam-size` live hypotheses. A step sums the
/// weighted log-probabilities of every scorer, expands each live hypothesis
/// by every output column, and keeps the best candidates. A hypothesis ends
/// when it emits the end-of-sequence word or reaches the length limit of
/// `ceil(max-length-factor * batch width)` words; every ended hypothesis
/// shrinks its sentence's beam by one.
///
/// Candidates with equal scores keep their expansion order (parent first,
/// then column), so results depend only on the inputs and ensemble order.
#[derive(Debug, Clone)]
pub struct BeamSearch {
    beam_size: usize,
    max_length_factor: f32,
    eos: Word,
    unk: Word,
    allow_unk: bool,
    word_penalty: f32,
    normalize: f32,
}

impl BeamSearch {
    pub fn new(config: &DecodingConfig, eos: Word) -> Result<Self> {
        let options = config.options();
        Ok(Self {
            beam_size: config.beam_size()?,
            max_length_factor: config.max_length_factor()?,
            eos,
            unk: config.unk_id()?,
            allow_unk: options.get_or(keys::ALLOW_UNK, false)?,
            word_penalty: options.get_or(keys::WORD_PENALTY, 0.0)?,
            normalize: options.get_or(keys::NORMALIZE, 0.0)?,
        })
    }

    pub fn with_word_penalty(mut self, penalty: f32) -> Self {
        self.word_penalty = penalty;
        self
    }

    pub fn with_normalize(mut self, exponent: f32) -> Self {
        self.normalize = exponent;
        self
    }

    pub fn with_allow_unk(mut self, allow: bool) -> Self {
        self.allow_unk = allow;
        self
    }

    pub fn beam_size(&self) -> usize {
        self.beam_size
    }

    pub fn eos(&self) -> Word {
        self.eos
    }

    /// Maximum number of output words for a batch of `width` time steps.
    pub fn length_limit(&self, width: usize) -> usize {
        ((self.max_length_factor * width as f32).ceil() as usize).max(1)
    }

    /// Weighted ensemble sum, `rows x columns`, flattened row-major.
    fn combine(
        scorers: &[Box<dyn Scorer>],
        steps: &[StepScores],
    ) -> Result<(Vec<f32>, usize)> {
        let mut total: Vec<f32> = vec![];
        let mut columns = 0;
        for (scorer, step) in scorers.iter().zip(steps.iter()) {
            let (rows, cols) = step.log_probs.dims2()?;
            let values = step.log_probs.flatten_all()?.to_vec1::<f32>()?;
            if total.is_empty() {
                columns = cols;
                total = vec![0.0; rows * cols];
            } else if cols != columns || values.len() != total.len() {
                return Err(DecodeError::ColumnMismatch {
                    scorer: scorer.name().to_string(),
                    columns: cols,
                    expected: columns,
                });
            }
            let weight = scorer.weight();
            for (sum, value) in total.iter_mut().zip(values) {
                *sum += weight * value;
            }
        }
        Ok((total, columns))
    }
}

impl Search for BeamSearch {
    fn search(
        &self,
        context: &Arc<ExecutionContext>,
        scorers: &mut [Box<dyn Scorer>],
        batch: &PackedBatch,
    ) -> Result<Vec<History>> {
        if batch.is_empty() || scorers.is_empty() {
            return Ok(vec![]);
        }
        context.check_allocation(batch.byte_size())?;

        let sentences = batch.size();
        let limit = self.length_limit(batch.width());

        let mut states: Vec<ScorerState> = scorers
            .iter_mut()
            .map(|scorer| scorer.start_state(batch))
            .collect::<Result<_>>()?;
        let shortlist = scorers[0].shortlist();

        let mut histories: Vec<History> = (0..sentences)
            .map(|s| History::new(s, self.normalize))
            .collect();
        let mut beams: Vec<Vec<Hypothesis>> = (0..sentences).map(|s| vec![Hypothesis::root(s)]).collect();

        for step in 0..limit {
            let rows: usize = beams.iter().map(Vec::len).sum();
            if rows == 0 {
                break;
            }

            let prev_words: Option<Vec<Word>> = (step > 0).then(|| {
                beams
                    .iter()
                    .flatten()
                    .map(|h| h.words.last().copied().unwrap_or(self.eos))
                    .collect()
            });
            let steps = scorers
                .iter()
                .zip(states.iter())
                .map(|(scorer, state)| scorer.score(state, prev_words.as_deref()))
                .collect::<Result<Vec<_>>>()?;
            let (scores, columns) = Self::combine(scorers, &steps)?;
            context.check_allocation(rows * columns * F32_BYTES * scorers.len())?;
            trace!(step, rows, columns, "beam step");

            let last_step = step + 1 == limit;
            let mut next_beams: Vec<Vec<Hypothesis>> = Vec::with_capacity(sentences);
            let mut parents: Vec<u32> = Vec::with_capacity(rows);
            let mut offset = 0;

            for (s, beam) in beams.iter().enumerate() {
                let history = &mut histories[s];
                let width = self.beam_size.saturating_sub(history.len());
                let mut candidates: Vec<Candidate> = vec![];

                for (parent, hyp) in beam.iter().enumerate() {
                    let row = &scores[(offset + parent) * columns..(offset + parent + 1) * columns];
                    for (column, log_prob) in row.iter().enumerate() {
                        let word = match &shortlist {
                            Some(shortlist) => match shortlist.reverse_map(column) {
                                Some(word) => word,
                                None => continue,
                            },
                            None => column as Word,
                        };
                        if word == self.unk && !self.allow_unk {
                            continue;
                        }
                        let score = hyp.score + log_prob + self.word_penalty;
                        if !score.is_finite() {
                            continue;
                        }
                        candidates.push(Candidate {
                            parent,
                            word,
                            log_prob: *log_prob,
                            score,
                        });
                    }
                }

                let mut survivors = vec![];
                if candidates.is_empty() {
                    // nothing can extend this sentence, keep what it has
                    for hyp in beam.iter() {
                        history.push(hyp.clone().into_result());
                    }
                } else {
                    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
                    for candidate in candidates.into_iter().take(width) {
                        let hyp = beam[candidate.parent].extend(candidate.word, candidate.log_prob, candidate.score);
                        if candidate.word == self.eos || last_step {
                            history.push(hyp.into_result());
                        } else {
                            parents.push(hyp.row as u32);
                            survivors.push(hyp);
                        }
                    }
                }

                offset += beam.len();
                next_beams.push(survivors);
            }

            // renumber rows in the order the next states are gathered
            let mut row = 0;
            for hyp in next_beams.iter_mut().flatten() {
                hyp.row = row;
                row += 1;
            }
            beams = next_beams;

            if parents.is_empty() {
                break;
            }
            states = steps
                .into_iter()
                .map(|step| step.state.select(&parents))
                .collect::<Result<_>>()?;
        }

        debug!(
            sentences,
            limit,
            results = histories.iter().map(History::len).sum::<usize>(),
            "beam search finished"
        );
        Ok(histories)
    }
}
