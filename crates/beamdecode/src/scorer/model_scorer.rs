use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use crate::Word;
use crate::batch::PackedBatch;
use crate::context::ExecutionContext;
use crate::error::{DecodeError, Result};
use crate::models::TranslationModel;
use crate::shortlist::{Shortlist, ShortlistGenerator};
use super::{Scorer, ScorerState, StepScores};

/// Wraps a loaded [`TranslationModel`] as an ensemble member.
///
/// The scorer does not own its execution context: `init` stores a [`Weak`]
/// handle, and every later call upgrades it. Scoring after the decoder (and
/// with it the context) is gone fails with [`DecodeError::ContextReleased`].
pub struct ModelScorer {
    name: String,
    weight: f32,
    path: PathBuf,
    model: Box<dyn TranslationModel>,
    context: Option<Weak<ExecutionContext>>,
    generator: Option<Arc<dyn ShortlistGenerator>>,
    shortlist: Option<Arc<Shortlist>>,
}

impl ModelScorer {
    pub fn new(
        name: impl Into<String>,
        weight: f32,
        path: impl Into<PathBuf>,
        model: Box<dyn TranslationModel>,
    ) -> Self {
        Self {
            name: name.into(),
            weight,
            path: path.into(),
            model,
            context: None,
            generator: None,
            shortlist: None,
        }
    }

    /// Artifact the model was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model(&self) -> &dyn TranslationModel {
        self.model.as_ref()
    }

    fn context(&self) -> Result<Arc<ExecutionContext>> {
        self.context
            .as_ref()
            .ok_or_else(|| DecodeError::NotInitialized(self.name.clone()))?
            .upgrade()
            .ok_or_else(|| DecodeError::ContextReleased(self.name.clone()))
    }
}

impl Scorer for ModelScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn init(&mut self, context: &Arc<ExecutionContext>) -> Result<()> {
        self.model.to_device(context.device())?;
        self.context = Some(Arc::downgrade(context));
        Ok(())
    }

    fn start_state(&mut self, batch: &PackedBatch) -> Result<ScorerState> {
        let context = self.context()?;

        self.shortlist = match &self.generator {
            Some(generator) => {
                let shortlist = generator.generate(batch);
                let vocab_size = self.model.target_vocab_size();
                if let Some(word) = shortlist.max_word().filter(|w| *w as usize >= vocab_size) {
                    return Err(DecodeError::ShortlistOutOfVocab { word, vocab_size });
                }
                Some(shortlist)
            }
            None => None,
        };

        let hidden = self.model.encode(batch, context.device())?;
        Ok(ScorerState::new(hidden))
    }

    fn score(&self, state: &ScorerState, prev_words: Option<&[Word]>) -> Result<StepScores> {
        // only checks that the context is still alive
        self.context()?;
        let (log_probs, next) = self
            .model
            .step(state.hidden(), prev_words, self.shortlist.as_deref())?;
        Ok(StepScores {
            log_probs,
            state: ScorerState::new(next),
        })
    }

    fn set_shortlist_generator(&mut self, generator: Option<Arc<dyn ShortlistGenerator>>) {
        self.generator = generator;
        if self.generator.is_none() {
            self.shortlist = None;
        }
    }

    fn shortlist(&self) -> Option<Arc<Shortlist>> {
        self.shortlist.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use crate::batch::{pack, TruncationPolicy};
    use crate::models::{for_translation, test_utils::bow_artifact};
    use crate::shortlist::FixedShortlistGenerator;

    fn scorer(vocab: usize) -> ModelScorer {
        let artifact = bow_artifact(vocab, &[]);
        let model = for_translation(artifact.metadata(), &artifact).unwrap();
        ModelScorer::new("F0", 1.0, artifact.path(), model)
    }

    #[test]
    fn test_requires_init() {
        let mut scorer = scorer(8);
        let batch = pack(&[vec![1, 2]], 2, TruncationPolicy::Silent).unwrap();
        assert!(matches!(
            scorer.start_state(&batch),
            Err(DecodeError::NotInitialized(name)) if name == "F0"
        ));
    }

    #[test]
    fn test_released_context() {
        let mut scorer = scorer(8);
        let batch = pack(&[vec![1, 2]], 2, TruncationPolicy::Silent).unwrap();
        let context = Arc::new(ExecutionContext::cpu());
        scorer.init(&context).unwrap();
        let state = scorer.start_state(&batch).unwrap();

        drop(context);
        assert!(matches!(
            scorer.score(&state, None),
            Err(DecodeError::ContextReleased(_))
        ));
    }

    #[test]
    fn test_scores_full_vocab() {
        let mut scorer = scorer(8);
        let context = Arc::new(ExecutionContext::cpu());
        scorer.init(&context).unwrap();
        let batch = pack(&[vec![1, 2], vec![3]], 2, TruncationPolicy::Silent).unwrap();

        let state = scorer.start_state(&batch).unwrap();
        assert_eq!(state.rows().unwrap(), 2);
        let step = scorer.score(&state, None).unwrap();
        assert_eq!(step.log_probs.dims(), &[2, 8]);
        assert_eq!(step.state.rows().unwrap(), 2);
        assert_eq!(scorer.name(), "F0");
        assert_eq!(scorer.weight(), 1.0);
    }

    #[test]
    fn test_shortlist_columns() {
        let mut scorer = scorer(8);
        let context = Arc::new(ExecutionContext::cpu());
        scorer.init(&context).unwrap();
        let permitted: HashSet<Word> = [2, 5, 7].into_iter().collect();
        scorer.set_shortlist_generator(Some(Arc::new(FixedShortlistGenerator::new(&permitted))));

        let batch = pack(&[vec![1, 2]], 2, TruncationPolicy::Silent).unwrap();
        let state = scorer.start_state(&batch).unwrap();
        let step = scorer.score(&state, Some(&[4])).unwrap();
        assert_eq!(step.log_probs.dims(), &[1, 3]);

        scorer.set_shortlist_generator(None);
        assert!(scorer.shortlist().is_none());
    }

    #[test]
    fn test_shortlist_outside_vocab() {
        let mut scorer = scorer(8);
        let context = Arc::new(ExecutionContext::cpu());
        scorer.init(&context).unwrap();
        let permitted: HashSet<Word> = [2, 8].into_iter().collect();
        scorer.set_shortlist_generator(Some(Arc::new(FixedShortlistGenerator::new(&permitted))));

        let batch = pack(&[vec![1]], 1, TruncationPolicy::Silent).unwrap();
        assert!(matches!(
            scorer.start_state(&batch),
            Err(DecodeError::ShortlistOutOfVocab { word: 8, vocab_size: 8 })
        ));
    }
}
