use std::sync::{Arc, Weak};
use candle_core::{DType, Device, Tensor, D};
use crate::Word;
use crate::batch::PackedBatch;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::shortlist::{Shortlist, ShortlistGenerator};
use super::{Scorer, ScorerState, StepScores};

// A scripted scorer for testing.
//
// State rows hold the step counter. At step `s` the scorer strongly prefers
// `script[s]` (or the last script entry past its end); with an empty script
// every column is equally likely.
pub(crate) struct MockScorer {
    name: String,
    weight: f32,
    vocab: usize,
    script: Vec<Word>,
    generator: Option<Arc<dyn ShortlistGenerator>>,
    shortlist: Option<Arc<Shortlist>>,
    pub(crate) context: Option<Weak<ExecutionContext>>,
    pub(crate) init_calls: usize,
}

impl MockScorer {
    pub fn uniform(name: &str, vocab: usize) -> Self {
        Self::scripted(name, vocab, vec![])
    }

    pub fn scripted(name: &str, vocab: usize, script: Vec<Word>) -> Self {
        Self {
            name: name.to_string(),
            weight: 1.0,
            vocab,
            script,
            generator: None,
            shortlist: None,
            context: None,
            init_calls: 0,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    fn columns(&self) -> Vec<Word> {
        match &self.shortlist {
            Some(shortlist) => shortlist.indices().to_vec(),
            None => (0..self.vocab as Word).collect(),
        }
    }
}

impl Scorer for MockScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn init(&mut self, context: &Arc<ExecutionContext>) -> Result<()> {
        self.context = Some(Arc::downgrade(context));
        self.init_calls += 1;
        Ok(())
    }

    fn start_state(&mut self, batch: &PackedBatch) -> Result<ScorerState> {
        self.shortlist = self.generator.as_ref().map(|g| g.generate(batch));
        let hidden = Tensor::zeros((batch.size(), 1), DType::F32, &Device::Cpu)?;
        Ok(ScorerState::new(hidden))
    }

    fn score(&self, state: &ScorerState, _prev_words: Option<&[Word]>) -> Result<StepScores> {
        let steps = state.hidden().to_vec2::<f32>()?;
        let columns = self.columns();
        let mut logits: Vec<f32> = Vec::with_capacity(steps.len() * columns.len());
        for row in steps.iter() {
            let step = row[0] as usize;
            let preferred = self.script.get(step).or(self.script.last()).copied();
            for word in columns.iter() {
                let logit = match preferred {
                    Some(p) if p == *word => 0.0,
                    Some(_) => -5.0,
                    None => 0.0,
                };
                logits.push(logit);
            }
        }
        let logits = Tensor::from_vec(logits, (steps.len(), columns.len()), &Device::Cpu)?;
        let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;
        let next = state.hidden().affine(1.0, 1.0)?;
        Ok(StepScores {
            log_probs,
            state: ScorerState::new(next),
        })
    }

    fn set_shortlist_generator(&mut self, generator: Option<Arc<dyn ShortlistGenerator>>) {
        self.generator = generator;
    }

    fn shortlist(&self) -> Option<Arc<Shortlist>> {
        self.shortlist.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{pack, TruncationPolicy};

    #[test]
    fn test_init_binds_weakly() {
        let mut scorer = MockScorer::uniform("F0", 4);
        let context = Arc::new(ExecutionContext::cpu());
        scorer.init(&context).unwrap();
        assert_eq!(scorer.init_calls, 1);
        assert!(scorer.context.as_ref().unwrap().upgrade().is_some());

        drop(context);
        assert!(scorer.context.as_ref().unwrap().upgrade().is_none());
    }

    #[test]
    fn test_script_advances_per_step() {
        let mut scorer = MockScorer::scripted("F0", 4, vec![3, 1]);
        let batch = pack(&[vec![2]], 1, TruncationPolicy::Silent).unwrap();
        let state = scorer.start_state(&batch).unwrap();

        let first = scorer.score(&state, None).unwrap();
        let row = first.log_probs.to_vec2::<f32>().unwrap().remove(0);
        assert!(row[3] > row[0]);

        let second = scorer.score(&first.state, Some(&[3])).unwrap();
        let row = second.log_probs.to_vec2::<f32>().unwrap().remove(0);
        assert!(row[1] > row[3]);
    }
}
