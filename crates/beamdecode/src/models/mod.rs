//! # Translation Models
//!
//! The numeric side of a scorer. A [`TranslationModel`] encodes a packed batch
//! into per-sentence state and scores next words from that state. Models are
//! built from an artifact by [`for_translation`], which dispatches on the
//! `type` key of the merged model options.

mod bow;

use candle_core::{Device, Tensor};
use crate::Word;
use crate::artifact::ModelArtifact;
use crate::batch::PackedBatch;
use crate::config::{keys, Options};
use crate::error::{DecodeError, Result};
use crate::shortlist::Shortlist;

pub use bow::BagOfWords;

/// A model usable for translation.
pub trait TranslationModel: Send {
    /// The `type` tag this model was built from.
    fn model_type(&self) -> &str;

    /// Size of the output vocabulary.
    fn target_vocab_size(&self) -> usize;

    /// Moves all parameters onto `device`.
    fn to_device(&mut self, device: &Device) -> Result<()>;

    /// Encodes `batch` into a `(sentences, hidden)` state tensor.
    fn encode(&self, batch: &PackedBatch, device: &Device) -> Result<Tensor>;

    /// One decoding step.
    ///
    /// # Parameters
    ///
    /// * `state` - `(hypotheses, hidden)` state rows
    /// * `prev_words` - Last word of each hypothesis, `None` on the first step
    /// * `shortlist` - Restricts the output columns when present
    ///
    /// # Returns
    ///
    /// `(hypotheses, columns)` log-probabilities and the next state.
    fn step(
        &self,
        state: &Tensor,
        prev_words: Option<&[Word]>,
        shortlist: Option<&Shortlist>,
    ) -> Result<(Tensor, Tensor)>;
}

/// Builds the translation model described by `options` from `artifact`.
///
/// `options` are the global decoding options merged with the artifact's
/// embedded metadata.
pub fn for_translation(options: &Options, artifact: &ModelArtifact) -> Result<Box<dyn TranslationModel>> {
    let model_type: String = options.get(keys::TYPE).map_err(|e| match e {
        DecodeError::MissingOption(_) => {
            DecodeError::metadata(artifact.path(), "model metadata has no `type`")
        }
        other => other,
    })?;

    match model_type.as_str() {
        BagOfWords::TYPE => Ok(Box::new(BagOfWords::load(options, artifact)?)),
        _ => Err(DecodeError::UnknownModelType(model_type)),
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::collections::HashMap;
    use candle_core::{Device, Tensor};
    use crate::artifact::ModelArtifact;
    use crate::config::Options;

    /// A bag-of-words artifact with `vocab` source and target words and
    /// embedding size 4, filled with a fixed deterministic pattern. Each
    /// `(word, boost)` in `favoured` raises that word's output bias.
    pub(crate) fn bow_artifact(vocab: usize, favoured: &[(u32, f32)]) -> ModelArtifact {
        let dim = 4;
        let pattern = |rows: usize, cols: usize, seed: f32| -> Tensor {
            let data: Vec<f32> = (0..rows * cols)
                .map(|i| ((i as f32 * 0.37 + seed).sin() * 0.5))
                .collect();
            Tensor::from_vec(data, (rows, cols), &Device::Cpu).unwrap()
        };
        let mut bias = vec![0f32; vocab];
        for (word, boost) in favoured {
            bias[*word as usize] += boost;
        }

        let mut parameters = HashMap::new();
        parameters.insert("encoder_Wemb".to_string(), pattern(vocab, dim, 0.1));
        parameters.insert("decoder_Wemb".to_string(), pattern(vocab, dim, 1.3));
        parameters.insert("decoder_ff_logit_out_W".to_string(), pattern(dim, vocab, 2.7));
        parameters.insert(
            "decoder_ff_logit_out_b".to_string(),
            Tensor::from_vec(bias, (1, vocab), &Device::Cpu).unwrap(),
        );

        let mut metadata = Options::new();
        metadata.set("type", "bow");
        metadata.set("dim-emb", dim);
        ModelArtifact::new("memory.npz", metadata, parameters)
    }
}
