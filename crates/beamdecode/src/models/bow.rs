use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Embedding, Module};
use crate::Word;
use crate::artifact::ModelArtifact;
use crate::batch::PackedBatch;
use crate::config::Options;
use crate::error::{DecodeError, Result};
use crate::shortlist::Shortlist;
use super::TranslationModel;

const SRC_EMBEDDINGS: &str = "encoder_Wemb";
const TGT_EMBEDDINGS: &str = "decoder_Wemb";
const OUTPUT_WEIGHTS: &str = "decoder_ff_logit_out_W";
const OUTPUT_BIAS: &str = "decoder_ff_logit_out_b";

/// Bag-of-words encoder-decoder.
///
/// The encoder averages source embeddings over the valid cells of the
/// time-major grid. Each decoding step computes
/// `tanh(context + embed(prev_word))`, projects it onto the output vocabulary
/// (or the shortlist columns) and normalizes with log-softmax. The state is
/// the source context and does not change between steps.
pub struct BagOfWords {
    src_emb: Embedding,
    tgt_emb: Embedding,
    /// `(dim, target_vocab)`
    out_w: Tensor,
    /// `(target_vocab,)`
    out_b: Tensor,
    dim: usize,
    target_vocab: usize,
}

impl BagOfWords {
    pub const TYPE: &'static str = "bow";

    /// Builds the model from its artifact, validating parameter shapes.
    pub fn load(options: &Options, artifact: &ModelArtifact) -> Result<Self> {
        let shape_error = |reason: String| DecodeError::metadata(artifact.path(), reason);
        let param = |name: &str| -> Result<Tensor> {
            Ok(artifact.require(name)?.to_dtype(DType::F32)?)
        };

        let src = param(SRC_EMBEDDINGS)?;
        let tgt = param(TGT_EMBEDDINGS)?;
        let out_w = param(OUTPUT_WEIGHTS)?;
        let out_b = param(OUTPUT_BIAS)?.flatten_all()?;

        let (_, dim) = src.dims2()?;
        let (target_vocab, tgt_dim) = tgt.dims2()?;
        let (w_rows, w_cols) = out_w.dims2()?;

        if tgt_dim != dim || w_rows != dim {
            return Err(shape_error(format!(
                "embedding sizes disagree: {SRC_EMBEDDINGS} has {dim}, {TGT_EMBEDDINGS} has {tgt_dim}, {OUTPUT_WEIGHTS} has {w_rows}"
            )));
        }
        if w_cols != target_vocab || out_b.dim(0)? != target_vocab {
            return Err(shape_error(format!(
                "output layer does not cover the target vocabulary of {target_vocab}"
            )));
        }
        if options.has("dim-emb") {
            let declared: usize = options.get("dim-emb")?;
            if declared != dim {
                return Err(shape_error(format!(
                    "dim-emb is {declared} but parameters have {dim}"
                )));
            }
        }

        Ok(Self {
            src_emb: Embedding::new(src, dim),
            tgt_emb: Embedding::new(tgt, dim),
            out_w,
            out_b,
            dim,
            target_vocab,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl TranslationModel for BagOfWords {
    fn model_type(&self) -> &str {
        Self::TYPE
    }

    fn target_vocab_size(&self) -> usize {
        self.target_vocab
    }

    fn to_device(&mut self, device: &Device) -> Result<()> {
        self.src_emb = Embedding::new(self.src_emb.embeddings().to_device(device)?, self.dim);
        self.tgt_emb = Embedding::new(self.tgt_emb.embeddings().to_device(device)?, self.dim);
        self.out_w = self.out_w.to_device(device)?;
        self.out_b = self.out_b.to_device(device)?;
        Ok(())
    }

    fn encode(&self, batch: &PackedBatch, device: &Device) -> Result<Tensor> {
        let sub = batch.front();
        let (ids, mask) = sub.to_tensors(device)?;

        // (width, size, dim) with padding cells zeroed
        let embedded = self.src_emb.forward(&ids)?;
        let masked = embedded.broadcast_mul(&mask.unsqueeze(2)?)?;
        let summed = masked.sum(0)?;

        let lengths: Vec<f32> = (0..sub.batch_size())
            .map(|b| sub.sentence_length(b).max(1) as f32)
            .collect();
        let lengths = Tensor::from_vec(lengths, (sub.batch_size(), 1), device)?;
        Ok(summed.broadcast_div(&lengths)?)
    }

    fn step(
        &self,
        state: &Tensor,
        prev_words: Option<&[Word]>,
        shortlist: Option<&Shortlist>,
    ) -> Result<(Tensor, Tensor)> {
        let hidden = match prev_words {
            Some(words) => {
                let ids = Tensor::from_slice(words, words.len(), state.device())?;
                state.add(&self.tgt_emb.forward(&ids)?)?.tanh()?
            }
            None => state.tanh()?,
        };

        let (w, b) = match shortlist {
            Some(shortlist) => {
                let columns = shortlist.to_tensor(self.out_w.device())?;
                (self.out_w.index_select(&columns, 1)?, self.out_b.index_select(&columns, 0)?)
            }
            None => (self.out_w.clone(), self.out_b.clone()),
        };

        let logits = hidden.matmul(&w)?.broadcast_add(&b)?;
        let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;
        Ok((log_probs, state.clone()))
    }
}
