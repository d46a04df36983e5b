use candle_core::{Device, Tensor};
use crate::Word;
use crate::error::Result;

/// One stream of a packed batch in time-major layout.
///
/// Cell `(t, b)` lives at offset `t * size + b`: every sentence's token for
/// time step 0 comes first, then time step 1, and so on. `mask` holds `1.0`
/// on cells that carry a real token and `0.0` on padding.
#[derive(Debug, Clone, PartialEq)]
pub struct SubBatch {
    data: Vec<Word>,
    mask: Vec<f32>,
    size: usize,
    width: usize,
    words: usize,
}

impl SubBatch {
    /// A `width x size` grid of padding.
    pub fn new(size: usize, width: usize) -> Self {
        let cells = size * width;
        Self {
            data: vec![Word::default(); cells],
            mask: vec![0.0; cells],
            size,
            width,
            words: 0,
        }
    }

    /// Writes `word` at time step `t` of sentence `b` and marks the cell valid.
    pub(crate) fn put(&mut self, t: usize, b: usize, word: Word) {
        let idx = t * self.size + b;
        self.data[idx] = word;
        if self.mask[idx] == 0.0 {
            self.words += 1;
        }
        self.mask[idx] = 1.0;
    }

    pub fn data(&self) -> &[Word] {
        &self.data
    }

    pub fn mask(&self) -> &[f32] {
        &self.mask
    }

    /// Number of sentences.
    pub fn batch_size(&self) -> usize {
        self.size
    }

    /// Number of time steps.
    pub fn batch_width(&self) -> usize {
        self.width
    }

    /// Number of valid (unmasked) cells.
    pub fn batch_words(&self) -> usize {
        self.words
    }

    /// Valid length of sentence `b`, i.e. the number of set mask cells in its column.
    pub fn sentence_length(&self, b: usize) -> usize {
        (0..self.width)
            .filter(|t| self.mask[t * self.size + b] != 0.0)
            .count()
    }

    /// Bytes held by the token and mask grids.
    pub fn byte_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<Word>() + self.mask.len() * std::mem::size_of::<f32>()
    }

    /// Token ids as a `(width, size)` u32 tensor and the mask as a `(width, size)` f32 tensor.
    pub fn to_tensors(&self, device: &Device) -> Result<(Tensor, Tensor)> {
        let shape = (self.width, self.size);
        let ids = Tensor::from_vec(self.data.clone(), shape, device)?;
        let mask = Tensor::from_vec(self.mask.clone(), shape, device)?;
        Ok((ids, mask))
    }
}
