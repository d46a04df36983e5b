//! # Packed Batches
//!
//! Converts a list of variable-length token sequences into the rectangular,
//! mask-annotated representation the scorers consume.
//!
//! ## Layout
//!
//! The grid is *time-major*: all batch entries of time step 0 are contiguous,
//! followed by time step 1, and so on. Masked computation downstream relies on
//! this layout, so it is never transposed into batch-major order.
//!
//! ## Sentence identifiers
//!
//! Every row carries sentence id `0`. Results are matched to inputs by position,
//! not by id.

mod packer;
mod sub_batch;

pub use packer::{pack, TruncationPolicy};
pub use sub_batch::SubBatch;

/// A set of sentences in packed form.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedBatch {
    sub_batches: Vec<SubBatch>,
    sentence_ids: Vec<usize>,
}

impl PackedBatch {
    /// Wraps already packed sub-batches. All of them must share one batch size.
    ///
    /// Crate-private: outside callers go through [`pack`], which always
    /// produces the source stream.
    pub(crate) fn new(sub_batches: Vec<SubBatch>) -> Self {
        Self {
            sub_batches,
            sentence_ids: vec![],
        }
    }

    pub fn sub_batches(&self) -> &[SubBatch] {
        &self.sub_batches
    }

    /// The source stream.
    ///
    /// # Panics
    ///
    /// If the batch holds no sub-batch. Only crate-internal construction can
    /// produce one; batches from [`pack`] always have a front.
    pub fn front(&self) -> &SubBatch {
        &self.sub_batches[0]
    }

    /// Number of sentences.
    pub fn size(&self) -> usize {
        self.sub_batches.first().map(SubBatch::batch_size).unwrap_or(0)
    }

    /// Number of time steps of the source stream.
    pub fn width(&self) -> usize {
        self.sub_batches.first().map(SubBatch::batch_width).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn sentence_ids(&self) -> &[usize] {
        &self.sentence_ids
    }

    pub fn set_sentence_ids(&mut self, ids: Vec<usize>) {
        self.sentence_ids = ids;
    }

    /// Bytes held by all token and mask grids.
    pub fn byte_size(&self) -> usize {
        self.sub_batches.iter().map(SubBatch::byte_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_wrapper() {
        let batch = PackedBatch::new(vec![]);
        assert_eq!(batch.size(), 0);
        assert_eq!(batch.width(), 0);
        assert!(batch.is_empty());
        assert_eq!(batch.byte_size(), 0);
    }

    #[test]
    fn test_packed_empty_input_has_front() {
        let batch = pack(&[], 3, TruncationPolicy::Silent).unwrap();
        assert_eq!(batch.sub_batches().len(), 1);
        assert_eq!(batch.front().batch_size(), 0);
        assert_eq!(batch.front().batch_width(), 3);
    }

    #[test]
    fn test_byte_size_sums_streams() {
        let batch = PackedBatch::new(vec![SubBatch::new(2, 3), SubBatch::new(2, 1)]);
        assert_eq!(batch.byte_size(), (6 + 2) * 8);
        assert_eq!(batch.size(), 2);
        assert_eq!(batch.width(), 3);
    }
}
