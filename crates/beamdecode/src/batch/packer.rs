use tracing::debug;
use crate::Word;
use crate::error::{DecodeError, Result};
use super::{PackedBatch, SubBatch};

/// What packing does with a sentence longer than the length bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TruncationPolicy {
    /// Keep the first `max_length` tokens and drop the rest
    #[default]
    Silent,
    /// Refuse the batch with [`DecodeError::Truncated`]
    Strict,
}

/// Packs variable-length sentences into one `max_length x batch_size` grid.
///
/// For every time step `i < max_length` and sentence `j`, the token is written
/// at offset `i * batch_size + j` and its mask set to 1 when `i` is inside the
/// sentence; otherwise the cell keeps the default token and mask 0. Every
/// sentence id is 0.
///
/// # Parameters
///
/// * `sentences` - Token id sequences in caller order
/// * `max_length` - Number of time steps of the resulting grid
/// * `policy` - Handling of sentences longer than `max_length`
///
/// # Returns
///
/// A batch holding a single [`SubBatch`]. An empty `sentences` slice yields an
/// empty but well-formed batch.
pub fn pack(sentences: &[Vec<Word>], max_length: usize, policy: TruncationPolicy) -> Result<PackedBatch> {
    let batch_size = sentences.len();

    for (j, sentence) in sentences.iter().enumerate() {
        if sentence.len() > max_length {
            match policy {
                TruncationPolicy::Strict => {
                    return Err(DecodeError::Truncated {
                        sentence: j,
                        length: sentence.len(),
                        max_length,
                    });
                }
                TruncationPolicy::Silent => {
                    debug!(sentence = j, length = sentence.len(), max_length, "truncating sentence");
                }
            }
        }
    }

    let mut sub_batch = SubBatch::new(batch_size, max_length);
    for i in 0..max_length {
        for (j, sentence) in sentences.iter().enumerate() {
            if let Some(&word) = sentence.get(i) {
                sub_batch.put(i, j, word);
            }
        }
    }

    let mut batch = PackedBatch::new(vec![sub_batch]);
    batch.set_sentence_ids(vec![0; batch_size]);
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_grid(batch: &PackedBatch) -> Vec<Vec<u8>> {
        let sub = batch.front();
        (0..sub.batch_width())
            .map(|t| {
                (0..sub.batch_size())
                    .map(|b| sub.mask()[t * sub.batch_size() + b] as u8)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_two_sentences_time_major() {
        let batch = pack(&[vec![5, 7], vec![9]], 2, TruncationPolicy::Silent).unwrap();
        assert_eq!(mask_grid(&batch), vec![vec![1, 1], vec![1, 0]]);
        assert_eq!(batch.front().data(), &[5, 9, 7, 0]);
        assert_eq!(batch.size(), 2);
        assert_eq!(batch.width(), 2);
    }

    #[test]
    fn test_mask_matches_lengths() {
        let sentences = vec![vec![1, 2, 3, 4], vec![], vec![8], vec![3, 3, 3]];
        let max_length = 5;
        let batch = pack(&sentences, max_length, TruncationPolicy::Silent).unwrap();
        let sub = batch.front();
        assert_eq!(sub.batch_width(), max_length);
        assert_eq!(sub.batch_size(), sentences.len());
        for i in 0..max_length {
            for (j, sentence) in sentences.iter().enumerate() {
                let expected = if i < sentence.len() { 1.0 } else { 0.0 };
                assert_eq!(sub.mask()[i * sentences.len() + j], expected, "cell ({i}, {j})");
            }
        }
        assert_eq!(sub.batch_words(), 8);
    }

    #[test]
    fn test_sentence_ids_all_zero() {
        let batch = pack(&[vec![1], vec![2], vec![3]], 1, TruncationPolicy::Silent).unwrap();
        assert_eq!(batch.sentence_ids(), &[0, 0, 0]);
    }

    #[test]
    fn test_packing_is_deterministic() {
        let sentences = vec![vec![4, 8, 15], vec![16, 23], vec![42]];
        let first = pack(&sentences, 4, TruncationPolicy::Silent).unwrap();
        let second = pack(&sentences, 4, TruncationPolicy::Silent).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_silent_truncation_keeps_prefix() {
        let batch = pack(&[vec![10, 11, 12, 13, 14]], 3, TruncationPolicy::Silent).unwrap();
        let sub = batch.front();
        assert_eq!(sub.data(), &[10, 11, 12]);
        assert_eq!(sub.mask(), &[1.0, 1.0, 1.0]);
        assert_eq!(sub.sentence_length(0), 3);
    }

    #[test]
    fn test_strict_truncation_fails() {
        let err = pack(&[vec![1], vec![1, 2, 3]], 2, TruncationPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated { sentence: 1, length: 3, max_length: 2 }
        ));
        // sentences within the bound are fine in strict mode
        assert!(pack(&[vec![1, 2]], 2, TruncationPolicy::Strict).is_ok());
    }

    #[test]
    fn test_empty_batch() {
        let batch = pack(&[], 4, TruncationPolicy::Silent).unwrap();
        assert_eq!(batch.size(), 0);
        assert_eq!(batch.width(), 4);
        assert!(batch.front().data().is_empty());
        assert!(batch.sentence_ids().is_empty());
    }

    #[test]
    fn test_padding_beyond_longest() {
        let batch = pack(&[vec![6]], 3, TruncationPolicy::Silent).unwrap();
        assert_eq!(mask_grid(&batch), vec![vec![1], vec![0], vec![0]]);
    }
}
