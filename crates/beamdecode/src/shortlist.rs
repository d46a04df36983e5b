//! # Vocabulary Restriction
//!
//! A shortlist constrains every ensemble member's output distribution to a
//! finite set of token ids for one decode call. Scorers compute log-probs over
//! the shortlist columns only; the search maps a column back to its word with
//! [`Shortlist::reverse_map`].
//!
//! Restriction is call-scoped. [`restrict`] either attaches a generator to every
//! scorer or clears whatever an earlier call attached, so a restriction never
//! leaks from one decode call into the next.

use std::collections::HashSet;
use std::sync::Arc;
use candle_core::{Device, Tensor};
use crate::Word;
use crate::batch::PackedBatch;
use crate::error::Result;
use crate::scorer::Scorer;

/// A sorted set of permitted output token ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortlist {
    indices: Vec<Word>,
}

impl Shortlist {
    /// Builds a shortlist from any collection of ids. Duplicates are dropped and
    /// the ids are sorted ascending, so column order matches vocabulary order.
    pub fn new(words: impl IntoIterator<Item = Word>) -> Self {
        let mut indices: Vec<Word> = words.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();
        Self { indices }
    }

    pub fn indices(&self) -> &[Word] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, word: Word) -> bool {
        self.indices.binary_search(&word).is_ok()
    }

    /// Word id of shortlist column `column`.
    pub fn reverse_map(&self, column: usize) -> Option<Word> {
        self.indices.get(column).copied()
    }

    /// Shortlist column of `word`, if it is permitted.
    pub fn column_of(&self, word: Word) -> Option<usize> {
        self.indices.binary_search(&word).ok()
    }

    /// Largest permitted id.
    pub fn max_word(&self) -> Option<Word> {
        self.indices.last().copied()
    }

    /// The ids as a 1-d u32 tensor, suitable for `index_select`.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(&self.indices, self.indices.len(), device)?)
    }
}

/// Produces the shortlist for a packed batch.
pub trait ShortlistGenerator: Send + Sync {
    fn generate(&self, batch: &PackedBatch) -> Arc<Shortlist>;
}

/// Generator that returns the same caller-supplied set for every batch.
#[derive(Debug, Clone)]
pub struct FixedShortlistGenerator {
    shortlist: Arc<Shortlist>,
}

impl FixedShortlistGenerator {
    pub fn new(words: &HashSet<Word>) -> Self {
        Self {
            shortlist: Arc::new(Shortlist::new(words.iter().copied())),
        }
    }
}

impl ShortlistGenerator for FixedShortlistGenerator {
    fn generate(&self, _batch: &PackedBatch) -> Arc<Shortlist> {
        self.shortlist.clone()
    }
}

/// Applies the call's restriction to every scorer.
///
/// A non-empty `permitted` set attaches one shared [`FixedShortlistGenerator`]
/// to every scorer. An empty set is the same as no restriction and clears any
/// generator left from a previous call.
///
/// # Returns
///
/// `true` when a restriction was attached.
pub fn restrict(scorers: &mut [Box<dyn Scorer>], permitted: &HashSet<Word>) -> bool {
    if permitted.is_empty() {
        for scorer in scorers.iter_mut() {
            scorer.set_shortlist_generator(None);
        }
        return false;
    }

    let generator: Arc<dyn ShortlistGenerator> = Arc::new(FixedShortlistGenerator::new(permitted));
    for scorer in scorers.iter_mut() {
        scorer.set_shortlist_generator(Some(generator.clone()));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{pack, TruncationPolicy};
    use crate::scorer::mock_scorer::MockScorer;

    #[test]
    fn test_shortlist_sorted_and_unique() {
        let shortlist = Shortlist::new([7, 2, 5, 7, 2]);
        assert_eq!(shortlist.indices(), &[2, 5, 7]);
        assert_eq!(shortlist.len(), 3);
        assert_eq!(shortlist.reverse_map(1), Some(5));
        assert_eq!(shortlist.reverse_map(3), None);
        assert_eq!(shortlist.column_of(7), Some(2));
        assert_eq!(shortlist.column_of(6), None);
        assert!(shortlist.contains(2));
        assert_eq!(shortlist.max_word(), Some(7));
    }

    #[test]
    fn test_to_tensor() {
        let shortlist = Shortlist::new([3, 1]);
        let tensor = shortlist.to_tensor(&Device::Cpu).unwrap();
        assert_eq!(tensor.to_vec1::<u32>().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_fixed_generator_ignores_batch() {
        let permitted: HashSet<Word> = [5, 7, 2].into_iter().collect();
        let generator = FixedShortlistGenerator::new(&permitted);
        let a = pack(&[vec![1, 2]], 2, TruncationPolicy::Silent).unwrap();
        let b = pack(&[vec![9], vec![8]], 1, TruncationPolicy::Silent).unwrap();
        assert_eq!(generator.generate(&a).indices(), &[2, 5, 7]);
        assert_eq!(generator.generate(&a), generator.generate(&b));
    }

    #[test]
    fn test_restrict_attaches_to_every_scorer() {
        let mut scorers: Vec<Box<dyn Scorer>> = vec![
            Box::new(MockScorer::uniform("F0", 10)),
            Box::new(MockScorer::uniform("F1", 10)),
        ];
        let permitted: HashSet<Word> = [5, 7, 2].into_iter().collect();
        assert!(restrict(&mut scorers, &permitted));

        let batch = pack(&[vec![1]], 1, TruncationPolicy::Silent).unwrap();
        for scorer in scorers.iter_mut() {
            scorer.start_state(&batch).unwrap();
            assert_eq!(scorer.shortlist().unwrap().indices(), &[2, 5, 7]);
        }
    }

    #[test]
    fn test_empty_restriction_clears_previous() {
        let mut scorers: Vec<Box<dyn Scorer>> = vec![Box::new(MockScorer::uniform("F0", 10))];
        let batch = pack(&[vec![1]], 1, TruncationPolicy::Silent).unwrap();

        let permitted: HashSet<Word> = [1, 2].into_iter().collect();
        restrict(&mut scorers, &permitted);
        scorers[0].start_state(&batch).unwrap();
        assert!(scorers[0].shortlist().is_some());

        assert!(!restrict(&mut scorers, &HashSet::new()));
        scorers[0].start_state(&batch).unwrap();
        assert!(scorers[0].shortlist().is_none());
    }
}
