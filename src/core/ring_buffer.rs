//! Fixed-capacity ring of equal-shape buffers for per-frame history.

use crate::core::types::Bin;
use crate::error::{Result, StemSubError};

/// Fixed set of equal-shape buffers addressed as "newest" and "oldest".
///
/// The buffers are allocated once at construction and mutated in place; only
/// [`increment_and_get_newest`](Self::increment_and_get_newest) moves the
/// rotation index. With capacity 1 the index arithmetic collapses to a single
/// slot, so `newest` and `oldest` alias permanently and rotation is a no-op.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: Vec<T>,
    curr: usize,
}

impl<T> RingBuffer<T> {
    /// Creates a ring buffer from a constructor callback.
    ///
    /// Exactly one of `num_of_items` and `lookbehind` must be given;
    /// `lookbehind` yields `lookbehind + 1` items.
    pub fn from_constructor<F>(
        mut constructor: F,
        num_of_items: Option<usize>,
        lookbehind: Option<usize>,
    ) -> Result<Self>
    where
        F: FnMut() -> T,
    {
        let num_of_items = match (num_of_items, lookbehind) {
            (Some(n), None) => n,
            (None, Some(lb)) => lb + 1,
            (None, None) => {
                return Err(StemSubError::ConflictingParameters(
                    "one of 'num_of_items' or 'lookbehind' should be provided".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(StemSubError::ConflictingParameters(
                    "only one of 'num_of_items' or 'lookbehind' should be provided".to_string(),
                ))
            }
        };
        if num_of_items == 0 {
            return Err(StemSubError::invalid(
                "num_of_items",
                "a ring buffer needs at least one item",
            ));
        }
        Ok(Self {
            items: (0..num_of_items).map(|_| constructor()).collect(),
            curr: 0,
        })
    }

    /// Creates a ring buffer holding `lookbehind + 1` items.
    pub fn with_lookbehind<F>(constructor: F, lookbehind: usize) -> Self
    where
        F: FnMut() -> T,
    {
        let mut constructor = constructor;
        Self {
            items: (0..=lookbehind).map(|_| constructor()).collect(),
            curr: 0,
        }
    }

    /// Wraps a single buffer as a capacity-1 ring.
    pub fn single(item: T) -> Self {
        Self {
            items: vec![item],
            curr: 0,
        }
    }

    /// Number of buffers held.
    #[inline]
    pub fn num_of_items(&self) -> usize {
        self.items.len()
    }

    /// How many rotations back `oldest` is from `newest`.
    #[inline]
    pub fn lookbehind(&self) -> usize {
        self.items.len() - 1
    }

    #[inline]
    fn oldest_index(&self) -> usize {
        (self.curr + 1) % self.items.len()
    }

    /// The most recently written buffer.
    #[inline]
    pub fn newest(&self) -> &T {
        &self.items[self.curr]
    }

    /// Mutable view of the most recently written buffer.
    #[inline]
    pub fn newest_mut(&mut self) -> &mut T {
        &mut self.items[self.curr]
    }

    /// The buffer written `lookbehind` rotations ago.
    #[inline]
    pub fn oldest(&self) -> &T {
        &self.items[self.oldest_index()]
    }

    /// Both ends at once.
    #[inline]
    pub fn newest_and_oldest(&self) -> (&T, &T) {
        (&self.items[self.curr], &self.items[self.oldest_index()])
    }

    /// Advances the rotation index and returns the new newest slot, which
    /// still holds the oldest data until overwritten.
    #[inline]
    pub fn increment_and_get_newest(&mut self) -> &mut T {
        self.curr = self.oldest_index();
        &mut self.items[self.curr]
    }

    /// Advances the rotation index and returns the previous newest slot
    /// alongside the new one.
    ///
    /// Needs at least two items; with one item the slots would alias.
    pub fn increment_and_get_previous_and_newest(&mut self) -> (&T, &mut T) {
        assert!(
            self.items.len() >= 2,
            "previous and newest alias in a capacity-1 ring buffer"
        );
        let prev = self.curr;
        self.curr = self.oldest_index();
        let curr = self.curr;
        if prev < curr {
            let (lo, hi) = self.items.split_at_mut(curr);
            (&lo[prev], &mut hi[0])
        } else {
            let (lo, hi) = self.items.split_at_mut(prev);
            (&hi[0], &mut lo[curr])
        }
    }
}

/// A source of per-frame spectra readable at both ends of its history.
///
/// A plain spectrum is the capacity-1 case, where both ends are the same
/// buffer.
pub trait SpectrumSource {
    /// Most recent spectrum.
    fn newest_spectrum(&self) -> &[Bin];
    /// Spectrum `lookbehind` frames old.
    fn oldest_spectrum(&self) -> &[Bin];
    /// Frames of history between the two ends.
    fn spectrum_lookbehind(&self) -> usize;
}

impl SpectrumSource for RingBuffer<Vec<Bin>> {
    #[inline]
    fn newest_spectrum(&self) -> &[Bin] {
        self.newest()
    }

    #[inline]
    fn oldest_spectrum(&self) -> &[Bin] {
        self.oldest()
    }

    #[inline]
    fn spectrum_lookbehind(&self) -> usize {
        self.lookbehind()
    }
}

/// Builds a ring of zeroed spectra of `len` bins.
pub fn spectra_ring(len: usize, lookbehind: usize) -> RingBuffer<Vec<Bin>> {
    RingBuffer::with_lookbehind(|| vec![crate::core::types::BIN_ZERO; len], lookbehind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_exactly_one_size_argument() {
        assert!(matches!(
            RingBuffer::from_constructor(|| 0u8, None, None),
            Err(StemSubError::ConflictingParameters(_))
        ));
        assert!(matches!(
            RingBuffer::from_constructor(|| 0u8, Some(3), Some(2)),
            Err(StemSubError::ConflictingParameters(_))
        ));
        assert!(RingBuffer::from_constructor(|| 0u8, Some(0), None).is_err());

        let rb = RingBuffer::from_constructor(|| 0u8, None, Some(4)).unwrap();
        assert_eq!(rb.num_of_items(), 5);
        assert_eq!(rb.lookbehind(), 4);
    }

    #[test]
    fn test_oldest_returns_value_after_lookbehind_rotations() {
        for lookbehind in 1..6 {
            let mut rb = RingBuffer::from_constructor(|| 0i32, None, Some(lookbehind)).unwrap();
            *rb.newest_mut() = 42;
            for k in 0..lookbehind {
                *rb.increment_and_get_newest() = 100 + k as i32;
            }
            assert_eq!(*rb.oldest(), 42, "lookbehind {}", lookbehind);
            assert_eq!(*rb.newest(), 100 + lookbehind as i32 - 1);
        }
    }

    #[test]
    fn test_newest_and_oldest_matches_separate_accessors() {
        let mut counter = 0;
        let mut rb = RingBuffer::from_constructor(
            || {
                counter += 1;
                counter
            },
            Some(3),
            None,
        )
        .unwrap();
        for _ in 0..7 {
            let (n, o) = rb.newest_and_oldest();
            assert_eq!(n, rb.newest());
            assert_eq!(o, rb.oldest());
            rb.increment_and_get_newest();
        }
    }

    #[test]
    fn test_capacity_one_aliases() {
        let mut rb = RingBuffer::single(vec![1.0, 2.0]);
        assert_eq!(rb.lookbehind(), 0);
        rb.newest_mut()[0] = 7.0;
        assert_eq!(rb.oldest()[0], 7.0);
        rb.increment_and_get_newest()[1] = 9.0;
        let (n, o) = rb.newest_and_oldest();
        assert_eq!(n, &vec![7.0, 9.0]);
        assert_eq!(o, &vec![7.0, 9.0]);
    }

    #[test]
    fn test_previous_and_newest() {
        let mut rb = RingBuffer::with_lookbehind(|| 0u32, 2);
        *rb.newest_mut() = 1;
        for expected_prev in 1..10u32 {
            let (prev, newest) = rb.increment_and_get_previous_and_newest();
            assert_eq!(*prev, expected_prev);
            *newest = expected_prev + 1;
        }
    }

    #[test]
    fn test_spectrum_source() {
        let mut ring = spectra_ring(4, 1);
        ring.newest_mut()[0] = Bin::new(1.0, 0.0);
        ring.increment_and_get_newest()[0] = Bin::new(2.0, 0.0);
        assert_eq!(ring.newest_spectrum()[0].re, 2.0);
        assert_eq!(ring.oldest_spectrum()[0].re, 1.0);
        assert_eq!(ring.spectrum_lookbehind(), 1);
    }
}
