//! Partitioning of grain indices by how each grain meets the signal.

use std::ops::Range;

/// Where a grain sits relative to a signal of length `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrainPhase {
    /// Grain ends at or before sample 0.
    Before,
    /// Grain starts before 0 and ends inside the signal.
    Entering,
    /// Grain lies wholly inside the signal.
    Full,
    /// Grain starts before 0 and ends after `N`.
    Island,
    /// Grain starts inside the signal and ends after `N`.
    Exiting,
    /// Grain starts at or after `N`.
    After,
}

/// Grain index ranges for each phase, in order, with empty ranges dropped.
///
/// Grain `g` starts at `start + g * interval_len`. At most five phases occur:
/// `Full` and `Island` never both appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrainRanges {
    start: i64,
    interval_len: usize,
    phases: Vec<(GrainPhase, Range<usize>)>,
}

#[inline]
fn floor_div(a: i64, b: i64) -> i64 {
    a.div_euclid(b)
}

#[inline]
fn ceil_div(a: i64, b: i64) -> i64 {
    -(-a).div_euclid(b)
}

impl GrainRanges {
    /// Partitions grains `0..num_of_grains`.
    ///
    /// `interval_len` and `grain_len` must be non-zero.
    pub fn new(
        start: i64,
        grain_len: usize,
        interval_len: usize,
        audio_len: usize,
        num_of_grains: usize,
    ) -> Self {
        debug_assert!(grain_len > 0 && interval_len > 0);
        let (l, h, n) = (grain_len as i64, interval_len as i64, audio_len as i64);
        let clamp = |g: i64| g.clamp(0, num_of_grains as i64) as usize;

        // First grain whose end passes 0.
        let enter = clamp(floor_div(-start - l, h) + 1);
        // First grain starting at or after 0.
        let non_negative = clamp(ceil_div(-start, h));
        // First grain whose end passes N.
        let over = clamp(floor_div(n - start - l, h) + 1);
        // First grain starting at or after N.
        let after = clamp(ceil_div(n - start, h));

        let mut phases = vec![(GrainPhase::Before, 0..enter)];
        if non_negative <= over {
            phases.push((GrainPhase::Entering, enter..non_negative));
            phases.push((GrainPhase::Full, non_negative..over));
            phases.push((GrainPhase::Exiting, over..after));
        } else {
            phases.push((GrainPhase::Entering, enter..over));
            phases.push((GrainPhase::Island, over..non_negative));
            phases.push((GrainPhase::Exiting, non_negative..after));
        }
        phases.push((GrainPhase::After, after..num_of_grains));
        phases.retain(|(_, r)| !r.is_empty());

        Self {
            start,
            interval_len,
            phases,
        }
    }

    /// Phases in grain order.
    pub fn phases(&self) -> &[(GrainPhase, Range<usize>)] {
        &self.phases
    }

    /// Phase containing grain `g`, or `None` past the last grain.
    pub fn phase_of(&self, g: usize) -> Option<GrainPhase> {
        self.phases
            .iter()
            .find(|(_, r)| r.contains(&g))
            .map(|(phase, _)| *phase)
    }

    /// Signal offset of the first sample of grain `g`.
    #[inline]
    pub fn grain_start(&self, g: usize) -> i64 {
        self.start + g as i64 * self.interval_len as i64
    }
}

/// Number of grains from `start` until a grain starts at or after
/// `audio_len`, so every signal sample is covered by all its grains.
pub fn grains_to_cover(start: i64, interval_len: usize, audio_len: usize) -> usize {
    let h = interval_len.max(1) as i64;
    ceil_div(audio_len as i64 - start, h).max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(start: i64, l: usize, h: usize, n: usize, g: usize) -> GrainPhase {
        let s = start + (g * h) as i64;
        let e = s + l as i64;
        let n = n as i64;
        if e <= 0 {
            GrainPhase::Before
        } else if s >= n {
            GrainPhase::After
        } else if s < 0 && e > n {
            GrainPhase::Island
        } else if s < 0 {
            GrainPhase::Entering
        } else if e > n {
            GrainPhase::Exiting
        } else {
            GrainPhase::Full
        }
    }

    #[test]
    fn test_matches_brute_force() {
        for &(l, h) in &[(4usize, 2usize), (6, 2), (9, 3), (12, 4), (5, 5)] {
            for n in [0usize, 1, 3, 7, 25, 40] {
                for start in -30i64..30 {
                    let k = 40;
                    let ranges = GrainRanges::new(start, l, h, n, k);
                    for g in 0..k {
                        assert_eq!(
                            ranges.phase_of(g),
                            Some(brute_force(start, l, h, n, g)),
                            "l={} h={} n={} start={} g={}",
                            l,
                            h,
                            n,
                            start,
                            g
                        );
                    }
                    assert_eq!(ranges.phase_of(k), None);
                }
            }
        }
    }

    #[test]
    fn test_ranges_are_contiguous_and_pruned() {
        let ranges = GrainRanges::new(-10, 8, 2, 100, 60);
        let mut next = 0;
        for (_, r) in ranges.phases() {
            assert_eq!(r.start, next);
            assert!(!r.is_empty());
            next = r.end;
        }
        assert_eq!(next, 60);
    }

    #[test]
    fn test_island_phase_for_short_signal() {
        let ranges = GrainRanges::new(-35, 40, 10, 6, 6);
        let kinds: Vec<GrainPhase> = ranges.phases().iter().map(|(p, _)| *p).collect();
        assert_eq!(
            kinds,
            vec![
                GrainPhase::Entering,
                GrainPhase::Island,
                GrainPhase::Exiting,
                GrainPhase::After
            ]
        );
        assert!(!kinds.contains(&GrainPhase::Full));
    }

    #[test]
    fn test_zero_grains() {
        let ranges = GrainRanges::new(0, 8, 2, 100, 0);
        assert!(ranges.phases().is_empty());
    }

    #[test]
    fn test_grains_to_cover() {
        assert_eq!(grains_to_cover(-6, 2, 10), 8);
        assert_eq!(grains_to_cover(0, 3, 10), 4);
        assert_eq!(grains_to_cover(20, 3, 10), 0);
    }
}
