//! Derivative-free bracketing search over one real parameter.
//!
//! Two seed points are scored, a third is extrapolated past the better one,
//! and the resulting three-point bracket is then refined one scored point at
//! a time. While the best point sits on an edge of the bracket the search
//! steps outward; once it is interior every step shrinks the bracket by a
//! fixed ratio until it is narrower than `min_diff`.

use crate::config::DelaySearchConfig;
use crate::core::progress::{BracketSnapshot, Logger, Progress, ScoredValue};
use crate::error::{check_positive, Result, StemSubError};

/// Fraction of the way from the far neighbour to the winner at which an
/// interior refinement point is placed.
const INSIDE: f64 = 0.8;

/// Whether higher or lower scores win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Objective {
    #[default]
    Maximize,
    Minimize,
}

impl Objective {
    /// True if score `a` beats score `b`. NaN never wins.
    #[inline]
    pub fn is_better(self, a: f64, b: f64) -> bool {
        if a.is_nan() {
            return false;
        }
        if b.is_nan() {
            return true;
        }
        match self {
            Objective::Maximize => a > b,
            Objective::Minimize => a < b,
        }
    }
}

/// Search settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoneInParams {
    pub first_val: f64,
    /// Offset from `first_val` to the second seed.
    pub val_add: f64,
    /// Stop once `high - low` is below this.
    pub min_diff: f64,
    /// Outward extrapolation factor.
    pub side_winner_mul: f64,
    pub objective: Objective,
    /// Refinement steps allowed before giving up on convergence.
    pub max_iterations: usize,
}

impl Default for HoneInParams {
    fn default() -> Self {
        Self {
            first_val: 0.0,
            val_add: 1.0,
            min_diff: 1e-3,
            side_winner_mul: 3.0,
            objective: Objective::Maximize,
            max_iterations: 200,
        }
    }
}

impl HoneInParams {
    pub fn validate(&self) -> Result<()> {
        if !self.first_val.is_finite() {
            return Err(StemSubError::invalid("first_val", "must be finite"));
        }
        if !self.val_add.is_finite() || self.val_add == 0.0 {
            return Err(StemSubError::invalid(
                "val_add",
                format!("must be finite and non-zero, got {}", self.val_add),
            ));
        }
        check_positive("min_diff", self.min_diff)?;
        check_positive("side_winner_mul", self.side_winner_mul)?;
        if self.max_iterations == 0 {
            return Err(StemSubError::invalid("max_iterations", "must be greater than 0"));
        }
        Ok(())
    }
}

impl From<&DelaySearchConfig> for HoneInParams {
    fn from(config: &DelaySearchConfig) -> Self {
        Self {
            first_val: config.first_guess,
            val_add: config.first_guess_add,
            min_diff: config.min_guess_diff,
            side_winner_mul: config.side_winner_mul,
            objective: Objective::Maximize,
            max_iterations: config.max_iterations,
        }
    }
}

/// Three scored points ordered by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub low: ScoredValue,
    pub winning: ScoredValue,
    pub high: ScoredValue,
}

impl Bracket {
    #[inline]
    pub fn span(&self) -> f64 {
        self.high.value - self.low.value
    }
}

/// Step-by-step bracketing search.
///
/// Construction scores the three seed points; each [`step`](Self::step)
/// scores exactly one more.
pub struct HoneIn<F> {
    score_fn: F,
    params: HoneInParams,
    /// Sorted by value.
    points: [ScoredValue; 3],
    /// Index of the best point in `points`.
    winner: usize,
    iteration: usize,
    num_of_scores: usize,
}

impl<F> std::fmt::Debug for HoneIn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HoneIn")
            .field("params", &self.params)
            .field("points", &self.points)
            .field("iteration", &self.iteration)
            .finish()
    }
}

impl<F> HoneIn<F>
where
    F: FnMut(f64) -> f64,
{
    pub fn new(mut score_fn: F, params: HoneInParams) -> Result<Self> {
        params.validate()?;
        let mut score = |value: f64| ScoredValue::new(value, score_fn(value));

        let a = score(params.first_val);
        let b = score(params.first_val + params.val_add);
        let (better, worse) = if params.objective.is_better(b.score, a.score) {
            (b, a)
        } else {
            (a, b)
        };
        let c = score(better.value + (better.value - worse.value) * params.side_winner_mul);

        let mut points = [a, b, c];
        points.sort_by(|x, y| x.value.total_cmp(&y.value));
        let winner = best_index(&points, params.objective, None);
        Ok(Self {
            score_fn,
            params,
            points,
            winner,
            iteration: 0,
            num_of_scores: 3,
        })
    }

    #[inline]
    fn winner_index(&self) -> usize {
        self.winner
    }

    /// Current bracket.
    pub fn bracket(&self) -> Bracket {
        Bracket {
            low: self.points[0],
            winning: self.points[self.winner_index()],
            high: self.points[2],
        }
    }

    /// Best point found so far.
    #[inline]
    pub fn winning(&self) -> ScoredValue {
        self.points[self.winner_index()]
    }

    #[inline]
    pub fn is_converged(&self) -> bool {
        self.bracket().span() < self.params.min_diff
    }

    /// Refinement steps taken.
    #[inline]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Calls to the scoring function so far.
    #[inline]
    pub fn num_of_scores(&self) -> usize {
        self.num_of_scores
    }

    /// Scores one new point and narrows the bracket around the best.
    ///
    /// Returns `None` once converged or out of iterations.
    pub fn step(&mut self) -> Option<BracketSnapshot> {
        if self.is_converged() || self.iteration >= self.params.max_iterations {
            return None;
        }
        let [low, mid, high] = self.points;
        let new_value = match self.winner_index() {
            0 => low.value + (low.value - mid.value) * self.params.side_winner_mul,
            2 => high.value + (high.value - mid.value) * self.params.side_winner_mul,
            _ => {
                let far = if mid.value - low.value >= high.value - mid.value {
                    low
                } else {
                    high
                };
                far.value + INSIDE * (mid.value - far.value)
            }
        };
        let new = ScoredValue::new(new_value, (self.score_fn)(new_value));
        self.num_of_scores += 1;
        self.iteration += 1;

        let mut candidates = [low, mid, high, new];
        candidates.sort_by(|x, y| x.value.total_cmp(&y.value));
        let incumbent = self.points[self.winner].value;
        let best = best_index(&candidates, self.params.objective, Some(incumbent));
        let first = best.saturating_sub(1).min(1);
        self.points = [candidates[first], candidates[first + 1], candidates[first + 2]];
        self.winner = best - first;

        let bracket = self.bracket();
        Some(BracketSnapshot {
            low: bracket.low,
            winning: bracket.winning,
            high: bracket.high,
            new: Some(new),
        })
    }

    /// Steps until converged, reporting each step to `logger`.
    pub fn run(mut self, logger: &mut Logger) -> ScoredValue {
        let max_iterations = self.params.max_iterations;
        while let Some(snapshot) = self.step() {
            let iteration = self.iteration;
            logger.log_with(|| {
                Progress::new("honing in")
                    .with_iteration(iteration, Some(max_iterations))
                    .with_scored(snapshot.winning)
                    .with_bracket(snapshot)
            });
        }
        let winning = self.winning();
        if !self.is_converged() {
            log::warn!(
                "search stopped after {} steps with bracket span {} (wanted < {})",
                self.iteration,
                self.bracket().span(),
                self.params.min_diff
            );
        } else {
            log::debug!(
                "converged on {} (score {}) after {} scores",
                winning.value,
                winning.score,
                self.num_of_scores
            );
        }
        winning
    }
}

/// Index of the best-scoring point in value-sorted `points`.
///
/// Among equally good points the incumbent keeps winning, otherwise the one
/// nearest the middle does, so a flat score shrinks the bracket instead of
/// extrapolating outward.
fn best_index(points: &[ScoredValue], objective: Objective, incumbent: Option<f64>) -> usize {
    let mut best = 0;
    for (i, p) in points.iter().enumerate().skip(1) {
        if objective.is_better(p.score, points[best].score) {
            best = i;
        }
    }
    let top = points[best].score;
    let tied = |p: &ScoredValue| {
        !objective.is_better(top, p.score) && !objective.is_better(p.score, top)
    };
    if let Some(i) = incumbent.and_then(|v| points.iter().position(|p| p.value == v && tied(p))) {
        return i;
    }
    let middle = points.len() - 1;
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| tied(p))
        .min_by_key(|(i, _)| (2 * i).abs_diff(middle))
        .map_or(best, |(i, _)| i)
}

/// Finds the value of `score_fn` that wins under `params.objective`.
pub fn hone_in<F>(score_fn: F, params: &HoneInParams, logger: &mut Logger) -> Result<ScoredValue>
where
    F: FnMut(f64) -> f64,
{
    Ok(HoneIn::new(score_fn, *params)?.run(logger))
}
