use crate::budget::Budget;
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::grid::Grid;
use crate::rotation;
use crate::search::{self, RotationResult};
use crate::size;
use crate::types::{Placement, SearchOutcome, UnusableReason};
use rayon::prelude::*;

pub struct Solver {
    config: SearchConfig,
    budget: Budget,
}

impl Solver {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            budget: Budget::unlimited(),
        }
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    /// Size gate, tightest-fit rotation, then an independent window search per
    /// rotation offset. The highest score wins; ties go to the earlier offset.
    pub fn solve(
        &self,
        score: &Grid,
        divider: &Grid,
        min_acres: f64,
        max_acres: f64,
    ) -> Result<SearchOutcome, SearchError> {
        if score.dim() != divider.dim() {
            return Err(SearchError::ShapeMismatch {
                score: score.dim(),
                divider: divider.dim(),
            });
        }

        let check = size::check(min_acres, max_acres, self.config.max_parcel_acres, score);
        if let Some(reason) = check.verdict {
            tracing::debug!(%reason, "parcel not searched");
            return Ok(SearchOutcome::Unusable(reason));
        }

        let primary = rotation::primary_rotation(score, self.config.rotation_step);
        let rotations: Vec<u32> = self
            .config
            .rotation_offsets
            .iter()
            .map(|offset| primary + offset)
            .collect();
        tracing::debug!(primary, ?rotations, bounds = ?check.bounds, "searching rotations");

        let results = rotations
            .par_iter()
            .map(|&r| {
                search::search_rotation(
                    score,
                    divider,
                    r,
                    r == primary,
                    check.bounds,
                    &self.config,
                    &self.budget,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::select(results))
    }

    fn select(results: Vec<RotationResult>) -> SearchOutcome {
        let best = results.into_iter().fold(None, |best: Option<RotationResult>, r| {
            match best {
                Some(b) if b.score() >= r.score() => Some(b),
                _ => Some(r),
            }
        });

        match best {
            Some(RotationResult {
                rotation,
                frame,
                best: Some(candidate),
                ..
            }) if candidate.score > 0.0 => SearchOutcome::Found(Placement {
                score: candidate.score,
                window: candidate.window,
                rotation,
                frame,
                mask: candidate.mask,
            }),
            _ => SearchOutcome::Unusable(UnusableReason::NoCandidate),
        }
    }
}
