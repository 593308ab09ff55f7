//! Horizon boundary resolution.
//!
//! [`HorizonResolver`] answers successor/predecessor questions for a timepoint within the
//! horizon that owns it under a given balancing type. It caches the position of every
//! timepoint in its horizon, so every query is O(1) after an O(n) construction pass.
//!
//! Boundary behaviour at the edges of a horizon:
//!
//! | boundary | past the last timepoint | before the first timepoint |
//! |----------|-------------------------|----------------------------|
//! | linear   | [`StepError::NoSuccessor`] | [`StepError::NoPredecessor`] |
//! | circular | first timepoint          | last timepoint              |
//! | linked   | [`StepError::RequiresLinkedHorizon`] | [`StepError::RequiresLinkedHorizon`] |
//!
//! `NoSuccessor`/`NoPredecessor` are control signals, not failures: the router turns them
//! into the `OutsideHorizon` sentinel.

use std::collections::HashMap;
use thiserror::Error;

use crate::time_grid::{BoundaryType, HorizonKey, TimeGrid, TimepointId};

/// Outcome of stepping across a horizon edge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("{0} is the last timepoint of a linear horizon")]
    NoSuccessor(TimepointId),

    #[error("{0} is the first timepoint of a linear horizon")]
    NoPredecessor(TimepointId),

    #[error("{timepoint} sits at the edge of linked horizon {horizon}")]
    RequiresLinkedHorizon {
        timepoint: TimepointId,
        horizon: HorizonKey,
    },

    #[error("{timepoint} has no horizon for balancing type '{balancing_type}'")]
    Unassigned {
        timepoint: TimepointId,
        balancing_type: String,
    },
}

#[derive(Debug, Clone)]
struct ResolvedHorizon {
    key: HorizonKey,
    boundary: BoundaryType,
    sequence: Vec<TimepointId>,
}

#[derive(Debug, Clone, Copy)]
struct Membership {
    horizon: usize,
    position: usize,
}

/// O(1) successor/predecessor lookups derived from a [`TimeGrid`].
#[derive(Debug, Clone, Default)]
pub struct HorizonResolver {
    horizons: Vec<ResolvedHorizon>,
    by_key: HashMap<HorizonKey, usize>,
    // balancing type -> timepoint -> membership
    membership: HashMap<String, HashMap<TimepointId, Membership>>,
}

impl HorizonResolver {
    pub fn new(grid: &TimeGrid) -> Self {
        let mut resolver = HorizonResolver::default();
        for horizon in grid.horizons() {
            let index = resolver.horizons.len();
            let members = resolver
                .membership
                .entry(horizon.key.balancing_type.clone())
                .or_default();
            for (position, tp) in horizon.timepoints().iter().enumerate() {
                members.insert(
                    *tp,
                    Membership {
                        horizon: index,
                        position,
                    },
                );
            }
            resolver.by_key.insert(horizon.key.clone(), index);
            resolver.horizons.push(ResolvedHorizon {
                key: horizon.key.clone(),
                boundary: horizon.boundary,
                sequence: horizon.timepoints().to_vec(),
            });
        }
        resolver
    }

    fn member(
        &self,
        timepoint: TimepointId,
        balancing_type: &str,
    ) -> Result<(&ResolvedHorizon, usize), StepError> {
        self.membership
            .get(balancing_type)
            .and_then(|members| members.get(&timepoint))
            .map(|m| (&self.horizons[m.horizon], m.position))
            .ok_or_else(|| StepError::Unassigned {
                timepoint,
                balancing_type: balancing_type.to_string(),
            })
    }

    /// First timepoint of a horizon.
    pub fn first(&self, key: &HorizonKey) -> Option<TimepointId> {
        self.by_key
            .get(key)
            .and_then(|idx| self.horizons[*idx].sequence.first().copied())
    }

    /// Last timepoint of a horizon.
    pub fn last(&self, key: &HorizonKey) -> Option<TimepointId> {
        self.by_key
            .get(key)
            .and_then(|idx| self.horizons[*idx].sequence.last().copied())
    }

    pub fn boundary(&self, key: &HorizonKey) -> Option<BoundaryType> {
        self.by_key.get(key).map(|idx| self.horizons[*idx].boundary)
    }

    /// Horizon owning `timepoint` under `balancing_type`.
    pub fn horizon_of(&self, timepoint: TimepointId, balancing_type: &str) -> Option<&HorizonKey> {
        self.member(timepoint, balancing_type)
            .ok()
            .map(|(horizon, _)| &horizon.key)
    }

    /// Every horizon (across all balancing types) that contains `timepoint`.
    pub fn horizons_covering(&self, timepoint: TimepointId) -> impl Iterator<Item = &HorizonKey> + '_ {
        self.membership
            .values()
            .filter_map(move |members| members.get(&timepoint))
            .map(|m| &self.horizons[m.horizon].key)
    }

    /// Number of timepoints in the horizon owning `timepoint`.
    pub fn horizon_len(&self, timepoint: TimepointId, balancing_type: &str) -> usize {
        self.member(timepoint, balancing_type)
            .map(|(horizon, _)| horizon.sequence.len())
            .unwrap_or(0)
    }

    pub fn is_first(&self, timepoint: TimepointId, balancing_type: &str) -> bool {
        matches!(self.member(timepoint, balancing_type), Ok((_, 0)))
    }

    pub fn is_last(&self, timepoint: TimepointId, balancing_type: &str) -> bool {
        match self.member(timepoint, balancing_type) {
            Ok((horizon, position)) => position + 1 == horizon.sequence.len(),
            Err(_) => false,
        }
    }

    /// Timepoint following `timepoint` in its horizon, honouring the boundary type.
    pub fn next(&self, timepoint: TimepointId, balancing_type: &str) -> Result<TimepointId, StepError> {
        let (horizon, position) = self.member(timepoint, balancing_type)?;
        if let Some(next) = horizon.sequence.get(position + 1) {
            return Ok(*next);
        }
        match horizon.boundary {
            BoundaryType::Linear => Err(StepError::NoSuccessor(timepoint)),
            BoundaryType::Circular => Ok(horizon.sequence[0]),
            BoundaryType::Linked => Err(StepError::RequiresLinkedHorizon {
                timepoint,
                horizon: horizon.key.clone(),
            }),
        }
    }

    /// Timepoint preceding `timepoint` in its horizon, honouring the boundary type.
    pub fn prev(&self, timepoint: TimepointId, balancing_type: &str) -> Result<TimepointId, StepError> {
        let (horizon, position) = self.member(timepoint, balancing_type)?;
        if position > 0 {
            return Ok(horizon.sequence[position - 1]);
        }
        match horizon.boundary {
            BoundaryType::Linear => Err(StepError::NoPredecessor(timepoint)),
            BoundaryType::Circular => Ok(horizon.sequence[horizon.sequence.len() - 1]),
            BoundaryType::Linked => Err(StepError::RequiresLinkedHorizon {
                timepoint,
                horizon: horizon.key.clone(),
            }),
        }
    }
}
