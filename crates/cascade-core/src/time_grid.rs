//! Discrete planning time grid.
//!
//! A [`TimeGrid`] holds the ordered timepoints of one subproblem together with every
//! horizon partition over them. Each balancing type (e.g. `"day"`, `"year"`) partitions
//! the full set of timepoints into horizons, so a timepoint belongs to exactly one horizon
//! per balancing type.
//!
//! ```text
//! timepoints : 1   2   3   4   5   6
//! day        : [ h1    ] [ h2    ] [ h3 ]      circular
//! week       : [ w1                     ]      linear
//! ```
//!
//! Grids are assembled with [`TimeGridBuilder`], which validates the partition
//! invariants once; a built grid is immutable.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::{CascadeError, CascadeResult};
use crate::units::Hours;

/// Opaque, totally ordered timepoint identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimepointId(u32);

impl TimepointId {
    #[inline]
    pub fn new(value: u32) -> Self {
        TimepointId(value)
    }
    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TimepointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tmp {}", self.0)
    }
}

/// (balancing type, horizon id) pair identifying a horizon.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HorizonKey {
    pub balancing_type: String,
    pub horizon: u32,
}

impl HorizonKey {
    pub fn new(balancing_type: impl Into<String>, horizon: u32) -> Self {
        Self {
            balancing_type: balancing_type.into(),
            horizon,
        }
    }
}

impl fmt::Display for HorizonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.balancing_type, self.horizon)
    }
}

/// What lies beyond the edges of a horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryType {
    /// No wraparound; stepping past the last timepoint leaves the horizon.
    Linear,
    /// The last timepoint is followed by the first one of the same horizon.
    #[default]
    Circular,
    /// The horizon continues into a previously solved subproblem.
    Linked,
}

impl FromStr for BoundaryType {
    type Err = CascadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(BoundaryType::Linear),
            "circular" => Ok(BoundaryType::Circular),
            "linked" => Ok(BoundaryType::Linked),
            _ => Err(CascadeError::MalformedBoundary(s.to_string())),
        }
    }
}

impl fmt::Display for BoundaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoundaryType::Linear => "linear",
            BoundaryType::Circular => "circular",
            BoundaryType::Linked => "linked",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timepoint {
    pub id: TimepointId,
    /// Length of the timepoint
    pub duration: Hours,
    /// Number of times this timepoint is replicated when scaling to a year
    pub weight: f64,
}

/// A horizon with its timepoints in global order.
#[derive(Debug, Clone, PartialEq)]
pub struct Horizon {
    pub key: HorizonKey,
    pub boundary: BoundaryType,
    timepoints: Vec<TimepointId>,
}

impl Horizon {
    pub fn timepoints(&self) -> &[TimepointId] {
        &self.timepoints
    }

    pub fn len(&self) -> usize {
        self.timepoints.len()
    }

    /// Always false for a horizon obtained from a built grid.
    pub fn is_empty(&self) -> bool {
        self.timepoints.is_empty()
    }

    pub fn first(&self) -> TimepointId {
        self.timepoints[0]
    }

    pub fn last(&self) -> TimepointId {
        self.timepoints[self.timepoints.len() - 1]
    }
}

/// Ordered timepoints plus every horizon partition over them.
#[derive(Debug, Clone, Default)]
pub struct TimeGrid {
    timepoints: BTreeMap<TimepointId, Timepoint>,
    horizons: Vec<Horizon>,
}

impl TimeGrid {
    pub fn builder() -> TimeGridBuilder {
        TimeGridBuilder::default()
    }

    /// Timepoints in global order.
    pub fn timepoints(&self) -> impl Iterator<Item = &Timepoint> + '_ {
        self.timepoints.values()
    }

    pub fn timepoint_ids(&self) -> impl Iterator<Item = TimepointId> + '_ {
        self.timepoints.keys().copied()
    }

    pub fn timepoint(&self, id: TimepointId) -> Option<&Timepoint> {
        self.timepoints.get(&id)
    }

    pub fn contains(&self, id: TimepointId) -> bool {
        self.timepoints.contains_key(&id)
    }

    /// Duration of a timepoint; unknown ids have zero length.
    pub fn duration(&self, id: TimepointId) -> Hours {
        self.timepoints
            .get(&id)
            .map(|tp| tp.duration)
            .unwrap_or(Hours::ZERO)
    }

    pub fn len(&self) -> usize {
        self.timepoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timepoints.is_empty()
    }

    /// Horizons sorted by key.
    pub fn horizons(&self) -> &[Horizon] {
        &self.horizons
    }

    pub fn horizon(&self, key: &HorizonKey) -> Option<&Horizon> {
        self.horizons
            .binary_search_by(|h| h.key.cmp(key))
            .ok()
            .map(|idx| &self.horizons[idx])
    }

    pub fn horizons_of<'a>(&'a self, balancing_type: &'a str) -> impl Iterator<Item = &'a Horizon> {
        self.horizons
            .iter()
            .filter(move |h| h.key.balancing_type == balancing_type)
    }

    pub fn balancing_types(&self) -> BTreeSet<&str> {
        self.horizons
            .iter()
            .map(|h| h.key.balancing_type.as_str())
            .collect()
    }

    /// Total hours covered by a horizon.
    pub fn horizon_hours(&self, key: &HorizonKey) -> Hours {
        self.horizon(key)
            .map(|h| h.timepoints().iter().map(|tp| self.duration(*tp)).sum())
            .unwrap_or(Hours::ZERO)
    }

    /// Shortest timepoint duration in the grid.
    pub fn min_duration(&self) -> Option<Hours> {
        self.timepoints
            .values()
            .map(|tp| tp.duration)
            .reduce(Hours::min)
    }
}

#[derive(Debug, Clone)]
struct HorizonDraft {
    key: HorizonKey,
    boundary: BoundaryType,
    timepoints: Vec<TimepointId>,
}

/// Collects timepoints and horizons, validating the partition on [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct TimeGridBuilder {
    timepoints: Vec<Timepoint>,
    horizons: Vec<HorizonDraft>,
}

impl TimeGridBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timepoint(mut self, id: u32, hours: f64, weight: f64) -> Self {
        self.add_timepoint(id, hours, weight);
        self
    }

    pub fn add_timepoint(&mut self, id: u32, hours: f64, weight: f64) -> &mut Self {
        self.timepoints.push(Timepoint {
            id: TimepointId(id),
            duration: Hours(hours),
            weight,
        });
        self
    }

    pub fn horizon(
        mut self,
        balancing_type: &str,
        horizon: u32,
        boundary: BoundaryType,
        timepoints: impl IntoIterator<Item = u32>,
    ) -> Self {
        self.add_horizon(balancing_type, horizon, boundary, timepoints);
        self
    }

    pub fn add_horizon(
        &mut self,
        balancing_type: &str,
        horizon: u32,
        boundary: BoundaryType,
        timepoints: impl IntoIterator<Item = u32>,
    ) -> &mut Self {
        self.horizons.push(HorizonDraft {
            key: HorizonKey::new(balancing_type, horizon),
            boundary,
            timepoints: timepoints.into_iter().map(TimepointId).collect(),
        });
        self
    }

    pub fn build(self) -> CascadeResult<TimeGrid> {
        let mut timepoints = BTreeMap::new();
        for tp in self.timepoints {
            if !(tp.duration.value() > 0.0 && tp.duration.is_finite()) {
                return Err(CascadeError::Config(format!(
                    "{} has non-positive duration {}",
                    tp.id, tp.duration
                )));
            }
            if !(tp.weight >= 0.0 && tp.weight.is_finite()) {
                return Err(CascadeError::Config(format!(
                    "{} has invalid weight {}",
                    tp.id, tp.weight
                )));
            }
            let id = tp.id;
            if timepoints.insert(id, tp).is_some() {
                return Err(CascadeError::Duplicate {
                    kind: "timepoint",
                    name: id.value().to_string(),
                });
            }
        }

        let position: HashMap<TimepointId, usize> =
            timepoints.keys().enumerate().map(|(i, id)| (*id, i)).collect();

        // balancing type -> timepoint -> owning horizon
        let mut owners: HashMap<String, HashMap<TimepointId, HorizonKey>> = HashMap::new();
        let mut horizons: Vec<Horizon> = Vec::with_capacity(self.horizons.len());
        for draft in self.horizons {
            if draft.timepoints.is_empty() {
                return Err(CascadeError::EmptyHorizon(draft.key));
            }
            if horizons.iter().any(|h| h.key == draft.key) {
                return Err(CascadeError::Duplicate {
                    kind: "horizon",
                    name: draft.key.to_string(),
                });
            }
            let mut members = draft.timepoints;
            members.sort();
            let members_before_dedup = members.len();
            members.dedup();
            if members.len() != members_before_dedup {
                return Err(CascadeError::Config(format!(
                    "horizon {} lists a timepoint more than once",
                    draft.key
                )));
            }
            let owned = owners.entry(draft.key.balancing_type.clone()).or_default();
            for tp in &members {
                if !timepoints.contains_key(tp) {
                    return Err(CascadeError::UnknownReference {
                        kind: "timepoint",
                        name: format!("{} (in horizon {})", tp.value(), draft.key),
                    });
                }
                if let Some(previous) = owned.insert(*tp, draft.key.clone()) {
                    return Err(CascadeError::Config(format!(
                        "{} belongs to both horizon {} and horizon {}",
                        tp, previous, draft.key
                    )));
                }
            }
            if let Some(gap) = members
                .windows(2)
                .find(|pair| position.get(&pair[1]).copied() != position.get(&pair[0]).map(|p| p + 1))
            {
                return Err(CascadeError::Config(format!(
                    "horizon {} is not contiguous: {} is followed by {}",
                    draft.key, gap[0], gap[1]
                )));
            }
            horizons.push(Horizon {
                key: draft.key,
                boundary: draft.boundary,
                timepoints: members,
            });
        }

        for (balancing_type, owned) in &owners {
            if let Some(orphan) = timepoints.keys().find(|tp| !owned.contains_key(tp)) {
                return Err(CascadeError::Config(format!(
                    "{} has no horizon for balancing type '{}'",
                    orphan, balancing_type
                )));
            }
        }

        horizons.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(TimeGrid {
            timepoints,
            horizons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_day_grid() -> TimeGrid {
        TimeGrid::builder()
            .timepoint(1, 12.0, 1.0)
            .timepoint(2, 12.0, 1.0)
            .timepoint(3, 12.0, 1.0)
            .timepoint(4, 12.0, 1.0)
            .horizon("day", 1, BoundaryType::Circular, [2, 1])
            .horizon("day", 2, BoundaryType::Circular, [3, 4])
            .horizon("period", 1, BoundaryType::Linear, [1, 2, 3, 4])
            .build()
            .unwrap()
    }

    #[test]
    fn test_horizon_members_are_sorted() {
        let grid = two_day_grid();
        let day1 = grid.horizon(&HorizonKey::new("day", 1)).unwrap();
        assert_eq!(day1.timepoints(), &[TimepointId::new(1), TimepointId::new(2)]);
        assert_eq!(day1.first(), TimepointId::new(1));
        assert_eq!(day1.last(), TimepointId::new(2));
    }

    #[test]
    fn test_horizon_hours_and_balancing_types() {
        let grid = two_day_grid();
        assert_eq!(grid.horizon_hours(&HorizonKey::new("period", 1)), Hours(48.0));
        assert_eq!(grid.horizon_hours(&HorizonKey::new("day", 2)), Hours(24.0));
        let types: Vec<_> = grid.balancing_types().into_iter().collect();
        assert_eq!(types, vec!["day", "period"]);
        assert_eq!(grid.horizons_of("day").count(), 2);
        assert_eq!(grid.min_duration(), Some(Hours(12.0)));
    }

    #[test]
    fn test_empty_horizon_is_fatal() {
        let result = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Linear, [1])
            .horizon("day", 2, BoundaryType::Linear, Vec::<u32>::new())
            .build();
        assert!(matches!(result, Err(CascadeError::EmptyHorizon(_))));
    }

    #[test]
    fn test_overlapping_horizons_rejected() {
        let result = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .timepoint(2, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Linear, [1, 2])
            .horizon("day", 2, BoundaryType::Linear, [2])
            .build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("belongs to both"));
    }

    #[test]
    fn test_non_contiguous_horizon_rejected() {
        let result = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .timepoint(2, 1.0, 1.0)
            .timepoint(3, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Circular, [1, 3])
            .horizon("day", 2, BoundaryType::Circular, [2])
            .build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("horizon day/1 is not contiguous"), "{}", err);
    }

    #[test]
    fn test_uncovered_timepoint_rejected() {
        let result = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .timepoint(2, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Linear, [1])
            .build();
        assert!(result.unwrap_err().to_string().contains("no horizon"));
    }

    #[test]
    fn test_unknown_timepoint_rejected() {
        let result = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Linear, [1, 7])
            .build();
        assert!(matches!(
            result,
            Err(CascadeError::UnknownReference { kind: "timepoint", .. })
        ));
    }

    #[test]
    fn test_non_positive_duration_rejected() {
        let result = TimeGrid::builder()
            .timepoint(1, 0.0, 1.0)
            .horizon("day", 1, BoundaryType::Linear, [1])
            .build();
        assert!(matches!(result, Err(CascadeError::Config(_))));
    }

    #[test]
    fn test_boundary_parsing() {
        assert_eq!("Circular".parse::<BoundaryType>().unwrap(), BoundaryType::Circular);
        assert_eq!(" linked ".parse::<BoundaryType>().unwrap(), BoundaryType::Linked);
        assert!(matches!(
            "wrap".parse::<BoundaryType>(),
            Err(CascadeError::MalformedBoundary(_))
        ));
    }
}
