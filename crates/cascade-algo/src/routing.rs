//! # Travel-Time Routing
//!
//! Resolves, for every link and departure timepoint, the timepoint in which the water
//! arrives downstream, and derives the two lookups the constraint layer needs from it:
//!
//! - **arrival map** `(link, departure) -> Timepoint | OutsideHorizon`, a total function
//! - **departure map** `(link, arrival) -> [Timepoint | OutsideHorizon]`, its inverse
//! - **ramp lookahead** `(link, limit, start) -> [Timepoint | OutsideHorizon]`
//!
//! ## Arrival walk
//!
//! ```text
//! travel time T, departure d, duration h(d)
//!
//!   T < h(d)            -> arrival = d
//!   otherwise           -> step forward, elapsed starts at h(d);
//!                          arrival = first timepoint whose start lies >= T after d's start
//!   linear edge first   -> OutsideHorizon
//!   circular, back at d -> OutsideHorizon (horizon shorter than T)
//!   linked edge first   -> OutsideHorizon (fallback) | UnresolvedLinkedBoundary (strict)
//! ```
//!
//! Example: two 12 h timepoints on a circular day, T = 18 h. From timepoint 1 the walk
//! steps to timepoint 2 (elapsed 12 h < 18 h), then wraps to timepoint 1 with 24 h
//! elapsed, so the water arrives in timepoint 1 of the same day.
//!
//! Every walk is an explicit loop capped at twice the horizon length, so a malformed
//! horizon cannot make it spin.
//!
//! ## Inverse map
//!
//! The departure map is one-to-many. A timepoint that receives no routed water maps to
//! `[OutsideHorizon]`; departures whose water leaves the horizon are kept in a separate
//! bucket ([`TravelTimeRouter::departed_outside`]).

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

use cascade_core::{
    CascadeError, CascadeResult, HorizonResolver, Hours, LinkId, RampLimit, StepError, TimeGrid,
    TimepointId, WaterLink, WaterNetwork,
};

/// A concrete timepoint or the "outside the horizon being solved" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RoutedTimepoint {
    Within(TimepointId),
    OutsideHorizon,
}

impl RoutedTimepoint {
    pub fn timepoint(self) -> Option<TimepointId> {
        match self {
            RoutedTimepoint::Within(tp) => Some(tp),
            RoutedTimepoint::OutsideHorizon => None,
        }
    }

    pub fn is_outside(self) -> bool {
        matches!(self, RoutedTimepoint::OutsideHorizon)
    }
}

impl fmt::Display for RoutedTimepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutedTimepoint::Within(tp) => write!(f, "{}", tp),
            RoutedTimepoint::OutsideHorizon => f.write_str("outside horizon"),
        }
    }
}

/// What to do when a walk reaches the edge of a linked horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkedBoundaryPolicy {
    /// Treat the linked edge like a linear one and log a warning.
    #[default]
    Fallback,
    /// Fail with [`CascadeError::UnresolvedLinkedBoundary`].
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutingOptions {
    /// Balancing type whose horizons the walks follow
    pub balancing_type: String,
    pub linked_policy: LinkedBoundaryPolicy,
}

impl RoutingOptions {
    pub fn new(balancing_type: impl Into<String>) -> Self {
        Self {
            balancing_type: balancing_type.into(),
            linked_policy: LinkedBoundaryPolicy::default(),
        }
    }

    pub fn strict(mut self) -> Self {
        self.linked_policy = LinkedBoundaryPolicy::Strict;
        self
    }
}

/// One row of the arrival map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepartureArrivalPair {
    pub link: LinkId,
    pub departure: TimepointId,
    pub arrival: RoutedTimepoint,
}

#[derive(Debug, Clone, Default)]
struct LinkRoutes {
    arrivals: BTreeMap<TimepointId, RoutedTimepoint>,
    departures: BTreeMap<TimepointId, Vec<RoutedTimepoint>>,
    outside: Vec<TimepointId>,
    // limit name -> start -> reachable timepoints
    ramp_windows: HashMap<String, BTreeMap<TimepointId, Vec<RoutedTimepoint>>>,
    linked_fallbacks: usize,
}

/// Shared read-only state for the walks of one subproblem.
struct Walker<'a> {
    grid: &'a TimeGrid,
    resolver: &'a HorizonResolver,
    options: &'a RoutingOptions,
}

/// Result of a single boundary step.
enum Step {
    To(TimepointId),
    /// Linear edge, or a linked edge under the fallback policy
    Leaves { linked: bool },
}

impl Walker<'_> {
    fn step(&self, from: TimepointId) -> CascadeResult<Step> {
        match self.resolver.next(from, &self.options.balancing_type) {
            Ok(tp) => Ok(Step::To(tp)),
            Err(StepError::NoSuccessor(_)) => Ok(Step::Leaves { linked: false }),
            Err(err @ StepError::RequiresLinkedHorizon { .. }) => match self.options.linked_policy {
                LinkedBoundaryPolicy::Fallback => Ok(Step::Leaves { linked: true }),
                LinkedBoundaryPolicy::Strict => Err(err.into()),
            },
            Err(err) => Err(err.into()),
        }
    }

    fn step_cap(&self, from: TimepointId) -> usize {
        2 * self
            .resolver
            .horizon_len(from, &self.options.balancing_type)
            .max(1)
    }

    /// Arrival timepoint for water leaving at `departure`; the flag reports a linked fallback.
    fn arrival(&self, departure: TimepointId, travel_time: Hours) -> CascadeResult<(RoutedTimepoint, bool)> {
        let mut elapsed = self.grid.duration(departure);
        if travel_time < elapsed {
            return Ok((RoutedTimepoint::Within(departure), false));
        }
        let mut current = departure;
        for _ in 0..self.step_cap(departure) {
            current = match self.step(current)? {
                Step::To(tp) => tp,
                Step::Leaves { linked } => return Ok((RoutedTimepoint::OutsideHorizon, linked)),
            };
            if elapsed >= travel_time {
                return Ok((RoutedTimepoint::Within(current), false));
            }
            if current == departure {
                // wrapped around a circular horizon shorter than the travel time
                return Ok((RoutedTimepoint::OutsideHorizon, false));
            }
            elapsed += self.grid.duration(current);
        }
        Ok((RoutedTimepoint::OutsideHorizon, false))
    }

    /// Timepoints reached from `start` while fewer than `window` hours have elapsed.
    fn window(&self, start: TimepointId, window: Hours) -> CascadeResult<(Vec<RoutedTimepoint>, bool)> {
        let mut reached = Vec::new();
        let mut elapsed = Hours::ZERO;
        let mut current = start;
        let mut steps = 0;
        let cap = self.step_cap(start);
        while elapsed < window && steps < cap {
            steps += 1;
            let next = match self.step(current)? {
                Step::To(tp) => tp,
                Step::Leaves { linked } => {
                    reached.push(RoutedTimepoint::OutsideHorizon);
                    return Ok((reached, linked));
                }
            };
            if next == start {
                break;
            }
            elapsed += self.grid.duration(current);
            reached.push(RoutedTimepoint::Within(next));
            current = next;
        }
        Ok((reached, false))
    }

    fn route_link(&self, link: &WaterLink, ramp_limits: &[&RampLimit]) -> CascadeResult<LinkRoutes> {
        let mut routes = LinkRoutes::default();
        for departure in self.grid.timepoint_ids() {
            let (arrival, fell_back) = self.arrival(departure, link.travel_time)?;
            routes.linked_fallbacks += usize::from(fell_back);
            routes.arrivals.insert(departure, arrival);
            routes.departures.entry(departure).or_default();
        }

        for (departure, arrival) in &routes.arrivals {
            match arrival {
                RoutedTimepoint::Within(tp) => routes
                    .departures
                    .entry(*tp)
                    .or_default()
                    .push(RoutedTimepoint::Within(*departure)),
                RoutedTimepoint::OutsideHorizon => routes.outside.push(*departure),
            }
        }
        for sources in routes.departures.values_mut() {
            if sources.is_empty() {
                sources.push(RoutedTimepoint::OutsideHorizon);
            }
        }

        for limit in ramp_limits {
            let mut windows = BTreeMap::new();
            for start in self.grid.timepoint_ids() {
                let (reached, fell_back) = self.window(start, limit.window)?;
                routes.linked_fallbacks += usize::from(fell_back);
                windows.insert(start, reached);
            }
            routes.ramp_windows.insert(limit.name.clone(), windows);
        }

        if routes.linked_fallbacks > 0 {
            warn!(
                link = %link.name,
                count = routes.linked_fallbacks,
                "routing crossed a linked horizon boundary; treating it as outside the horizon"
            );
        }
        debug!(
            link = %link.name,
            travel_time = %link.travel_time,
            outside = routes.outside.len(),
            "routed link"
        );
        Ok(routes)
    }
}

/// Departure/arrival maps and ramp lookahead sets for every link of one subproblem.
///
/// Built once and immutable afterwards; share it by reference across constraint builders.
#[derive(Debug, Clone)]
pub struct TravelTimeRouter {
    options: RoutingOptions,
    routes: HashMap<LinkId, LinkRoutes>,
}

impl TravelTimeRouter {
    /// Route every link of `network` over `grid`. Links are routed in parallel.
    pub fn build(
        grid: &TimeGrid,
        resolver: &HorizonResolver,
        network: &WaterNetwork,
        ramp_limits: &[RampLimit],
        options: RoutingOptions,
    ) -> CascadeResult<Self> {
        if !grid.is_empty() && grid.horizons_of(&options.balancing_type).next().is_none() {
            return Err(CascadeError::UnknownReference {
                kind: "balancing type",
                name: options.balancing_type.clone(),
            });
        }

        let walker = Walker {
            grid,
            resolver,
            options: &options,
        };
        let links: Vec<&WaterLink> = network.links().collect();
        let routed: Vec<(LinkId, LinkRoutes)> = links
            .par_iter()
            .map(|link| {
                let limits: Vec<&RampLimit> =
                    ramp_limits.iter().filter(|l| l.link == link.id).collect();
                walker.route_link(link, &limits).map(|routes| (link.id, routes))
            })
            .collect::<CascadeResult<Vec<_>>>()?;

        let router = Self {
            routes: routed.into_iter().collect(),
            options,
        };
        info!(
            links = router.routes.len(),
            timepoints = grid.len(),
            balancing_type = %router.options.balancing_type,
            linked_fallbacks = router.linked_fallbacks(),
            "built travel-time routes"
        );
        Ok(router)
    }

    pub fn options(&self) -> &RoutingOptions {
        &self.options
    }

    /// Arrival of water departing `link` at `departure`; `None` for unknown ids.
    pub fn arrival(&self, link: LinkId, departure: TimepointId) -> Option<RoutedTimepoint> {
        self.routes
            .get(&link)
            .and_then(|routes| routes.arrivals.get(&departure).copied())
    }

    /// Departures whose water reaches the end of `link` in `arrival`.
    ///
    /// `[OutsideHorizon]` when nothing routed arrives in that timepoint; empty for unknown ids.
    pub fn departures(&self, link: LinkId, arrival: TimepointId) -> &[RoutedTimepoint] {
        self.routes
            .get(&link)
            .and_then(|routes| routes.departures.get(&arrival))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Departures whose water leaves the horizon before arriving.
    pub fn departed_outside(&self, link: LinkId) -> &[TimepointId] {
        self.routes
            .get(&link)
            .map(|routes| routes.outside.as_slice())
            .unwrap_or(&[])
    }

    /// Timepoints within the ramp window of `limit` after `start`.
    pub fn ramp_lookahead(&self, link: LinkId, limit: &str, start: TimepointId) -> &[RoutedTimepoint] {
        self.routes
            .get(&link)
            .and_then(|routes| routes.ramp_windows.get(limit))
            .and_then(|windows| windows.get(&start))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Arrival map rows of `link` in departure order.
    pub fn pairs(&self, link: LinkId) -> impl Iterator<Item = DepartureArrivalPair> + '_ {
        self.routes
            .get(&link)
            .into_iter()
            .flat_map(move |routes| {
                routes
                    .arrivals
                    .iter()
                    .map(move |(departure, arrival)| DepartureArrivalPair {
                        link,
                        departure: *departure,
                        arrival: *arrival,
                    })
            })
    }

    /// Number of walks that fell back to `OutsideHorizon` at a linked boundary.
    pub fn linked_fallbacks(&self) -> usize {
        self.routes.values().map(|r| r.linked_fallbacks).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::{BoundaryType, WaterLink};

    fn tp(id: u32) -> TimepointId {
        TimepointId::new(id)
    }

    fn two_node(travel_time: f64) -> WaterNetwork {
        let mut network = WaterNetwork::new();
        let a = network.add_node("a", None).unwrap();
        let b = network.add_node("b", None).unwrap();
        network
            .add_link(WaterLink::new("ab", a, b).with_travel_time(travel_time))
            .unwrap();
        network
    }

    fn route(grid: &TimeGrid, network: &WaterNetwork, options: RoutingOptions) -> CascadeResult<TravelTimeRouter> {
        let resolver = HorizonResolver::new(grid);
        TravelTimeRouter::build(grid, &resolver, network, &[], options)
    }

    #[test]
    fn test_circular_day_wraps_to_same_timepoint() {
        let grid = TimeGrid::builder()
            .timepoint(1, 12.0, 1.0)
            .timepoint(2, 12.0, 1.0)
            .horizon("day", 1, BoundaryType::Circular, [1, 2])
            .build()
            .unwrap();
        let router = route(&grid, &two_node(18.0), RoutingOptions::new("day")).unwrap();
        let link = LinkId::new(0);
        assert_eq!(router.arrival(link, tp(1)), Some(RoutedTimepoint::Within(tp(1))));
        assert_eq!(router.arrival(link, tp(2)), Some(RoutedTimepoint::Within(tp(2))));
    }

    #[test]
    fn test_linear_horizon_too_short() {
        let grid = TimeGrid::builder()
            .timepoint(1, 12.0, 1.0)
            .timepoint(2, 12.0, 1.0)
            .horizon("day", 1, BoundaryType::Linear, [1, 2])
            .build()
            .unwrap();
        let router = route(&grid, &two_node(30.0), RoutingOptions::new("day")).unwrap();
        let link = LinkId::new(0);
        assert_eq!(router.arrival(link, tp(1)), Some(RoutedTimepoint::OutsideHorizon));
        assert_eq!(router.departed_outside(link), &[tp(1), tp(2)]);
        assert_eq!(router.departures(link, tp(1)), &[RoutedTimepoint::OutsideHorizon]);
    }

    #[test]
    fn test_short_travel_time_stays_put() {
        let grid = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .timepoint(2, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Linear, [1, 2])
            .build()
            .unwrap();
        let router = route(&grid, &two_node(0.5), RoutingOptions::new("day")).unwrap();
        assert_eq!(
            router.arrival(LinkId::new(0), tp(2)),
            Some(RoutedTimepoint::Within(tp(2)))
        );
    }

    #[test]
    fn test_circular_horizon_shorter_than_travel_time() {
        let grid = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .timepoint(2, 1.0, 1.0)
            .timepoint(3, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Circular, [1, 2, 3])
            .build()
            .unwrap();
        let router = route(&grid, &two_node(3.5), RoutingOptions::new("day")).unwrap();
        for id in 1..=3 {
            assert_eq!(
                router.arrival(LinkId::new(0), tp(id)),
                Some(RoutedTimepoint::OutsideHorizon)
            );
        }
    }

    #[test]
    fn test_linked_boundary_policies() {
        let grid = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .timepoint(2, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Linked, [1, 2])
            .build()
            .unwrap();
        let network = two_node(1.0);

        let router = route(&grid, &network, RoutingOptions::new("day")).unwrap();
        assert_eq!(
            router.arrival(LinkId::new(0), tp(1)),
            Some(RoutedTimepoint::Within(tp(2)))
        );
        assert_eq!(
            router.arrival(LinkId::new(0), tp(2)),
            Some(RoutedTimepoint::OutsideHorizon)
        );
        assert_eq!(router.linked_fallbacks(), 1);

        let strict = route(&grid, &network, RoutingOptions::new("day").strict());
        assert!(matches!(
            strict,
            Err(CascadeError::UnresolvedLinkedBoundary { .. })
        ));
    }

    #[test]
    fn test_unknown_balancing_type() {
        let grid = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Linear, [1])
            .build()
            .unwrap();
        let result = route(&grid, &two_node(1.0), RoutingOptions::new("week"));
        assert!(matches!(result, Err(CascadeError::UnknownReference { .. })));
    }

    #[test]
    fn test_ramp_window_one_hour() {
        let grid = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .timepoint(2, 1.0, 1.0)
            .timepoint(3, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Linear, [1, 2, 3])
            .build()
            .unwrap();
        let network = two_node(0.0);
        let resolver = HorizonResolver::new(&grid);
        let limits = vec![
            RampLimit::new(LinkId::new(0), "hourly", cascade_core::RampDirection::Up, 1.0),
            RampLimit::new(LinkId::new(0), "two_hour", cascade_core::RampDirection::Down, 2.0),
        ];
        let router =
            TravelTimeRouter::build(&grid, &resolver, &network, &limits, RoutingOptions::new("day")).unwrap();
        let link = LinkId::new(0);
        assert_eq!(
            router.ramp_lookahead(link, "hourly", tp(1)),
            &[RoutedTimepoint::Within(tp(2))]
        );
        assert_eq!(
            router.ramp_lookahead(link, "hourly", tp(3)),
            &[RoutedTimepoint::OutsideHorizon]
        );
        assert_eq!(
            router.ramp_lookahead(link, "two_hour", tp(1)),
            &[RoutedTimepoint::Within(tp(2)), RoutedTimepoint::Within(tp(3))]
        );
        assert_eq!(
            router.ramp_lookahead(link, "two_hour", tp(2)),
            &[RoutedTimepoint::Within(tp(3)), RoutedTimepoint::OutsideHorizon]
        );
        assert!(router.ramp_lookahead(link, "missing", tp(1)).is_empty());
    }

    #[test]
    fn test_ramp_window_stops_after_full_circle() {
        let grid = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .timepoint(2, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Circular, [1, 2])
            .build()
            .unwrap();
        let network = two_node(0.0);
        let resolver = HorizonResolver::new(&grid);
        let limits = vec![RampLimit::new(
            LinkId::new(0),
            "long",
            cascade_core::RampDirection::Up,
            10.0,
        )];
        let router =
            TravelTimeRouter::build(&grid, &resolver, &network, &limits, RoutingOptions::new("day")).unwrap();
        assert_eq!(
            router.ramp_lookahead(LinkId::new(0), "long", tp(1)),
            &[RoutedTimepoint::Within(tp(2))]
        );
    }

    #[test]
    fn test_pairs_in_departure_order() {
        let grid = TimeGrid::builder()
            .timepoint(1, 1.0, 1.0)
            .timepoint(2, 1.0, 1.0)
            .horizon("day", 1, BoundaryType::Circular, [1, 2])
            .build()
            .unwrap();
        let router = route(&grid, &two_node(1.0), RoutingOptions::new("day")).unwrap();
        let pairs: Vec<_> = router.pairs(LinkId::new(0)).collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].departure, tp(1));
        assert_eq!(pairs[0].arrival, RoutedTimepoint::Within(tp(2)));
        assert_eq!(pairs[1].arrival, RoutedTimepoint::Within(tp(1)));
        assert_eq!(RoutedTimepoint::OutsideHorizon.to_string(), "outside horizon");
    }
}
