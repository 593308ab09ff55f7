//! Ramp constraints over the router's lookahead windows.
//!
//! For each ramp limit, start timepoint `t` and concrete timepoint `r` in the window after
//! `t`:
//!
//! ```text
//! direction * (flow(link, r) - flow(link, t)) <= allowed_delta(t)
//! ```
//!
//! `allowed_delta(t)` is the tightest value over the horizons covering `t`. Timepoints
//! with no configured delta, and window entries outside the horizon, produce no row.

use good_lp::Expression;
use tracing::debug;

use cascade_core::{HorizonResolver, RampLimit, TimeGrid};

use crate::expression::ConstraintRow;
use crate::routing::{RoutedTimepoint, TravelTimeRouter};
use crate::variables::WaterVariables;

/// Rows for a single ramp limit.
pub fn ramp_limit_constraints<V: WaterVariables>(
    grid: &TimeGrid,
    resolver: &HorizonResolver,
    router: &TravelTimeRouter,
    limit: &RampLimit,
    vars: &V,
) -> Vec<ConstraintRow> {
    let sign = limit.direction.sign();
    let mut rows = Vec::new();
    for start in grid.timepoint_ids() {
        let Some(delta) = limit.allowed_delta_at(resolver, start) else {
            continue;
        };
        for reached in router.ramp_lookahead(limit.link, &limit.name, start) {
            let RoutedTimepoint::Within(r) = reached else {
                continue;
            };
            let change = vars.link_flow(limit.link, *r) - vars.link_flow(limit.link, start);
            rows.push(ConstraintRow::less_or_equal(
                format!("ramp[{},{},{}]", limit.name, start.value(), r.value()),
                change * sign,
                Expression::from(delta.value()),
            ));
        }
    }
    rows
}

/// Rows for every ramp limit.
pub fn ramp_constraints<V: WaterVariables>(
    grid: &TimeGrid,
    resolver: &HorizonResolver,
    router: &TravelTimeRouter,
    limits: &[RampLimit],
    vars: &V,
) -> Vec<ConstraintRow> {
    let rows: Vec<ConstraintRow> = limits
        .iter()
        .flat_map(|limit| ramp_limit_constraints(grid, resolver, router, limit, vars))
        .collect();
    debug!(limits = limits.len(), rows = rows.len(), "built ramp constraints");
    rows
}
