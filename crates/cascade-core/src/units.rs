//! Unit newtypes for water-system quantities.
//!
//! Routing arithmetic mixes durations (hours), flow rates (volume per unit time) and
//! stored volumes. Keeping them apart at the type level stops a travel time from being
//! added to a flow rate by accident.
//!
//! # Usage
//!
//! ```
//! use cascade_core::units::{FlowRate, Hours};
//!
//! let leg = Hours(12.0) + Hours(6.0);
//! assert_eq!(leg, Hours(18.0));
//!
//! // Flow-hours are what the horizon aggregates accumulate
//! let flow_hours = FlowRate(50.0).over(Hours(2.0));
//! assert_eq!(flow_hours, 100.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Sub};

/// Implements the arithmetic every scalar unit shares.
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl AddAssign for $type {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.3} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            #[inline]
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

/// Elapsed time in hours.
///
/// Timepoint durations, link travel times and ramp windows are all expressed in hours.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Hours(pub f64);

impl_unit_ops!(Hours, "h");

impl Hours {
    pub const ZERO: Self = Self(0.0);
}

/// Water flow rate (volume units per second, or whatever rate unit the scenario uses).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct FlowRate(pub f64);

impl_unit_ops!(FlowRate, "flow");

impl FlowRate {
    pub const ZERO: Self = Self(0.0);
    pub const UNBOUNDED: Self = Self(f64::INFINITY);

    /// Flow-hours delivered by this rate sustained over `hours`.
    #[inline]
    pub fn over(self, hours: Hours) -> f64 {
        self.0 * hours.0
    }
}

/// Stored water volume.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Volume(pub f64);

impl_unit_ops!(Volume, "vol");
