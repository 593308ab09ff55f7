//! Unified error type for the cascade crates
//!
//! [`CascadeError`] covers configuration mistakes (fatal, surfaced immediately) and the
//! one routing condition the core refuses to guess about: walking across a linked horizon
//! boundary. Horizon stepping signals that are part of normal control flow live in
//! [`crate::horizon::StepError`] and convert into this type only when they escape.
//!
//! # Example
//!
//! ```
//! use cascade_core::{CascadeError, CascadeResult};
//!
//! fn check_travel_time(hours: f64) -> CascadeResult<()> {
//!     if hours < 0.0 {
//!         return Err(CascadeError::NegativeTravelTime {
//!             link: "canal".into(),
//!             hours,
//!         });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_travel_time(-1.0).is_err());
//! ```

use thiserror::Error;

use crate::horizon::StepError;
use crate::time_grid::{HorizonKey, TimepointId};

#[derive(Error, Debug)]
pub enum CascadeError {
    /// I/O errors (reading configuration files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration error: horizon {0} has no timepoints")]
    EmptyHorizon(HorizonKey),

    #[error("Configuration error: link '{link}' has negative travel time {hours} h")]
    NegativeTravelTime { link: String, hours: f64 },

    #[error("Configuration error: unknown {kind} '{name}'")]
    UnknownReference { kind: &'static str, name: String },

    #[error("Configuration error: duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },

    #[error("Configuration error: malformed boundary type '{0}' (expected linear, circular or linked)")]
    MalformedBoundary(String),

    /// A routing walk reached the edge of a linked horizon under the strict policy
    #[error("unresolved linked boundary: timepoint {timepoint} sits at the edge of linked horizon {horizon}")]
    UnresolvedLinkedBoundary {
        timepoint: TimepointId,
        horizon: HorizonKey,
    },

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

pub type CascadeResult<T> = Result<T, CascadeError>;

impl CascadeError {
    /// True for every variant that stems from bad input data rather than a routing decision.
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            CascadeError::UnresolvedLinkedBoundary { .. } | CascadeError::Other(_)
        )
    }
}

impl From<StepError> for CascadeError {
    fn from(err: StepError) -> Self {
        match err {
            StepError::RequiresLinkedHorizon { timepoint, horizon } => {
                CascadeError::UnresolvedLinkedBoundary { timepoint, horizon }
            }
            StepError::Unassigned {
                timepoint,
                balancing_type,
            } => CascadeError::UnknownReference {
                kind: "horizon membership",
                name: format!("{timepoint} in balancing type '{balancing_type}'"),
            },
            other => CascadeError::Other(other.to_string()),
        }
    }
}

impl From<String> for CascadeError {
    fn from(s: String) -> Self {
        CascadeError::Other(s)
    }
}

impl From<&str> for CascadeError {
    fn from(s: &str) -> Self {
        CascadeError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for CascadeError {
    fn from(err: serde_json::Error) -> Self {
        CascadeError::Parse(err.to_string())
    }
}
