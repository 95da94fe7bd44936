use crate::dimensions::{Method, Region};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A catch that could not be taken from the vulnerable biomass available to
/// a gear. The rate actually applied was clamped to `rate_applied`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploitationAnomaly {
    pub region: Region,
    pub method: Method,
    pub catch: f64,
    pub biomass_vulnerable: f64,
    /// `catch / biomass_vulnerable`; infinite or NaN when nothing is vulnerable.
    pub implied_rate: f64,
    pub rate_applied: f64,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("model must be initialised before the stock-recruitment relation can be used")]
    Uninitialised,

    #[error("equilibrium not reached after {years} years (relative biomass change {change:e})")]
    EquilibriumNotConverged { years: usize, change: f64 },

    #[error("catches exceed vulnerable biomass for {} region/method combination(s)", .0.len())]
    ExploitationAnomaly(Vec<ExploitationAnomaly>),
}

impl ModelError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ModelError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
