//! Model parameters and solver settings.

use crate::dimensions::{Method, Region, METHODS, QUARTERS, REGIONS, SIZES};
use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Shape of the stock-recruitment relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecruitsCurve {
    /// `4·h·R0·B0 / ((5h−1)·B + B0·(1−h))`, the relation the IOSKJ model uses.
    #[default]
    Ioskj,
    /// Textbook steepness form, `4·h·R0·B / ((5h−1)·B + B0·(1−h))`.
    BevertonHolt,
}

/// How the exploitation rates of several gears combine into survival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GearCombination {
    /// `1 − Π_method rate·selectivity`.
    #[default]
    JointRate,
    /// `Π_method (1 − rate·selectivity)`, each gear removing fish independently.
    IndependentGears,
}

/// Life-history, movement, spawning and selectivity parameters.
///
/// Values are assumed to have been sampled or read by the caller; `validate`
/// only rejects sets that cannot produce well-formed rate tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Unfished equilibrium recruitment (numbers per quarter).
    pub recruits_unfished: f64,
    /// Steepness of the Beverton-Holt stock-recruitment relation.
    pub recruits_steepness: f64,
    /// Log-scale standard deviation of recruitment deviations.
    pub recruits_sd: f64,
    pub recruits_curve: RecruitsCurve,
    /// Proportion of recruits settling in each region.
    pub recruits_regions: [f64; REGIONS],
    /// Proportion of recruits entering each size bin.
    pub recruits_sizes: Vec<f64>,

    pub weight_a: f64,
    pub weight_b: f64,

    pub maturity_inflection: f64,
    pub maturity_steepness: f64,

    /// Instantaneous natural mortality at a weight of 1kg.
    pub mortality: f64,
    pub mortality_weight_exponent: f64,
    /// Cap on instantaneous natural mortality at small sizes.
    pub mortality_max: f64,

    pub growth_rate: f64,
    pub growth_asymptote: f64,
    pub growth_sd: f64,
    pub growth_cv: f64,

    /// Unnormalised movement affinities, `[region_from][region]`.
    pub movement_pars: [[f64; REGIONS]; REGIONS],

    /// Fraction of mature biomass spawning in each quarter.
    pub spawning: [f64; QUARTERS],

    /// Selectivity at the knot lengths, by method.
    pub selectivity_points: [[f64; 5]; METHODS],

    /// Largest exploitation rate applied when catches are converted to rates.
    pub exploitation_rate_max: f64,
    pub gear_combination: GearCombination,
}

impl Default for Parameters {
    fn default() -> Self {
        let mut recruits_sizes = vec![0.0; SIZES];
        recruits_sizes[0] = 1.0;
        Self {
            recruits_unfished: 10e6,
            recruits_steepness: 0.9,
            recruits_sd: 0.6,
            recruits_curve: RecruitsCurve::default(),
            recruits_regions: [0.5, 0.3, 0.2],
            recruits_sizes,
            weight_a: 5.32e-6,
            weight_b: 3.35,
            maturity_inflection: 40.0,
            maturity_steepness: 5.0,
            mortality: 0.8,
            mortality_weight_exponent: -0.29,
            mortality_max: -(0.01f64).ln(),
            growth_rate: 0.3,
            growth_asymptote: 75.0,
            growth_sd: 1.0,
            growth_cv: 0.2,
            movement_pars: [
                [0.85, 0.10, 0.05],
                [0.10, 0.80, 0.10],
                [0.05, 0.10, 0.85],
            ],
            spawning: [0.8, 0.5, 0.8, 0.5],
            selectivity_points: [[0.0, 0.1, 0.3, 0.5, 1.0]; METHODS],
            exploitation_rate_max: 1.0,
            gear_combination: GearCombination::default(),
        }
    }
}

impl Parameters {
    pub fn recruits_uniform(&mut self) {
        self.recruits_regions = [1.0 / REGIONS as f64; REGIONS];
    }

    /// No movement between regions.
    pub fn movement_none(&mut self) {
        for (from, row) in self.movement_pars.iter_mut().enumerate() {
            for (to, value) in row.iter_mut().enumerate() {
                *value = if from == to { 1.0 } else { 0.0 };
            }
        }
    }

    pub fn movement_uniform(&mut self) {
        self.movement_pars = [[1.0 / (REGIONS * REGIONS) as f64; REGIONS]; REGIONS];
    }

    pub fn spawning_uniform(&mut self) {
        self.spawning = [1.0; QUARTERS];
    }

    pub fn selectivity(&self, method: Method) -> &[f64; 5] {
        &self.selectivity_points[method.index()]
    }

    pub fn movement_affinity(&self, from: Region, to: Region) -> f64 {
        self.movement_pars[from.index()][to.index()]
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let scalars: [(&'static str, f64); 16] = [
            ("recruits_unfished", self.recruits_unfished),
            ("recruits_steepness", self.recruits_steepness),
            ("recruits_sd", self.recruits_sd),
            ("weight_a", self.weight_a),
            ("weight_b", self.weight_b),
            ("maturity_inflection", self.maturity_inflection),
            ("maturity_steepness", self.maturity_steepness),
            ("mortality", self.mortality),
            ("mortality_weight_exponent", self.mortality_weight_exponent),
            ("mortality_max", self.mortality_max),
            ("growth_rate", self.growth_rate),
            ("growth_asymptote", self.growth_asymptote),
            ("growth_sd", self.growth_sd),
            ("growth_cv", self.growth_cv),
            ("exploitation_rate_max", self.exploitation_rate_max),
            ("spawning", self.spawning.iter().sum()),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(ModelError::invalid(name, format!("{} is not finite", value)));
            }
        }

        if self.recruits_unfished <= 0.0 {
            return Err(ModelError::invalid("recruits_unfished", "must be positive"));
        }
        if !(self.recruits_steepness > 0.2 && self.recruits_steepness <= 1.0) {
            return Err(ModelError::invalid(
                "recruits_steepness",
                format!("{} is outside (0.2, 1]", self.recruits_steepness),
            ));
        }
        if self.recruits_sd < 0.0 {
            return Err(ModelError::invalid("recruits_sd", "must not be negative"));
        }
        check_proportions("recruits_regions", &self.recruits_regions)?;
        if self.recruits_sizes.len() != SIZES {
            return Err(ModelError::invalid(
                "recruits_sizes",
                format!("expected {} values, got {}", SIZES, self.recruits_sizes.len()),
            ));
        }
        check_proportions("recruits_sizes", &self.recruits_sizes)?;

        if self.maturity_steepness <= 0.0 {
            return Err(ModelError::invalid("maturity_steepness", "must be positive"));
        }
        if self.mortality < 0.0 || self.mortality_max < 0.0 {
            return Err(ModelError::invalid("mortality", "rates must not be negative"));
        }
        if self.growth_sd <= 0.0 {
            return Err(ModelError::invalid("growth_sd", "must be positive"));
        }
        if self.growth_cv < 0.0 {
            return Err(ModelError::invalid("growth_cv", "must not be negative"));
        }

        for row in &self.movement_pars {
            if row.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(ModelError::invalid(
                    "movement_pars",
                    "affinities must be finite and non-negative",
                ));
            }
            if row.iter().sum::<f64>() <= 0.0 {
                return Err(ModelError::invalid(
                    "movement_pars",
                    "each source region needs a positive total affinity",
                ));
            }
        }

        if self.spawning.iter().any(|v| *v < 0.0 || *v > 1.0) {
            return Err(ModelError::invalid("spawning", "fractions must lie in [0, 1]"));
        }
        if self.spawning.iter().all(|v| *v == 0.0) {
            return Err(ModelError::invalid("spawning", "at least one quarter must spawn"));
        }
        if self
            .selectivity_points
            .iter()
            .flatten()
            .any(|v| !v.is_finite())
        {
            return Err(ModelError::invalid("selectivity_points", "values must be finite"));
        }
        if self.exploitation_rate_max <= 0.0 || self.exploitation_rate_max > 1.0 {
            return Err(ModelError::invalid("exploitation_rate_max", "must lie in (0, 1]"));
        }
        Ok(())
    }
}

fn check_proportions(name: &'static str, values: &[f64]) -> Result<(), ModelError> {
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(ModelError::invalid(name, "proportions must be finite and non-negative"));
    }
    let total: f64 = values.iter().sum();
    if (total - 1.0).abs() > 1e-6 {
        return Err(ModelError::invalid(name, format!("proportions sum to {}, not 1", total)));
    }
    Ok(())
}

/// Settings for driving the population to a deterministic equilibrium.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EquilibriumSettings {
    /// Years simulated before giving up.
    pub max_years: usize,
    /// Summed relative change in regional biomass between years.
    pub tolerance: f64,
}

impl Default for EquilibriumSettings {
    fn default() -> Self {
        Self {
            max_years: 10_000,
            tolerance: 1e-4,
        }
    }
}

/// Settings for the search over exploitation rates for maximum yield.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MsySettings {
    pub lower: f64,
    pub upper: f64,
    /// Width of the final bracket on the exploitation rate.
    pub tolerance: f64,
    pub max_trials: usize,
    pub equilibrium: EquilibriumSettings,
}

impl Default for MsySettings {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 0.99,
            tolerance: 1e-3,
            max_trials: 100,
            equilibrium: EquilibriumSettings::default(),
        }
    }
}
