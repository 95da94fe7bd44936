//! Size-based biological rates derived from scalar life-history parameters.
//!
//! All tables are computed once from a validated [`Parameters`] and remain
//! fixed for the life of a model run. Time unit is one quarter (0.25 year).

use crate::dimensions::{length_at, LENGTH_STEP, METHODS, QUARTERS, REGIONS, SELECTIVITY_KNOTS, SIZES};
use crate::error::ModelError;
use crate::params::Parameters;
use crate::spline::MonotoneSpline;
use crate::stats::normal_cdf;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biology {
    pub lengths: DVector<f64>,
    pub weights: DVector<f64>,
    pub maturities: DVector<f64>,
    /// Instantaneous annual natural mortality by size.
    pub mortality_rate: DVector<f64>,
    /// Quarterly survival from natural mortality by size.
    pub mortality_survival: DVector<f64>,
    pub growth_increments: DVector<f64>,
    /// Quarterly size transition, `(size_from, size)`. Rows may sum to less
    /// than one where the kernel spills past the first or last bin.
    pub growth: DMatrix<f64>,
    /// Quarterly movement, `(region_from, region)`. Rows sum to one.
    pub movement: DMatrix<f64>,
    /// Selectivity, `(method, size)`, clamped to [0, 1].
    pub selectivities: DMatrix<f64>,
    pub spawning: [f64; QUARTERS],
    pub recruits_regions: [f64; REGIONS],
    pub recruits_sizes: DVector<f64>,
}

impl Biology {
    pub fn new(params: &Parameters) -> Result<Self, ModelError> {
        params.validate()?;

        let lengths = DVector::from_fn(SIZES, |size, _| length_at(size));
        let weights = lengths.map(|length| params.weight_a * length.powf(params.weight_b));
        let maturities = lengths.map(|length| {
            1.0 / (1.0
                + 19f64.powf((params.maturity_inflection - length) / params.maturity_steepness))
        });
        let mortality_rate = weights.map(|weight| {
            (params.mortality * weight.powf(params.mortality_weight_exponent))
                .min(params.mortality_max)
        });
        let mortality_survival = mortality_rate.map(|rate| (-0.25 * rate).exp());

        let growth_increments = lengths.map(|length| {
            (params.growth_asymptote - length) * (1.0 - (-0.25 * params.growth_rate).exp())
        });
        let growth = growth_matrix(&lengths, &growth_increments, params.growth_sd, params.growth_cv);

        let movement = DMatrix::from_fn(REGIONS, REGIONS, |from, to| {
            let total: f64 = params.movement_pars[from].iter().sum();
            params.movement_pars[from][to] / total
        });

        let mut selectivities = DMatrix::zeros(METHODS, SIZES);
        for (method, points) in params.selectivity_points.iter().enumerate() {
            let spline = MonotoneSpline::new(&SELECTIVITY_KNOTS, points)
                .map_err(|e| ModelError::invalid("selectivity_points", e.to_string()))?;
            for size in 0..SIZES {
                selectivities[(method, size)] = spline.interpolate(lengths[size]).clamp(0.0, 1.0);
            }
        }

        Ok(Self {
            lengths,
            weights,
            maturities,
            mortality_rate,
            mortality_survival,
            growth_increments,
            growth,
            movement,
            selectivities,
            spawning: params.spawning,
            recruits_regions: params.recruits_regions,
            recruits_sizes: DVector::from_column_slice(&params.recruits_sizes),
        })
    }
}

/// Integrates a normal growth kernel over each destination bin.
///
/// Bin boundaries are shared between neighbouring bins so each row telescopes
/// to the kernel mass inside `[0, SIZES * LENGTH_STEP)`.
fn growth_matrix(
    lengths: &DVector<f64>,
    increments: &DVector<f64>,
    growth_sd: f64,
    growth_cv: f64,
) -> DMatrix<f64> {
    let mut growth = DMatrix::zeros(SIZES, SIZES);
    let mut cdf = vec![0.0; SIZES + 1];
    for from in 0..SIZES {
        let increment = increments[from];
        let mean = lengths[from] + increment;
        let sd = (growth_sd.powi(2) + (increment * growth_cv).powi(2)).sqrt();

        let mut running = 0.0f64;
        for (edge, value) in cdf.iter_mut().enumerate() {
            running = running.max(normal_cdf(LENGTH_STEP * edge as f64, mean, sd));
            *value = running;
        }
        for size in 0..SIZES {
            growth[(from, size)] = cdf[size + 1] - cdf[size];
        }
    }
    growth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::Method;
    use proptest::prelude::*;

    fn default_biology() -> Biology {
        Biology::new(&Parameters::default()).expect("default biology")
    }

    #[test]
    fn test_length_weight_maturity() {
        let bio = default_biology();
        assert_eq!(bio.lengths[0], 1.0);
        assert_eq!(bio.lengths[SIZES - 1], 79.0);
        let expected = 5.32e-6 * 41f64.powf(3.35);
        assert!((bio.weights[20] - expected).abs() < 1e-12);
        // Maturity is one half at the inflection and 0.95 one steepness above.
        let p = Parameters::default();
        let at = |length: f64| 1.0 / (1.0 + 19f64.powf((p.maturity_inflection - length) / p.maturity_steepness));
        assert!((at(40.0) - 0.5).abs() < 1e-12);
        assert!((at(45.0) - 0.95).abs() < 1e-12);
        assert!((bio.maturities[22] - at(45.0)).abs() < 1e-12);
        assert!(bio.maturities.iter().zip(bio.maturities.iter().skip(1)).all(|(a, b)| a < b));
    }

    #[test]
    fn test_mortality_is_capped_at_small_sizes() {
        let bio = default_biology();
        let cap = -(0.01f64).ln();
        assert_eq!(bio.mortality_rate[0], cap);
        assert!(bio.mortality_rate[SIZES - 1] < cap);
        for size in 0..SIZES {
            let expected = (-0.25 * bio.mortality_rate[size]).exp();
            assert!((bio.mortality_survival[size] - expected).abs() < 1e-15);
        }
    }

    #[test]
    fn test_growth_worked_example() {
        let bio = default_biology();
        let increment = (75.0 - 1.0) * (1.0 - (-0.075f64).exp());
        assert!((bio.growth_increments[0] - increment).abs() < 1e-12);
        assert!((increment - 5.34).abs() < 0.01);
        let row = bio.growth.row(0);
        let (modal, _) = row
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        let expected_length = 1.0 + increment;
        let lower = LENGTH_STEP * modal as f64;
        assert!(
            expected_length >= lower && expected_length < lower + LENGTH_STEP,
            "expected length {} outside modal bin {}",
            expected_length,
            modal
        );
    }

    #[test]
    fn test_growth_rows_are_substochastic() {
        let bio = default_biology();
        for from in 0..SIZES {
            let row_sum: f64 = bio.growth.row(from).iter().sum();
            assert!(row_sum <= 1.0 + 1e-12);
            assert!(bio.growth.row(from).iter().all(|v| *v >= 0.0));
        }
        // Fish near the asymptote lose mass past the last bin only slightly.
        let last: f64 = bio.growth.row(SIZES - 1).iter().sum();
        assert!(last > 0.5 && last <= 1.0);
    }

    #[test]
    fn test_movement_rows_sum_to_one() {
        let bio = default_biology();
        for from in 0..REGIONS {
            let row_sum: f64 = bio.movement.row(from).iter().sum();
            assert!((row_sum - 1.0).abs() < 1e-12);
        }
        assert!((bio.movement[(0, 0)] - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_selectivity_follows_control_points() {
        let bio = default_biology();
        // Length 41 is just above the 40cm knot (0.3).
        let ps = bio.selectivities.row(Method::PS.index());
        assert!(ps[20] > 0.3 && ps[20] < 0.32);
        assert!(ps.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_selectivity_outside_unit_interval_is_clamped() {
        let mut params = Parameters::default();
        params.selectivity_points[Method::GN.index()] = [-0.2, 0.4, 1.4, 1.2, 0.6];
        let bio = Biology::new(&params).expect("biology");
        let gn = bio.selectivities.row(Method::GN.index());
        assert_eq!(gn[0], 0.0);
        assert!(gn.iter().any(|v| *v == 1.0));
        assert!(gn.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let mut params = Parameters::default();
        params.growth_sd = 0.0;
        assert!(Biology::new(&params).is_err());
    }

    proptest! {
        #[test]
        fn growth_and_movement_kernels_are_well_formed(
            rate in 0.05f64..2.0,
            asymptote in 40.0f64..120.0,
            sd in 0.1f64..5.0,
            cv in 0.0f64..0.5,
            affinities in proptest::collection::vec(0.01f64..10.0, REGIONS * REGIONS),
        ) {
            let mut params = Parameters::default();
            params.growth_rate = rate;
            params.growth_asymptote = asymptote;
            params.growth_sd = sd;
            params.growth_cv = cv;
            for from in 0..REGIONS {
                for to in 0..REGIONS {
                    params.movement_pars[from][to] = affinities[from * REGIONS + to];
                }
            }
            let bio = Biology::new(&params).expect("biology");
            for from in 0..SIZES {
                let row = bio.growth.row(from);
                prop_assert!(row.iter().all(|v| *v >= 0.0));
                prop_assert!(row.iter().sum::<f64>() <= 1.0 + 1e-12);
            }
            for from in 0..REGIONS {
                let total: f64 = bio.movement.row(from).iter().sum();
                prop_assert!((total - 1.0).abs() < 1e-12);
            }
        }
    }
}
