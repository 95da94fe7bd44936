use crate::dimensions::{QUARTERS, REGIONS};
use crate::error::ModelError;
use crate::model::Model;
use crate::params::EquilibriumSettings;
use crate::tracking::TrackSink;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumReport {
    /// Years simulated, including the final one.
    pub years: usize,
    /// Summed relative change in regional biomass over the final year.
    pub change: f64,
}

impl<T: TrackSink> Model<T> {
    /// Iterates whole years with deterministic recruitment until regional
    /// biomass stops changing. Exploitation and the stock-recruitment relation
    /// are used as currently configured; quarters are not tracked.
    pub fn equilibrium(
        &mut self,
        settings: EquilibriumSettings,
    ) -> Result<EquilibriumReport, ModelError> {
        if settings.max_years == 0 {
            return Err(ModelError::invalid(
                "max_years",
                "must be greater than zero",
            ));
        }
        if !(settings.tolerance > 0.0) {
            return Err(ModelError::invalid("tolerance", "must be positive"));
        }
        if self.recruits_relation_on && !self.is_initialised() {
            return Err(ModelError::Uninitialised);
        }

        let variation = self.recruits_variation_on;
        self.recruits_variation_on = false;
        let result = self.iterate_years(settings);
        self.recruits_variation_on = variation;

        match &result {
            Ok(report) => tracing::debug!(
                years = report.years,
                change = report.change,
                exploitation = ?self.exploitation(),
                "equilibrium reached"
            ),
            Err(err) => tracing::error!(%err, "equilibrium failed"),
        }
        result
    }

    fn iterate_years(
        &mut self,
        settings: EquilibriumSettings,
    ) -> Result<EquilibriumReport, ModelError> {
        let mut previous = [1.0; REGIONS];
        let mut change = f64::INFINITY;
        for years in 1..=settings.max_years {
            for quarter in 0..QUARTERS {
                self.step(quarter, 1.0);
            }

            let current = *self.biomass();
            change = current
                .iter()
                .zip(previous.iter())
                .map(|(now, before)| relative_change(*now, *before))
                .sum();
            if change < settings.tolerance {
                return Ok(EquilibriumReport { years, change });
            }
            previous = current;
        }
        Err(ModelError::EquilibriumNotConverged {
            years: settings.max_years,
            change,
        })
    }
}

/// Relative change, treating a region that stays empty as unchanged.
fn relative_change(now: f64, before: f64) -> f64 {
    if before == 0.0 {
        if now == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        (now - before).abs() / before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Exploitation;
    use crate::params::Parameters;

    #[test]
    fn test_relative_change_handles_empty_regions() {
        assert_eq!(relative_change(0.0, 0.0), 0.0);
        assert!(relative_change(1.0, 0.0).is_infinite());
        assert!((relative_change(1.1, 1.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let mut model = Model::new(Parameters::default()).expect("model");
        model.set_recruits_relation(false);
        let zero_years = EquilibriumSettings {
            max_years: 0,
            ..EquilibriumSettings::default()
        };
        assert!(model.equilibrium(zero_years).is_err());
        let bad_tolerance = EquilibriumSettings {
            tolerance: 0.0,
            ..EquilibriumSettings::default()
        };
        assert!(model.equilibrium(bad_tolerance).is_err());
    }

    #[test]
    fn test_iteration_cap_is_fatal() {
        let mut model = Model::new(Parameters::default()).expect("model");
        let settings = EquilibriumSettings {
            max_years: 3,
            tolerance: 1e-4,
        };
        let err = model.init_with(settings).expect_err("too few years");
        match err {
            ModelError::EquilibriumNotConverged { years, change } => {
                assert_eq!(years, 3);
                assert!(change > 1e-4);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!model.is_initialised());
    }

    #[test]
    fn test_restores_recruitment_variation() {
        let mut model = Model::new(Parameters::default()).expect("model");
        model.init().expect("init");
        assert!(model.recruits_variation_on);
        model.set_recruits_variation(false);
        model.set_exploitation(Exploitation::Off).expect("off");
        model.equilibrium(EquilibriumSettings::default()).expect("equilibrium");
        assert!(!model.recruits_variation_on);
    }

    #[test]
    fn test_fished_equilibrium_is_below_unfished() {
        let mut model = Model::new(Parameters::default()).expect("model");
        model.init().expect("init");
        let unfished = model.biomass_total();
        model.set_exploitation_rate(0.6).expect("rate");
        let report = model
            .equilibrium(EquilibriumSettings::default())
            .expect("fished equilibrium");
        assert!(report.years >= 1);
        assert!(report.change < 1e-4);
        assert!(model.biomass_total() < unfished);
        assert!(model.numbers().is_finite());
        for quarter in 0..QUARTERS {
            assert!(model.stock_status(quarter).expect("status") < 1.0);
        }
    }

    #[test]
    fn test_unfished_equilibrium_is_a_fixed_point() {
        let mut model = Model::new(Parameters::default()).expect("model");
        model.init().expect("init");
        model.set_exploitation(Exploitation::Off).expect("off");
        let before = model.biomass_total();
        let report = model
            .equilibrium(EquilibriumSettings::default())
            .expect("equilibrium");
        // Already at equilibrium, so the first year is within tolerance.
        assert_eq!(report.years, 2);
        assert!((model.biomass_total() - before).abs() / before < 1e-3);
    }
}
