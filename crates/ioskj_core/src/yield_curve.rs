//! Equilibrium yield curves and the maximum sustainable yield.
//!
//! Both operate on a private copy of an initialised model so the caller's
//! trajectory is left untouched. Successive equilibria start from the previous
//! one, which keeps the number of simulated years per rate small.

use crate::dimensions::QUARTERS;
use crate::error::ModelError;
use crate::model::{Exploitation, Model};
use crate::params::{EquilibriumSettings, MsySettings};
use crate::tracking::{NoTracking, TrackSink};
use serde::{Deserialize, Serialize};

/// Equilibrium outcome of fishing every gear at one exploitation rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldPoint {
    pub exploitation_rate: f64,
    /// Instantaneous equivalent, `-ln(1 - exploitation_rate)`.
    pub fishing_mortality: f64,
    /// Catch over a year at equilibrium.
    pub annual_yield: f64,
    /// Spawning biomass averaged over the quarters of a year.
    pub biomass_spawning: f64,
    /// `biomass_spawning` relative to its unfished value.
    pub status: f64,
}

/// Maximum sustainable yield reference points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Msy {
    pub e_msy: f64,
    pub f_msy: f64,
    pub msy: f64,
    pub biomass_spawning_msy: f64,
    /// Number of equilibria evaluated during the search.
    pub trials: usize,
}

/// Default sweep of exploitation rates: 0, 0.05, ..., 0.95.
pub fn default_rates() -> Vec<f64> {
    (0..20).map(|i| i as f64 * 0.05).collect()
}

fn fishing_mortality(rate: f64) -> f64 {
    -(1.0 - rate).ln()
}

fn mean(values: &[f64; QUARTERS]) -> f64 {
    values.iter().sum::<f64>() / QUARTERS as f64
}

impl<T: TrackSink> Model<T> {
    /// Catch over the most recent four quarters.
    pub fn annual_yield(&self) -> f64 {
        self.catch_taken().iter().sum()
    }

    /// Yield curve over the default sweep of exploitation rates.
    pub fn yield_curve(&self) -> Result<YieldCurve, ModelError> {
        self.yield_curve_with(default_rates(), EquilibriumSettings::default())
    }

    pub fn yield_curve_with(
        &self,
        rates: Vec<f64>,
        settings: EquilibriumSettings,
    ) -> Result<YieldCurve, ModelError> {
        if !self.is_initialised() {
            return Err(ModelError::Uninitialised);
        }
        if let Some(rate) = rates.iter().find(|r| !(0.0..1.0).contains(*r)) {
            return Err(ModelError::invalid(
                "exploitation_rate",
                format!("{} is outside [0, 1)", rate),
            ));
        }
        Ok(YieldCurve {
            base: self.fork_with(NoTracking),
            rates,
            settings,
        })
    }

    /// Finds MSY with default settings and stores it on the model.
    pub fn msy_find(&mut self) -> Result<Msy, ModelError> {
        self.msy_find_with(MsySettings::default())
    }

    pub fn msy_find_with(&mut self, settings: MsySettings) -> Result<Msy, ModelError> {
        let msy = self.msy_search(settings)?;
        self.set_msy(msy);
        Ok(msy)
    }

    /// Golden-section search for the exploitation rate maximising
    /// equilibrium yield.
    pub fn msy_search(&self, settings: MsySettings) -> Result<Msy, ModelError> {
        if !self.is_initialised() {
            return Err(ModelError::Uninitialised);
        }
        if !(settings.lower >= 0.0 && settings.lower < settings.upper && settings.upper < 1.0) {
            return Err(ModelError::invalid(
                "msy bounds",
                format!(
                    "need 0 <= lower < upper < 1, got [{}, {}]",
                    settings.lower, settings.upper
                ),
            ));
        }
        if !(settings.tolerance > 0.0) || settings.max_trials < 2 {
            return Err(ModelError::invalid(
                "msy settings",
                "tolerance must be positive and at least two trials allowed",
            ));
        }

        let mut probe = YieldProbe::new(self.fork_with(NoTracking), settings.equilibrium);
        let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
        let (mut a, mut b) = (settings.lower, settings.upper);
        let mut c = b - inv_phi * (b - a);
        let mut d = a + inv_phi * (b - a);
        let mut fc = probe.evaluate(c)?;
        let mut fd = probe.evaluate(d)?;

        while b - a > settings.tolerance && probe.trials < settings.max_trials {
            if fc.annual_yield >= fd.annual_yield {
                b = d;
                d = c;
                fd = fc;
                c = b - inv_phi * (b - a);
                fc = probe.evaluate(c)?;
            } else {
                a = c;
                c = d;
                fc = fd;
                d = a + inv_phi * (b - a);
                fd = probe.evaluate(d)?;
            }
        }

        let best = if fc.annual_yield >= fd.annual_yield { fc } else { fd };
        let msy = Msy {
            e_msy: best.exploitation_rate,
            f_msy: best.fishing_mortality,
            msy: best.annual_yield,
            biomass_spawning_msy: best.biomass_spawning,
            trials: probe.trials,
        };
        tracing::info!(
            e_msy = msy.e_msy,
            msy = msy.msy,
            biomass_spawning_msy = msy.biomass_spawning_msy,
            trials = msy.trials,
            "msy found"
        );
        Ok(msy)
    }
}

/// Evaluates equilibria on a scratch model, counting each evaluation.
struct YieldProbe {
    model: Model<NoTracking>,
    settings: EquilibriumSettings,
    trials: usize,
}

impl YieldProbe {
    fn new(model: Model<NoTracking>, settings: EquilibriumSettings) -> Self {
        Self {
            model,
            settings,
            trials: 0,
        }
    }

    fn evaluate(&mut self, rate: f64) -> Result<YieldPoint, ModelError> {
        self.model.set_exploitation(Exploitation::Rate(rate))?;
        self.model.equilibrium(self.settings)?;
        self.trials += 1;
        let biomass_spawning = mean(self.model.biomass_spawning_overall());
        Ok(YieldPoint {
            exploitation_rate: rate,
            fishing_mortality: fishing_mortality(rate),
            annual_yield: self.model.annual_yield(),
            biomass_spawning,
            status: biomass_spawning / mean(self.model.biomass_spawning_unfished()),
        })
    }
}

/// A sweep of equilibrium yields. Iterating is lazy and every call to
/// [`YieldCurve::iter`] starts again from the model it was created from.
#[derive(Debug, Clone)]
pub struct YieldCurve {
    base: Model<NoTracking>,
    rates: Vec<f64>,
    settings: EquilibriumSettings,
}

impl YieldCurve {
    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn iter(&self) -> YieldCurveIter<'_> {
        YieldCurveIter {
            rates: self.rates.iter(),
            probe: YieldProbe::new(self.base.fork(), self.settings),
        }
    }
}

impl<'a> IntoIterator for &'a YieldCurve {
    type Item = Result<YieldPoint, ModelError>;
    type IntoIter = YieldCurveIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct YieldCurveIter<'a> {
    rates: std::slice::Iter<'a, f64>,
    probe: YieldProbe,
}

impl Iterator for YieldCurveIter<'_> {
    type Item = Result<YieldPoint, ModelError>;

    fn next(&mut self) -> Option<Self::Item> {
        let rate = *self.rates.next()?;
        Some(self.probe.evaluate(rate))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rates.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;

    fn initialised() -> Model {
        let mut model = Model::new(Parameters::default()).expect("model");
        model.init().expect("init");
        model
    }

    #[test]
    fn test_requires_initialised_model() {
        let model = Model::new(Parameters::default()).expect("model");
        assert!(matches!(model.yield_curve(), Err(ModelError::Uninitialised)));
        assert!(matches!(
            model.msy_search(MsySettings::default()),
            Err(ModelError::Uninitialised)
        ));
    }

    #[test]
    fn test_yield_curve_shape() {
        let model = initialised();
        let curve = model
            .yield_curve_with(vec![0.0, 0.5, 0.7, 0.9], EquilibriumSettings::default())
            .expect("curve");
        let points: Vec<YieldPoint> = curve.iter().collect::<Result<_, _>>().expect("points");
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].annual_yield, 0.0);
        assert!((points[0].status - 1.0).abs() < 1e-3);
        assert!(points[1].annual_yield > 0.0);
        for pair in points.windows(2) {
            assert!(pair[1].biomass_spawning < pair[0].biomass_spawning);
        }
        assert!((points[1].fishing_mortality - fishing_mortality(0.5)).abs() < 1e-15);
    }

    #[test]
    fn test_yield_curve_is_restartable_and_leaves_model_untouched() {
        let model = initialised();
        let before = model.numbers().clone();
        let curve = model
            .yield_curve_with(vec![0.2, 0.4], EquilibriumSettings::default())
            .expect("curve");
        let first: Vec<_> = curve.iter().map(|p| p.expect("point")).collect();
        let second: Vec<_> = (&curve).into_iter().map(|p| p.expect("point")).collect();
        assert_eq!(first, second);
        assert_eq!(model.numbers(), &before);
        assert_eq!(curve.rates(), &[0.2, 0.4]);
    }

    #[test]
    fn test_yield_curve_is_lazy() {
        let model = initialised();
        let curve = model.yield_curve().expect("curve");
        let mut iter = curve.iter();
        assert_eq!(iter.size_hint(), (20, Some(20)));
        let first = iter.next().expect("some").expect("point");
        assert_eq!(first.exploitation_rate, 0.0);
        assert_eq!(iter.size_hint(), (19, Some(19)));
    }

    #[test]
    fn test_rejects_rates_outside_unit_interval() {
        let model = initialised();
        assert!(model
            .yield_curve_with(vec![0.1, 1.0], EquilibriumSettings::default())
            .is_err());
        let bad = MsySettings {
            lower: 0.5,
            upper: 0.2,
            ..MsySettings::default()
        };
        assert!(model.msy_search(bad).is_err());
    }

    #[test]
    fn test_msy_properties() {
        let mut model = initialised();
        let settings = MsySettings {
            tolerance: 1e-2,
            ..MsySettings::default()
        };
        let msy = model.msy_search(settings).expect("msy");
        assert!(msy.e_msy >= 0.0 && msy.e_msy < 1.0);
        assert!(msy.msy > 0.0);
        assert!((msy.f_msy - fishing_mortality(msy.e_msy)).abs() < 1e-15);
        let unfished = mean(model.biomass_spawning_unfished());
        assert!(msy.biomass_spawning_msy < unfished);
        assert!(msy.trials >= 2 && msy.trials <= settings.max_trials);

        // Yield at MSY is at least that of nearby rates on the curve.
        let curve = model
            .yield_curve_with(
                vec![(msy.e_msy - 0.1).max(0.0), (msy.e_msy + 0.1).min(0.98)],
                EquilibriumSettings::default(),
            )
            .expect("curve");
        for point in &curve {
            let point = point.expect("point");
            assert!(point.annual_yield <= msy.msy * (1.0 + 1e-3));
        }

        assert!(model.msy().is_none());
        model.set_msy(msy);
        assert_eq!(model.msy(), Some(&msy));
    }

    #[test]
    fn test_trial_budget_limits_search() {
        let model = initialised();
        let settings = MsySettings {
            tolerance: 1e-9,
            max_trials: 6,
            ..MsySettings::default()
        };
        let msy = model.msy_search(settings).expect("msy");
        assert_eq!(msy.trials, 6);
    }
}
