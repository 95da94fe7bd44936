//! Age, size and region structured population model.
//!
//! The only carried state is `numbers[region, age, size]`. Each call to
//! [`Model::quarter`] aggregates biomass, recruits a new cohort, ages the
//! population and applies mortality, exploitation, growth and movement as a
//! single linear map over the size and region axes.

use crate::biology::Biology;
use crate::dimensions::{self, Method, Region, AGES, METHODS, QUARTERS, REGIONS, SIZES};
use crate::error::{ExploitationAnomaly, ModelError};
use crate::params::{EquilibriumSettings, GearCombination, Parameters, RecruitsCurve};
use crate::stats::RecruitmentDeviation;
use crate::tensor::Tensor;
use crate::tracking::{NoTracking, TrackRecord, TrackSink};
use crate::yield_curve::Msy;
use nalgebra::DMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How exploitation rates are determined each quarter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Exploitation {
    /// No fishing.
    Off,
    /// Rates derived from the catches set for the quarter.
    Catches,
    /// Every region and method fished at the given rate.
    Rate(f64),
}

/// Outcome of a simulated quarter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuarterReport {
    pub anomalies: Vec<ExploitationAnomaly>,
}

impl QuarterReport {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn merge(&mut self, other: QuarterReport) {
        self.anomalies.extend(other.anomalies);
    }

    pub fn into_result(self) -> Result<(), ModelError> {
        if self.anomalies.is_empty() {
            Ok(())
        } else {
            Err(ModelError::ExploitationAnomaly(self.anomalies))
        }
    }
}

/// Scratch matrices for the size/region transition.
#[derive(Debug, Clone)]
struct Workspace {
    movement_t: DMatrix<f64>,
    survivors: DMatrix<f64>,
    moved: DMatrix<f64>,
    grown: DMatrix<f64>,
}

impl Workspace {
    fn new(biology: &Biology) -> Self {
        Self {
            movement_t: biology.movement.transpose(),
            survivors: DMatrix::zeros(REGIONS, SIZES),
            moved: DMatrix::zeros(REGIONS, SIZES),
            grown: DMatrix::zeros(REGIONS, SIZES),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Model<T: TrackSink = NoTracking> {
    params: Parameters,
    biology: Biology,
    deviation: RecruitmentDeviation,

    numbers: Tensor<3>,

    biomass: [f64; REGIONS],
    biomass_spawning: [f64; REGIONS],
    biomass_spawning_overall: [f64; QUARTERS],
    biomass_spawning_unfished: [f64; QUARTERS],

    recruits_determ: f64,
    recruits_deviation: f64,
    recruits: f64,
    pub(crate) recruits_relation_on: bool,
    pub(crate) recruits_variation_on: bool,

    exploitation: Exploitation,
    catches: Tensor<2>,
    biomass_vulnerable: Tensor<2>,
    exploitation_rate: Tensor<2>,
    exploitation_survival: Tensor<2>,
    catch_taken: [f64; QUARTERS],

    initialised: bool,
    msy: Option<Msy>,

    work: Workspace,
    tracker: T,
}

impl Model<NoTracking> {
    /// Builds the rate tables for `params`. The population is empty until
    /// [`Model::init`] is called.
    pub fn new(params: Parameters) -> Result<Self, ModelError> {
        Self::with_tracker(params, NoTracking)
    }
}

impl<T: TrackSink> Model<T> {
    pub fn with_tracker(params: Parameters, tracker: T) -> Result<Self, ModelError> {
        let biology = Biology::new(&params)?;
        let deviation = RecruitmentDeviation::new(params.recruits_sd)?;
        let work = Workspace::new(&biology);
        Ok(Self {
            params,
            biology,
            deviation,
            numbers: Tensor::zeros([REGIONS, AGES, SIZES]),
            biomass: [0.0; REGIONS],
            biomass_spawning: [0.0; REGIONS],
            biomass_spawning_overall: [0.0; QUARTERS],
            biomass_spawning_unfished: [0.0; QUARTERS],
            recruits_determ: 0.0,
            recruits_deviation: 1.0,
            recruits: 0.0,
            recruits_relation_on: true,
            recruits_variation_on: true,
            exploitation: Exploitation::Catches,
            catches: Tensor::zeros([REGIONS, METHODS]),
            biomass_vulnerable: Tensor::zeros([REGIONS, METHODS]),
            exploitation_rate: Tensor::zeros([REGIONS, METHODS]),
            exploitation_survival: Tensor::filled([REGIONS, SIZES], 1.0),
            catch_taken: [0.0; QUARTERS],
            initialised: false,
            msy: None,
            work,
            tracker,
        })
    }

    /// Brings the population to its unfished equilibrium and fixes the
    /// unfished spawning biomass for each quarter.
    pub fn init(&mut self) -> Result<(), ModelError> {
        self.init_with(EquilibriumSettings::default())
    }

    pub fn init_with(&mut self, settings: EquilibriumSettings) -> Result<(), ModelError> {
        self.initialised = false;
        self.msy = None;
        self.biomass_spawning_unfished = [0.0; QUARTERS];
        self.numbers.fill(0.0);
        let exploitation = self.exploitation;
        self.recruits_relation_on = false;
        self.exploitation = Exploitation::Off;

        let result = self.equilibrium(settings);

        self.recruits_relation_on = true;
        self.exploitation = exploitation;
        let report = result?;

        self.biomass_spawning_unfished = self.biomass_spawning_overall;
        self.initialised = true;
        tracing::info!(
            years = report.years,
            biomass = self.biomass_total(),
            biomass_spawning_unfished = ?self.biomass_spawning_unfished,
            "unfished equilibrium reached"
        );
        Ok(())
    }

    /// Simulates one quarter, drawing any recruitment deviation from `rng`.
    pub fn quarter<R: Rng + ?Sized>(
        &mut self,
        year: u32,
        quarter: usize,
        rng: &mut R,
    ) -> Result<QuarterReport, ModelError> {
        if quarter >= QUARTERS {
            return Err(ModelError::invalid(
                "quarter",
                format!("{} is not a quarter index", quarter),
            ));
        }
        if self.recruits_relation_on && !self.initialised {
            return Err(ModelError::Uninitialised);
        }
        let deviation = if self.recruits_variation_on {
            self.deviation.sample(rng)
        } else {
            1.0
        };
        let report = self.step(quarter, deviation);
        self.tracker.record(&TrackRecord {
            year,
            quarter,
            recruits_determ: self.recruits_determ,
            recruits_deviation: self.recruits_deviation,
            recruits: self.recruits,
            biomass_spawning_overall: self.biomass_spawning_overall[quarter],
            biomass_spawning: self.biomass_spawning,
        });
        Ok(report)
    }

    /// Simulates the quarter corresponding to a time step index.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        time: usize,
        rng: &mut R,
    ) -> Result<QuarterReport, ModelError> {
        self.quarter(dimensions::year(time), dimensions::quarter(time), rng)
    }

    pub fn year<R: Rng + ?Sized>(&mut self, year: u32, rng: &mut R) -> Result<QuarterReport, ModelError> {
        let mut report = QuarterReport::default();
        for quarter in 0..QUARTERS {
            report.merge(self.quarter(year, quarter, rng)?);
        }
        Ok(report)
    }

    /// Simulates the years in `begin..end`.
    pub fn years<R: Rng + ?Sized>(
        &mut self,
        begin: u32,
        end: u32,
        rng: &mut R,
    ) -> Result<QuarterReport, ModelError> {
        let mut report = QuarterReport::default();
        for year in begin..end {
            report.merge(self.year(year, rng)?);
        }
        Ok(report)
    }

    pub(crate) fn step(&mut self, quarter: usize, deviation: f64) -> QuarterReport {
        let bio = &self.biology;

        // Biomass by region, summed over ages
        let by_region_size = self.numbers.aggregate([0, 2]);
        for region in 0..REGIONS {
            let mut biomass = 0.0;
            let mut spawning = 0.0;
            for size in 0..SIZES {
                let b = by_region_size[[region, size]] * bio.weights[size];
                biomass += b;
                spawning += b * bio.maturities[size] * bio.spawning[quarter];
            }
            self.biomass[region] = biomass;
            self.biomass_spawning[region] = spawning;
        }
        self.biomass_spawning_overall[quarter] = self.biomass_spawning.iter().sum();

        // Recruitment
        self.recruits_determ = if self.recruits_relation_on {
            recruits_relation(
                &self.params,
                self.biomass_spawning_overall[quarter],
                self.biomass_spawning_unfished[quarter],
            )
        } else {
            self.params.recruits_unfished
        };
        self.recruits_deviation = deviation;
        self.recruits = self.recruits_determ * deviation;

        // Ageing: the plus-group keeps its survivors and gains the next oldest
        for region in 0..REGIONS {
            for size in 0..SIZES {
                self.numbers[[region, AGES - 1, size]] += self.numbers[[region, AGES - 2, size]];
                for age in (1..AGES - 1).rev() {
                    self.numbers[[region, age, size]] = self.numbers[[region, age - 1, size]];
                }
                self.numbers[[region, 0, size]] =
                    self.recruits * bio.recruits_regions[region] * bio.recruits_sizes[size];
            }
        }

        let report = self.exploit(quarter);

        // Mortality, growth and movement for each age
        let bio = &self.biology;
        let work = &mut self.work;
        for age in 0..AGES {
            for region in 0..REGIONS {
                for size in 0..SIZES {
                    work.survivors[(region, size)] = self.numbers[[region, age, size]]
                        * bio.mortality_survival[size]
                        * self.exploitation_survival[[region, size]];
                }
            }
            work.movement_t.mul_to(&work.survivors, &mut work.moved);
            work.moved.mul_to(&bio.growth, &mut work.grown);
            for region in 0..REGIONS {
                for size in 0..SIZES {
                    self.numbers[[region, age, size]] = work.grown[(region, size)];
                }
            }
        }

        report
    }

    /// Vulnerable biomass, exploitation rates and survival for the quarter.
    fn exploit(&mut self, quarter: usize) -> QuarterReport {
        let bio = &self.biology;
        let mut report = QuarterReport::default();

        let by_region_size = self.numbers.aggregate([0, 2]);
        self.biomass_vulnerable.assign_with(|[region, method]| {
            (0..SIZES)
                .map(|size| {
                    by_region_size[[region, size]]
                        * bio.weights[size]
                        * bio.selectivities[(method, size)]
                })
                .sum::<f64>()
        });

        match self.exploitation {
            Exploitation::Off => self.exploitation_rate.fill(0.0),
            Exploitation::Rate(rate) => self.exploitation_rate.fill(rate),
            Exploitation::Catches => {
                let rate_max = self.params.exploitation_rate_max;
                for region in Region::ALL {
                    for method in Method::ALL {
                        let index = [region.index(), method.index()];
                        let catch = self.catches[index];
                        let vulnerable = self.biomass_vulnerable[index];
                        let implied = catch / vulnerable;
                        let rate = if catch <= 0.0 {
                            0.0
                        } else if vulnerable > 0.0 && implied <= rate_max {
                            implied
                        } else {
                            tracing::warn!(
                                ?region,
                                ?method,
                                catch,
                                vulnerable,
                                implied,
                                "catch exceeds vulnerable biomass; exploitation rate clamped"
                            );
                            report.anomalies.push(ExploitationAnomaly {
                                region,
                                method,
                                catch,
                                biomass_vulnerable: vulnerable,
                                implied_rate: implied,
                                rate_applied: rate_max,
                            });
                            rate_max
                        };
                        self.exploitation_rate[index] = rate;
                    }
                }
            }
        }

        let rates = &self.exploitation_rate;
        let combination = self.params.gear_combination;
        self.exploitation_survival.assign_with(|[region, size]| {
            let removal = |method: usize| rates[[region, method]] * bio.selectivities[(method, size)];
            let survival = match combination {
                GearCombination::JointRate => 1.0 - (0..METHODS).map(removal).product::<f64>(),
                GearCombination::IndependentGears => {
                    (0..METHODS).map(|method| 1.0 - removal(method)).product::<f64>()
                }
            };
            survival.clamp(0.0, 1.0)
        });

        self.catch_taken[quarter] = self
            .exploitation_rate
            .iter()
            .map(|(index, rate)| rate * self.biomass_vulnerable[index])
            .sum();

        report
    }

    /// Fishes every region and method at `rate` instead of using catches.
    pub fn set_exploitation_rate(&mut self, rate: f64) -> Result<(), ModelError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ModelError::invalid(
                "exploitation_rate",
                format!("{} is outside [0, 1]", rate),
            ));
        }
        self.exploitation = Exploitation::Rate(rate);
        Ok(())
    }

    pub fn set_exploitation(&mut self, exploitation: Exploitation) -> Result<(), ModelError> {
        match exploitation {
            Exploitation::Rate(rate) => self.set_exploitation_rate(rate),
            other => {
                self.exploitation = other;
                Ok(())
            }
        }
    }

    pub fn exploitation(&self) -> Exploitation {
        self.exploitation
    }

    /// Sets the catch to be taken by `method` in `region` in coming quarters.
    pub fn set_catch(&mut self, region: Region, method: Method, catch: f64) -> Result<(), ModelError> {
        if !catch.is_finite() || catch < 0.0 {
            return Err(ModelError::invalid(
                "catches",
                format!("{} is not a valid catch", catch),
            ));
        }
        self.catches[[region.index(), method.index()]] = catch;
        Ok(())
    }

    pub fn clear_catches(&mut self) {
        self.catches.fill(0.0);
    }

    pub fn set_recruits_relation(&mut self, on: bool) {
        self.recruits_relation_on = on;
    }

    pub fn set_recruits_variation(&mut self, on: bool) {
        self.recruits_variation_on = on;
    }

    /// An independent copy of the whole model, tracker included.
    pub fn fork(&self) -> Model<T>
    where
        T: Clone,
    {
        self.clone()
    }

    /// An independent copy of the model state reporting to a new tracker.
    pub fn fork_with<U: TrackSink>(&self, tracker: U) -> Model<U> {
        Model {
            params: self.params.clone(),
            biology: self.biology.clone(),
            deviation: self.deviation,
            numbers: self.numbers.clone(),
            biomass: self.biomass,
            biomass_spawning: self.biomass_spawning,
            biomass_spawning_overall: self.biomass_spawning_overall,
            biomass_spawning_unfished: self.biomass_spawning_unfished,
            recruits_determ: self.recruits_determ,
            recruits_deviation: self.recruits_deviation,
            recruits: self.recruits,
            recruits_relation_on: self.recruits_relation_on,
            recruits_variation_on: self.recruits_variation_on,
            exploitation: self.exploitation,
            catches: self.catches.clone(),
            biomass_vulnerable: self.biomass_vulnerable.clone(),
            exploitation_rate: self.exploitation_rate.clone(),
            exploitation_survival: self.exploitation_survival.clone(),
            catch_taken: self.catch_taken,
            initialised: self.initialised,
            msy: self.msy,
            work: self.work.clone(),
            tracker,
        }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn biology(&self) -> &Biology {
        &self.biology
    }

    pub fn numbers(&self) -> &Tensor<3> {
        &self.numbers
    }

    pub fn biomass(&self) -> &[f64; REGIONS] {
        &self.biomass
    }

    pub fn biomass_total(&self) -> f64 {
        self.biomass.iter().sum()
    }

    pub fn biomass_spawning(&self) -> &[f64; REGIONS] {
        &self.biomass_spawning
    }

    pub fn biomass_spawning_overall(&self) -> &[f64; QUARTERS] {
        &self.biomass_spawning_overall
    }

    pub fn biomass_spawning_unfished(&self) -> &[f64; QUARTERS] {
        &self.biomass_spawning_unfished
    }

    /// Spawning biomass relative to unfished in the same quarter. `None`
    /// before [`Model::init`] and for quarters without spawning.
    pub fn stock_status(&self, quarter: usize) -> Option<f64> {
        let unfished = *self.biomass_spawning_unfished.get(quarter)?;
        if !self.initialised || unfished <= 0.0 {
            return None;
        }
        Some(self.biomass_spawning_overall[quarter] / unfished)
    }

    pub fn biomass_vulnerable(&self) -> &Tensor<2> {
        &self.biomass_vulnerable
    }

    pub fn catches(&self) -> &Tensor<2> {
        &self.catches
    }

    pub fn exploitation_rate(&self) -> &Tensor<2> {
        &self.exploitation_rate
    }

    pub fn exploitation_survival(&self) -> &Tensor<2> {
        &self.exploitation_survival
    }

    /// Catch taken in each of the most recent quarters, `Σ rate · vulnerable`.
    pub fn catch_taken(&self) -> &[f64; QUARTERS] {
        &self.catch_taken
    }

    pub fn recruits(&self) -> f64 {
        self.recruits
    }

    pub fn recruits_determ(&self) -> f64 {
        self.recruits_determ
    }

    pub fn recruits_deviation(&self) -> f64 {
        self.recruits_deviation
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub fn msy(&self) -> Option<&Msy> {
        self.msy.as_ref()
    }

    pub(crate) fn set_msy(&mut self, msy: Msy) {
        self.msy = Some(msy);
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }
}

/// Deterministic recruits for spawning biomass `current`. A quarter without
/// unfished spawning biomass recruits at the unfished level.
fn recruits_relation(params: &Parameters, current: f64, unfished: f64) -> f64 {
    let r0 = params.recruits_unfished;
    if unfished <= 0.0 {
        return r0;
    }
    let h = params.recruits_steepness;
    let denominator = (5.0 * h - 1.0) * current + unfished * (1.0 - h);
    // Only reachable with h = 1 and an empty stock.
    if denominator <= 0.0 {
        return r0;
    }
    let numerator = match params.recruits_curve {
        RecruitsCurve::Ioskj => unfished,
        RecruitsCurve::BevertonHolt => current,
    };
    4.0 * h * r0 * numerator / denominator
}
