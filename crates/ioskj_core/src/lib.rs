pub mod biology;
pub mod dimensions;
pub mod equilibrium;
pub mod error;
pub mod model;
pub mod params;
pub mod rng;
pub mod spline;
pub mod stats;
pub mod tensor;
pub mod tracking;
/// The `ioskj_core` crate is the population dynamics engine of the Indian Ocean
/// skipjack management strategy evaluation.
///
/// Key components:
/// - **Dimensions / Tensor**: fixed region, age, size, quarter and method axes and a dense
///   multi-axis array over them.
/// - **Biology**: size-based rate tables (weight, maturity, mortality, growth, movement,
///   selectivity) derived from scalar parameters.
/// - **Model**: the quarterly transition of `numbers[region, age, size]`.
/// - **Equilibrium / Yield curve**: deterministic equilibria, yield curves and MSY.
pub mod yield_curve;

pub use error::{ExploitationAnomaly, ModelError};
pub use model::{Exploitation, Model, QuarterReport};
pub use params::{EquilibriumSettings, GearCombination, MsySettings, Parameters, RecruitsCurve};
