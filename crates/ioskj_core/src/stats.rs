//! Normal distribution helpers and recruitment deviations.

use crate::error::ModelError;
use rand::Rng;
use rand_distr::{Distribution, LogNormal};
use std::f64::consts::SQRT_2;

/// Complementary error function, Chebyshev fit with fractional error below
/// 1.2e-7 everywhere.
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * poly.exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

/// Cumulative distribution function of Normal(mean, sd).
pub fn normal_cdf(x: f64, mean: f64, sd: f64) -> f64 {
    0.5 * erfc(-(x - mean) / (sd * SQRT_2))
}

/// Probability mass of Normal(mean, sd) between `lower` and `upper`.
pub fn normal_integral(lower: f64, upper: f64, mean: f64, sd: f64) -> f64 {
    (normal_cdf(upper, mean, sd) - normal_cdf(lower, mean, sd)).max(0.0)
}

/// Multiplicative recruitment deviations with an arithmetic mean of one.
#[derive(Debug, Clone, Copy)]
pub struct RecruitmentDeviation {
    dist: Option<LogNormal<f64>>,
}

impl RecruitmentDeviation {
    pub fn new(sd: f64) -> Result<Self, ModelError> {
        if sd == 0.0 {
            return Ok(Self { dist: None });
        }
        let dist = LogNormal::new(-0.5 * sd * sd, sd)
            .map_err(|e| ModelError::invalid("recruits_sd", e.to_string()))?;
        Ok(Self { dist: Some(dist) })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.dist {
            Some(dist) => dist.sample(rng),
            None => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::recruitment_rng;

    #[test]
    fn test_erfc_known_values() {
        assert!((erfc(0.0) - 1.0).abs() < 1e-7);
        assert!((erfc(1.0) - 0.157_299_207).abs() < 1e-7);
        assert!((erfc(-1.0) - 1.842_700_793).abs() < 1e-7);
        assert!(erfc(6.0) < 1e-15);
    }

    #[test]
    fn test_normal_integral_symmetry() {
        let central = normal_integral(-1.0, 1.0, 0.0, 1.0);
        assert!((central - 0.682_689_49).abs() < 1e-6);
        let left = normal_integral(-3.0, 0.0, 0.0, 1.0);
        let right = normal_integral(0.0, 3.0, 0.0, 1.0);
        assert!((left - right).abs() < 1e-7);
        assert_eq!(normal_integral(1.0, -1.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_deviation_mean_is_one() {
        let deviation = RecruitmentDeviation::new(0.6).expect("valid sd");
        let mut rng = recruitment_rng(42);
        let n = 200_000;
        let mean = (0..n).map(|_| deviation.sample(&mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 1.0).abs() < 0.02, "mean deviation {mean}");
    }

    #[test]
    fn test_zero_sd_is_deterministic() {
        let deviation = RecruitmentDeviation::new(0.0).expect("valid sd");
        let mut rng = recruitment_rng(1);
        assert_eq!(deviation.sample(&mut rng), 1.0);
    }
}
