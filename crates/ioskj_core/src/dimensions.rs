//! Fixed index sets for the model axes.
//!
//! Every array in the engine is indexed by some combination of these sets.
//! Regions and methods are small named enumerations; ages, sizes and quarters
//! are plain `usize` indices bounded by the constants below.

use serde::{Deserialize, Serialize};

pub const REGIONS: usize = 3;
pub const METHODS: usize = 5;
/// Quarterly age classes. The last class is a plus-group.
pub const AGES: usize = 24;
pub const SIZES: usize = 40;
pub const QUARTERS: usize = 4;

/// Width of a size bin in length units (cm).
pub const LENGTH_STEP: f64 = 2.0;

/// Lengths at which selectivity control points are specified.
pub const SELECTIVITY_KNOTS: [f64; 5] = [0.0, 20.0, 40.0, 60.0, 80.0];

/// First calendar year represented by time step zero.
pub const YEAR_START: u32 = 1950;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    W,
    M,
    E,
}

impl Region {
    pub const ALL: [Region; REGIONS] = [Region::W, Region::M, Region::E];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Region> {
        Self::ALL.get(index).copied()
    }
}

/// Fishing gear type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Purse seine
    PS,
    /// Pole and line
    PL,
    /// Gillnet
    GN,
    /// Line
    LI,
    /// Other
    OT,
}

impl Method {
    pub const ALL: [Method; METHODS] = [Method::PS, Method::PL, Method::GN, Method::LI, Method::OT];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Method> {
        Self::ALL.get(index).copied()
    }
}

/// Mid-point length of size bin `size`.
pub fn length_at(size: usize) -> f64 {
    LENGTH_STEP * size as f64 + 1.0
}

/// Time step index for a calendar year and quarter.
pub fn time(year: u32, quarter: usize) -> usize {
    (year.saturating_sub(YEAR_START) as usize) * QUARTERS + quarter
}

pub fn year(time: usize) -> u32 {
    YEAR_START + (time / QUARTERS) as u32
}

pub fn quarter(time: usize) -> usize {
    time % QUARTERS
}
