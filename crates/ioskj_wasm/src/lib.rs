//! WASM bindings for the ioskj population dynamics engine.
//!
//! The JavaScript host owns the simulation loop: it sets catches, advances
//! quarters, reads aggregates and forks models to compare procedures.

mod model;

pub use model::WasmModel;

use ioskj_core::dimensions::{Method, Region};
use nalgebra::DMatrix;
use wasm_bindgen::prelude::*;

pub(crate) fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

pub(crate) fn parse_region(name: &str) -> Result<Region, String> {
    match name.to_ascii_uppercase().as_str() {
        "W" => Ok(Region::W),
        "M" => Ok(Region::M),
        "E" => Ok(Region::E),
        _ => Err(format!("Unknown region '{}'", name)),
    }
}

pub(crate) fn parse_method(name: &str) -> Result<Method, String> {
    match name.to_ascii_uppercase().as_str() {
        "PS" => Ok(Method::PS),
        "PL" => Ok(Method::PL),
        "GN" => Ok(Method::GN),
        "LI" => Ok(Method::LI),
        "OT" => Ok(Method::OT),
        _ => Err(format!("Unknown method '{}'", name)),
    }
}

/// Flattens a matrix in row-major order for transfer to JS.
pub(crate) fn row_major(matrix: &DMatrix<f64>) -> Vec<f64> {
    matrix.transpose().as_slice().to_vec()
}
