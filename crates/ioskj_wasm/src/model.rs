use crate::{js_error, parse_method, parse_region, row_major};
use anyhow::{Context, Result};
use ioskj_core::rng::{recruitment_rng, RecruitmentRng};
use ioskj_core::tracking::TrackLog;
use ioskj_core::yield_curve::{default_rates, YieldPoint};
use ioskj_core::{EquilibriumSettings, Exploitation, Model, MsySettings, Parameters};
use js_sys::Float64Array;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmModel {
    model: Model<TrackLog>,
    rng: RecruitmentRng,
    seed: u64,
}

impl WasmModel {
    fn from_params(params: Parameters, seed: u64) -> Result<WasmModel> {
        let model = Model::with_tracker(params, TrackLog::default())
            .context("Failed to build model from parameters")?;
        Ok(WasmModel {
            model,
            rng: recruitment_rng(seed),
            seed,
        })
    }

    fn yield_points(&self, rates: Vec<f64>) -> Result<Vec<YieldPoint>> {
        let rates = if rates.is_empty() { default_rates() } else { rates };
        let curve = self
            .model
            .yield_curve_with(rates, EquilibriumSettings::default())
            .context("Cannot build yield curve")?;
        curve
            .iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Yield curve evaluation failed")
    }
}

#[wasm_bindgen]
impl WasmModel {
    /// `params` may be `undefined` to use the default parameter set.
    #[wasm_bindgen(constructor)]
    pub fn new(params: JsValue, seed: u64) -> Result<WasmModel, JsValue> {
        console_error_panic_hook::set_once();

        let params: Parameters = if params.is_undefined() || params.is_null() {
            Parameters::default()
        } else {
            from_value(params)
                .map_err(|e| JsValue::from_str(&format!("Invalid parameters: {}", e)))?
        };
        WasmModel::from_params(params, seed).map_err(|e| js_error(format!("{:#}", e)))
    }

    pub fn init(&mut self) -> Result<(), JsValue> {
        self.model.init().map_err(js_error)
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = recruitment_rng(seed);
    }

    /// Restarts the recruitment deviation stream from the current seed.
    pub fn reset_rng(&mut self) {
        self.rng = recruitment_rng(self.seed);
    }

    pub fn set_catch(&mut self, region: &str, method: &str, catch: f64) -> Result<(), JsValue> {
        let region = parse_region(region).map_err(js_error)?;
        let method = parse_method(method).map_err(js_error)?;
        self.model.set_catch(region, method, catch).map_err(js_error)
    }

    pub fn clear_catches(&mut self) {
        self.model.clear_catches();
    }

    pub fn set_exploitation_rate(&mut self, rate: f64) -> Result<(), JsValue> {
        self.model.set_exploitation_rate(rate).map_err(js_error)
    }

    /// Switch back to deriving exploitation rates from catches.
    pub fn use_catches(&mut self) -> Result<(), JsValue> {
        self.model
            .set_exploitation(Exploitation::Catches)
            .map_err(js_error)
    }

    /// Advances one quarter. Returns the list of exploitation anomalies,
    /// empty when every catch could be taken.
    pub fn quarter(&mut self, year: u32, quarter: u32) -> Result<JsValue, JsValue> {
        let report = self
            .model
            .quarter(year, quarter as usize, &mut self.rng)
            .map_err(js_error)?;
        to_value(&report.anomalies)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Fish numbers flattened as `[region][age][size]`.
    pub fn numbers(&self) -> Float64Array {
        Float64Array::from(self.model.numbers().as_slice())
    }

    pub fn biomass(&self) -> Vec<f64> {
        self.model.biomass().to_vec()
    }

    pub fn biomass_spawning(&self) -> Vec<f64> {
        self.model.biomass_spawning().to_vec()
    }

    pub fn biomass_spawning_overall(&self) -> Vec<f64> {
        self.model.biomass_spawning_overall().to_vec()
    }

    pub fn biomass_spawning_unfished(&self) -> Vec<f64> {
        self.model.biomass_spawning_unfished().to_vec()
    }

    /// Flattened as `[region][method]`.
    pub fn biomass_vulnerable(&self) -> Vec<f64> {
        self.model.biomass_vulnerable().as_slice().to_vec()
    }

    /// Flattened as `[region][method]`.
    pub fn exploitation_rate(&self) -> Vec<f64> {
        self.model.exploitation_rate().as_slice().to_vec()
    }

    /// `undefined` before `init`, for quarters without spawning and for
    /// quarter indices outside 0..=3.
    pub fn stock_status(&self, quarter: u32) -> Option<f64> {
        self.model.stock_status(quarter as usize)
    }

    pub fn growth(&self) -> Vec<f64> {
        row_major(&self.model.biology().growth)
    }

    pub fn movement(&self) -> Vec<f64> {
        row_major(&self.model.biology().movement)
    }

    pub fn selectivities(&self) -> Vec<f64> {
        row_major(&self.model.biology().selectivities)
    }

    /// Equilibrium yield curve; an empty `rates` uses the default sweep.
    pub fn yield_curve(&self, rates: Vec<f64>) -> Result<JsValue, JsValue> {
        let points = self
            .yield_points(rates)
            .map_err(|e| js_error(format!("{:#}", e)))?;
        to_value(&points).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Finds MSY and stores it on the model. `settings` may be `undefined`.
    pub fn msy(&mut self, settings: JsValue) -> Result<JsValue, JsValue> {
        let settings: MsySettings = if settings.is_undefined() || settings.is_null() {
            MsySettings::default()
        } else {
            from_value(settings)
                .map_err(|e| JsValue::from_str(&format!("Invalid MSY settings: {}", e)))?
        };
        let msy = self.model.msy_find_with(settings).map_err(js_error)?;
        to_value(&msy).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// An independent copy with its own generator state and an empty track.
    pub fn fork(&self) -> WasmModel {
        WasmModel {
            model: self.model.fork_with(TrackLog::default()),
            rng: self.rng.clone(),
            seed: self.seed,
        }
    }

    pub fn track_records(&self) -> Result<JsValue, JsValue> {
        to_value(&self.model.tracker().records)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn clear_track(&mut self) {
        self.model.tracker_mut().records.clear();
    }
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::WasmModel;
    use wasm_bindgen::JsValue;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn default_model_advances_a_quarter() {
        let mut model = WasmModel::new(JsValue::UNDEFINED, 5).expect("model");
        model.init().expect("init");
        let anomalies = model.quarter(2020, 0).expect("quarter");
        assert!(anomalies.is_array() || anomalies.is_object());
        assert_eq!(model.biomass_spawning_unfished().len(), 4);
        assert_eq!(model.numbers().length() as usize, 3 * 24 * 40);
    }

    #[wasm_bindgen_test]
    fn set_catch_rejects_unknown_gear() {
        let mut model = WasmModel::new(JsValue::UNDEFINED, 5).expect("model");
        let result = model.set_catch("W", "trawl", 10.0);
        let message = result
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.contains("Unknown method"));
    }
}
