pub mod actions;
pub mod converter;
pub mod error;
pub mod kmz;
pub mod options;
pub mod parser;
pub mod preview;
pub mod serializer;
pub mod validator;
pub mod waylines;
pub mod wpml_types;
pub mod xml_utils;

use wasm_bindgen::prelude::*;

pub use crate::actions::{Action, ActionRequest};
pub use crate::error::{Error, Result};
pub use crate::options::ConvertOptions;
pub use crate::waylines::{DroneModel, PayloadModel, Waylines, WaylinesWaypoint};
pub use crate::wpml_types::WpmlMission;

/// Convert a Waylines object to KMZ bytes.
#[wasm_bindgen(js_name = waylinesToKmz)]
pub fn waylines_to_kmz(waylines: JsValue, options: JsValue) -> Result<js_sys::Uint8Array, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let w = parse_waylines(waylines)?;
    let bytes = kmz::convert_waylines_to_kmz_buffer_with(&w, &opts)?;
    Ok(js_sys::Uint8Array::from(bytes.as_slice()))
}

/// Parse KMZ bytes into the template and waylines documents.
#[wasm_bindgen(js_name = parseKmz)]
pub fn parse_kmz(bytes: &[u8]) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let mission = kmz::parse_kmz_buffer(bytes).map_err(Error::from)?;
    serde_wasm_bindgen::to_value(&mission).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Parse KMZ bytes and render the flight route as GeoJSON.
#[wasm_bindgen(js_name = kmzToGeoJson)]
pub fn kmz_to_geojson(bytes: &[u8]) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let mission = kmz::parse_kmz_buffer(bytes).map_err(Error::from)?;
    let fc = preview::mission_to_feature_collection(&mission);
    serde_wasm_bindgen::to_value(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Validate a Waylines object after defaults are applied. Throws on the first
/// violation.
#[wasm_bindgen(js_name = validateWaylines)]
pub fn validate_waylines(waylines: JsValue) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let mut w = parse_waylines(waylines)?;
    w.apply_defaults();
    validator::validate_with_context(&w, w.drone_model, w.payload_model).map_err(Error::from)?;
    Ok(())
}

fn parse_waylines(waylines: JsValue) -> Result<Waylines, JsValue> {
    serde_wasm_bindgen::from_value(waylines)
        .map_err(|e| Error::from(error::ValidationError::Malformed(e.to_string())).into())
}

fn parse_options(options: JsValue) -> Result<ConvertOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(ConvertOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
