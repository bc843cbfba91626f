use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use validator::Validate;

/// Canonical feature order expected by the trained model.
pub const FEATURE_ORDER: [&str; 7] = [
    "soil_ec",
    "nitrogen",
    "phosphorus",
    "potassium",
    "moisture",
    "temperature",
    "crop",
];

/// Crop names and the integer codes the model was trained on.
pub const CROP_ENCODING: [(&str, u8); 13] = [
    ("Bell Pepper", 0),
    ("Bitter Gourd", 1),
    ("Carrot", 2),
    ("Corn", 3),
    ("Cucumber", 4),
    ("Eggplant", 5),
    ("Green Chili", 6),
    ("Lettuce", 7),
    ("Mustard Greens", 8),
    ("Pechay", 9),
    ("Squash", 10),
    ("Tomato", 11),
    ("Watermelon", 12),
];

/// Crop name for an encoded value, if the code is one of ours.
pub fn name_of(code: i64) -> Option<&'static str> {
    let code = u8::try_from(code).ok()?;
    CROP_ENCODING
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(n, _)| *n)
}

/// One sensor reading. The ranges below are the accepted input domain;
/// `validate::validate_request` only returns requests that pass them.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, Validate)]
pub struct PredictionRequest {
    /// Electrical conductivity (dS/m)
    #[validate(range(min = 0.0, max = 3.0))]
    #[schema(minimum = 0.0, maximum = 3.0, example = 1.2)]
    pub soil_ec: f64,
    /// Nitrogen (ppm)
    #[validate(range(min = 0.0, max = 120.0))]
    #[schema(minimum = 0.0, maximum = 120.0, example = 50.0)]
    pub nitrogen: f64,
    /// Phosphorus (ppm)
    #[validate(range(min = 0.0, max = 80.0))]
    #[schema(minimum = 0.0, maximum = 80.0, example = 20.0)]
    pub phosphorus: f64,
    /// Potassium (ppm)
    #[validate(range(min = 0.0, max = 300.0))]
    #[schema(minimum = 0.0, maximum = 300.0, example = 150.0)]
    pub potassium: f64,
    /// Moisture (%)
    #[validate(range(min = 0.0, max = 80.0))]
    #[schema(minimum = 0.0, maximum = 80.0, example = 40.0)]
    pub moisture: f64,
    /// Temperature (°C)
    #[validate(range(min = 0.0, max = 30.0))]
    #[schema(minimum = 0.0, maximum = 30.0, example = 22.0)]
    pub temperature: f64,
    /// Encoded crop type, see `/crop-encoding`
    #[validate(range(min = 0, max = 12))]
    #[schema(minimum = 0.0, maximum = 12.0, example = 7)]
    pub crop: i64,
}

impl PredictionRequest {
    /// Inverse of `features`; the crop slot saturates to the i64 range.
    pub fn from_features(x: [f64; 7]) -> Self {
        let [soil_ec, nitrogen, phosphorus, potassium, moisture, temperature, crop] = x;
        Self {
            soil_ec,
            nitrogen,
            phosphorus,
            potassium,
            moisture,
            temperature,
            crop: crop as i64,
        }
    }

    pub fn features(&self) -> FeatureVector {
        FeatureVector([
            self.soil_ec,
            self.nitrogen,
            self.phosphorus,
            self.potassium,
            self.moisture,
            self.temperature,
            self.crop as f64,
        ])
    }
}

/// Single-row model input, laid out in `FEATURE_ORDER`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; 7]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

// ---------- Response bodies ----------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PredictionOut {
    #[serde(rename = "predicted_pH")]
    pub predicted_ph: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CropEncodingOut {
    #[serde(rename = "Crop Encoding Mapping")]
    #[schema(value_type = Object)]
    pub mapping: BTreeMap<&'static str, u8>,
}

impl CropEncodingOut {
    pub fn new() -> Self {
        Self {
            mapping: CROP_ENCODING.iter().copied().collect(),
        }
    }
}

impl Default for CropEncodingOut {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageOut {
    #[schema(value_type = String)]
    pub message: &'static str,
}
