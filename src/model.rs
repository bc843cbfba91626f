use serde::Deserialize;
use std::{fs, path::Path, sync::Arc};

use crate::types::{FeatureVector, PredictionRequest, FEATURE_ORDER};

pub const N_FEATURES: usize = FEATURE_ORDER.len();

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("model metadata mismatch: {0}")]
    Metadata(String),

    #[error("{0} is not a JSON artifact and this build has no TorchScript support")]
    TorchUnavailable(String),

    #[cfg(feature = "torch")]
    #[error(transparent)]
    Torch(#[from] tch::TchError),

    #[error("{0}")]
    Inference(String),
}

fn read(path: &Path) -> Result<String, ModelError> {
    fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse<T: for<'de> Deserialize<'de>>(path: &Path, txt: &str) -> Result<T, ModelError> {
    serde_json::from_str(txt).map_err(|source| ModelError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// A trained model: one row of features in, one scalar out.
///
/// Implementations must not mutate themselves on `predict`; one instance is
/// shared by every in-flight request.
pub trait Regressor: Send + Sync {
    fn name(&self) -> &'static str;
    fn predict(&self, x: &FeatureVector) -> Result<f64, ModelError>;
}

// ---------- Metadata ----------

#[derive(Deserialize, Debug)]
pub struct ModelMeta {
    pub feat_list: Vec<String>,
    pub in_dim: Option<usize>,
}

impl ModelMeta {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let meta: Self = parse(path, &read(path)?)?;
        meta.check()?;
        Ok(meta)
    }

    /// The artifact must have been trained on exactly our feature order.
    pub fn check(&self) -> Result<(), ModelError> {
        if let Some(in_dim) = self.in_dim {
            if in_dim != N_FEATURES {
                return Err(ModelError::Metadata(format!(
                    "in_dim is {in_dim}, expected {N_FEATURES}"
                )));
            }
        }
        if !self.feat_list.iter().map(String::as_str).eq(FEATURE_ORDER) {
            return Err(ModelError::Metadata(format!(
                "feat_list {:?} does not match {:?}",
                self.feat_list, FEATURE_ORDER
            )));
        }
        Ok(())
    }
}

// ---------- Linear backend ----------

/// `{"intercept": b, "coefficients": [w0, ..., w6]}`
#[derive(Deserialize, Debug, Clone)]
pub struct LinearRegressor {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearRegressor {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let m: Self = parse(path, &read(path)?)?;
        if m.coefficients.len() != N_FEATURES {
            return Err(ModelError::InvalidArtifact(format!(
                "expected {} coefficients, got {}",
                N_FEATURES,
                m.coefficients.len()
            )));
        }
        if !m.intercept.is_finite() || m.coefficients.iter().any(|w| !w.is_finite()) {
            return Err(ModelError::InvalidArtifact("non-finite weight".into()));
        }
        Ok(m)
    }
}

impl Regressor for LinearRegressor {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn predict(&self, x: &FeatureVector) -> Result<f64, ModelError> {
        if self.coefficients.len() != x.as_slice().len() {
            return Err(ModelError::Inference(format!(
                "X has {} features, but the model expects {}",
                x.as_slice().len(),
                self.coefficients.len()
            )));
        }
        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(x.as_slice())
                .map(|(w, v)| w * v)
                .sum::<f64>())
    }
}

// ---------- TorchScript backend ----------

#[cfg(feature = "torch")]
pub use torch::TorchRegressor;

#[cfg(feature = "torch")]
mod torch {
    use super::{ModelError, Regressor, N_FEATURES};
    use crate::types::FeatureVector;
    use std::path::Path;
    use tch::{kind::Kind, CModule, Device, Tensor};

    pub struct TorchRegressor {
        module: CModule,
        device: Device,
    }

    impl TorchRegressor {
        pub fn load(path: &Path) -> Result<Self, ModelError> {
            let device = Device::Cpu;
            let module = CModule::load_on_device(path, device)?;

            // Probe output shape with a dummy forward — expect one value for one row
            let dummy = Tensor::zeros([1, N_FEATURES as i64], (Kind::Float, device));
            let out = tch::no_grad(|| module.forward_ts(&[dummy]))?;
            if out.numel() != 1 {
                return Err(ModelError::InvalidArtifact(format!(
                    "expected a single output value, got shape {:?}",
                    out.size()
                )));
            }
            Ok(Self { module, device })
        }
    }

    impl Regressor for TorchRegressor {
        fn name(&self) -> &'static str {
            "torchscript"
        }

        fn predict(&self, x: &FeatureVector) -> Result<f64, ModelError> {
            let input = Tensor::from_slice(x.as_slice())
                .to_kind(Kind::Float)
                .reshape([1, N_FEATURES as i64])
                .to_device(self.device);

            let out = tch::no_grad(|| self.module.forward_ts(&[input]))?;
            if out.numel() != 1 {
                return Err(ModelError::Inference(format!(
                    "unexpected model output shape: {:?}",
                    out.size()
                )));
            }
            Ok(out.flatten(0, -1).double_value(&[0]))
        }
    }
}

/// Load the artifact at `model_path`. `.json` files are linear models,
/// anything else is treated as TorchScript.
pub fn load_regressor(
    model_path: &Path,
    meta_path: Option<&Path>,
) -> Result<Arc<dyn Regressor>, ModelError> {
    if let Some(meta_path) = meta_path {
        ModelMeta::load(meta_path)?;
    }

    let is_json = model_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        return Ok(Arc::new(LinearRegressor::load(model_path)?));
    }

    #[cfg(feature = "torch")]
    {
        Ok(Arc::new(TorchRegressor::load(model_path)?))
    }
    #[cfg(not(feature = "torch"))]
    {
        Err(ModelError::TorchUnavailable(model_path.display().to_string()))
    }
}

// ---------- Adapter ----------

/// Owns the loaded model for the life of the process.
#[derive(Clone)]
pub struct Predictor {
    mdl: Arc<dyn Regressor>,
}

impl Predictor {
    pub fn new(mdl: Arc<dyn Regressor>) -> Self {
        Self { mdl }
    }

    pub fn name(&self) -> &'static str {
        self.mdl.name()
    }

    pub fn predict(&self, req: &PredictionRequest) -> Result<f64, ModelError> {
        self.predict_features(&req.features())
    }

    pub fn predict_features(&self, x: &FeatureVector) -> Result<f64, ModelError> {
        let y = self.mdl.predict(x)?;
        if !y.is_finite() {
            return Err(ModelError::Inference(format!(
                "model returned a non-finite prediction ({y})"
            )));
        }
        Ok(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    fn lettuce() -> FeatureVector {
        FeatureVector([1.2, 50.0, 20.0, 150.0, 40.0, 22.0, 7.0])
    }

    #[test]
    fn linear_model_is_a_dot_product() {
        let m = LinearRegressor {
            intercept: 5.0,
            coefficients: vec![0.1, 0.0, 0.0, 0.0, 0.0, 0.01, 0.0],
        };
        let y = m.predict(&lettuce()).unwrap();
        assert!((y - (5.0 + 0.12 + 0.22)).abs() < 1e-12);
    }

    #[test]
    fn loads_linear_json_artifact() {
        let f = write_tmp(
            ".json",
            r#"{"intercept": 6.5, "coefficients": [0, 0, 0, 0, 0, 0, 0]}"#,
        );
        let mdl = load_regressor(f.path(), None).unwrap();
        assert_eq!(mdl.name(), "linear");
        assert_eq!(mdl.predict(&lettuce()).unwrap(), 6.5);
    }

    #[test]
    fn rejects_wrong_coefficient_count() {
        let f = write_tmp(".json", r#"{"intercept": 6.5, "coefficients": [1, 2]}"#);
        let err = load_regressor(f.path(), None).err().unwrap();
        assert!(matches!(err, ModelError::InvalidArtifact(_)), "{err}");
    }

    #[test]
    fn missing_artifact_fails_to_load() {
        let err = load_regressor(Path::new("/nonexistent/model.json"), None)
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::Io { .. }), "{err}");
    }

    #[test]
    fn corrupt_artifact_fails_to_load() {
        let f = write_tmp(".json", "not json");
        let err = load_regressor(f.path(), None).err().unwrap();
        assert!(matches!(err, ModelError::Parse { .. }), "{err}");
    }

    #[test]
    fn meta_must_match_feature_order() {
        let ok = ModelMeta {
            feat_list: FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
            in_dim: Some(7),
        };
        assert!(ok.check().is_ok());

        let mut swapped = ok.feat_list.clone();
        swapped.swap(0, 1);
        let bad = ModelMeta { feat_list: swapped, in_dim: None };
        assert!(matches!(bad.check(), Err(ModelError::Metadata(_))));

        let bad_dim = ModelMeta { feat_list: ok.feat_list.clone(), in_dim: Some(8) };
        assert!(matches!(bad_dim.check(), Err(ModelError::Metadata(_))));
    }

    #[test]
    fn mismatched_meta_blocks_loading() {
        let model = write_tmp(
            ".json",
            r#"{"intercept": 6.5, "coefficients": [0, 0, 0, 0, 0, 0, 0]}"#,
        );
        let meta = write_tmp(".json", r#"{"feat_list": ["crop", "soil_ec"]}"#);
        let err = load_regressor(model.path(), Some(meta.path())).err().unwrap();
        assert!(matches!(err, ModelError::Metadata(_)), "{err}");
    }

    struct Nan;

    impl Regressor for Nan {
        fn name(&self) -> &'static str {
            "nan"
        }
        fn predict(&self, _: &FeatureVector) -> Result<f64, ModelError> {
            Ok(f64::NAN)
        }
    }

    struct Recorder(std::sync::Mutex<Option<FeatureVector>>);

    impl Regressor for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }
        fn predict(&self, x: &FeatureVector) -> Result<f64, ModelError> {
            *self.0.lock().unwrap() = Some(*x);
            Ok(6.25)
        }
    }

    #[test]
    fn predict_feeds_request_in_canonical_order() {
        let rec = Arc::new(Recorder(std::sync::Mutex::new(None)));
        let p = Predictor::new(rec.clone());
        let req = PredictionRequest::from_features([1.2, 50.0, 20.0, 150.0, 40.0, 22.0, 7.0]);

        assert_eq!(p.predict(&req).unwrap(), 6.25);
        let seen = rec.0.lock().unwrap().unwrap();
        assert_eq!(seen.0, [1.2, 50.0, 20.0, 150.0, 40.0, 22.0, 7.0]);
    }

    #[test]
    fn non_finite_prediction_is_an_error() {
        let p = Predictor::new(Arc::new(Nan));
        let err = p.predict_features(&lettuce()).unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }
}
