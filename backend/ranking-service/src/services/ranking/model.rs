/// Relevance Model Inference Module
///
/// Loads an ONNX-exported binary classifier with tract-onnx once per process
/// and runs it on [`FeatureVector`]s. The plan is immutable after loading and
/// shared by every request.
///
/// A model that failed to load is kept as [`ModelHandle::Unavailable`]; the
/// ranking engine reports that as an error instead of scoring some other way.
use super::features::FeatureVector;
use super::{RankingError, Result};
use ndarray::{Array1, Array2};
use std::path::Path;
use std::sync::Arc;
use tract_onnx::prelude::*;
use tracing::{error, info, warn};

/// Feature vector size: category match, location match, organizer trust
pub const FEATURE_VECTOR_SIZE: usize = 3;

/// Scores a batch of feature rows with a probability-like relevance per row.
pub trait RelevanceModel: Send + Sync {
    /// `features` is (batch_size × FEATURE_VECTOR_SIZE); returns batch_size scores.
    fn predict(&self, features: &Array2<f32>) -> Result<Array1<f32>>;
}

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX classifier with a single `[1, FEATURE_VECTOR_SIZE]` float input and a
/// sigmoid output
pub struct OnnxRelevanceModel {
    plan: Arc<OnnxPlan>,
}

impl OnnxRelevanceModel {
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(RankingError::ModelLoadError(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(0, f32::fact([1, FEATURE_VECTOR_SIZE]).into())
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                RankingError::ModelLoadError(format!("{}: {}", path.display(), e))
            })?;

        info!(path = %path.display(), "Loaded ONNX relevance model");

        Ok(Self {
            plan: Arc::new(plan),
        })
    }

    fn predict_row(&self, row: &[f32]) -> Result<f32> {
        let input = tract_ndarray::Array2::from_shape_vec((1, FEATURE_VECTOR_SIZE), row.to_vec())
            .map_err(|e| RankingError::InvalidInput(format!("Bad feature row: {}", e)))?
            .into_tensor();

        let output = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| RankingError::InferenceError(format!("ONNX inference failed: {}", e)))?;

        let view = output[0]
            .to_array_view::<f32>()
            .map_err(|e| RankingError::InferenceError(format!("Output extraction failed: {}", e)))?;

        view.iter()
            .next()
            .copied()
            .ok_or_else(|| RankingError::InferenceError("Empty model output".to_string()))
    }
}

impl RelevanceModel for OnnxRelevanceModel {
    fn predict(&self, features: &Array2<f32>) -> Result<Array1<f32>> {
        let scores = features
            .rows()
            .into_iter()
            .map(|row| self.predict_row(&row.to_vec()))
            .collect::<Result<Vec<f32>>>()?;

        Ok(Array1::from(scores))
    }
}

/// Process-wide model slot
#[derive(Clone)]
pub enum ModelHandle {
    Loaded(Arc<dyn RelevanceModel>),
    Unavailable(String),
}

impl ModelHandle {
    /// Load the ONNX model at `path`. Failures are logged and remembered.
    pub fn load_onnx(path: Option<&str>) -> Self {
        let Some(path) = path.filter(|p| !p.trim().is_empty()) else {
            warn!("No relevance model path configured; learned ranking disabled");
            return ModelHandle::Unavailable("no model path configured".to_string());
        };

        match OnnxRelevanceModel::load(path) {
            Ok(model) => ModelHandle::Loaded(Arc::new(model)),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to load relevance model");
                ModelHandle::Unavailable(e.to_string())
            }
        }
    }

    pub fn loaded(model: Arc<dyn RelevanceModel>) -> Self {
        ModelHandle::Loaded(model)
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ModelHandle::Loaded(_))
    }

    pub fn get(&self) -> Result<&Arc<dyn RelevanceModel>> {
        match self {
            ModelHandle::Loaded(model) => Ok(model),
            ModelHandle::Unavailable(reason) => Err(RankingError::ModelUnavailable(reason.clone())),
        }
    }
}

/// Learned scorer: feature vectors in, relevance in [0, 1] out
#[derive(Clone)]
pub struct ModelScorer {
    model: ModelHandle,
}

impl ModelScorer {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }

    pub fn is_available(&self) -> bool {
        self.model.is_available()
    }

    /// Fail with `ModelUnavailable` before any scoring work is done.
    pub fn ensure_available(&self) -> Result<()> {
        self.model.get().map(|_| ())
    }

    pub fn predict(&self, features: FeatureVector) -> Result<f32> {
        self.predict_batch(&[features])?
            .first()
            .copied()
            .ok_or_else(|| RankingError::InferenceError("Empty model output".to_string()))
    }

    pub fn predict_batch(&self, features: &[FeatureVector]) -> Result<Vec<f32>> {
        let model = self.model.get()?;

        if features.is_empty() {
            return Ok(Vec::new());
        }

        let flat: Vec<f32> = features.iter().flat_map(|f| f.0).collect();
        let matrix = Array2::from_shape_vec((features.len(), FEATURE_VECTOR_SIZE), flat)
            .map_err(|e| {
                RankingError::FeatureExtractionError(format!(
                    "Failed to build feature matrix: {}",
                    e
                ))
            })?;

        let raw = model.predict(&matrix)?;
        if raw.len() != features.len() {
            return Err(RankingError::InferenceError(format!(
                "Expected {} scores, got {}",
                features.len(),
                raw.len()
            )));
        }

        raw.iter().map(|score| bounded(*score)).collect()
    }
}

fn bounded(score: f32) -> Result<f32> {
    if score.is_nan() {
        return Err(RankingError::InferenceError(
            "Model produced NaN".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&score) {
        warn!(score, "Relevance score outside [0, 1], clamping");
    }
    Ok(score.clamp(0.0, 1.0))
}
