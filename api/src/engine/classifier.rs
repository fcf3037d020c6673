//! Severity classification over the ONNX artifact.
//!
//! The model is loaded lazily on the first prediction and the outcome is
//! cached for the lifetime of the process: a load failure is remembered and
//! every later request fails fast with the same error instead of retrying
//! the expensive load. Known limitation: a model file that appears after
//! boot is only picked up after a restart.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tract_onnx::prelude::*;

use psyche_core::assessment::{Severity, SymptomScores};

/// Input width the classifier was trained on (one score per symptom).
pub const NUM_FEATURES: usize = 12;

/// Output width of the categorical head, one score per severity class.
const NUM_CLASSES: usize = 4;

/// Undecoded model output. The artifact may be a 4-way categorical model or
/// an ordinal regressor; the shape is decided at the tensor boundary so the
/// decode into [`Severity`] is an exhaustive match.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    Categorical([f32; NUM_CLASSES]),
    Scalar(f32),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier model unavailable: {0}")]
    Unavailable(String),
}

/// A loaded classifier artifact.
pub trait RawClassifier: Send + Sync {
    fn run(&self, features: &[f32; NUM_FEATURES]) -> Result<RawOutput, String>;
}

type Loader = Box<dyn Fn() -> Result<Box<dyn RawClassifier>, String> + Send + Sync>;

/// Process-wide handle around the lazily loaded classifier.
///
/// The `OnceLock` guards the single Unloaded -> Loaded/Failed transition:
/// concurrent first calls run the loader at most once and all waiters see
/// the same terminal outcome.
pub struct ModelHandle {
    loader: Loader,
    state: OnceLock<Result<Box<dyn RawClassifier>, String>>,
}

impl ModelHandle {
    /// Handle backed by an ONNX file, loaded with tract on first use.
    pub fn from_onnx_path(path: PathBuf) -> Self {
        Self::with_loader(Box::new(move || {
            OnnxClassifier::load(&path).map(|m| Box::new(m) as Box<dyn RawClassifier>)
        }))
    }

    /// Handle with an injected loader. Used by tests to stand in for the
    /// real artifact.
    pub fn with_loader(loader: Loader) -> Self {
        Self {
            loader,
            state: OnceLock::new(),
        }
    }

    fn artifact(&self) -> Result<&dyn RawClassifier, ClassifierError> {
        match self.state.get_or_init(|| (self.loader)()) {
            Ok(model) => Ok(model.as_ref()),
            Err(e) => Err(ClassifierError::Unavailable(e.clone())),
        }
    }

    /// Run inference, returning the undecoded output shape.
    pub fn classify_raw(&self, scores: &SymptomScores) -> Result<RawOutput, ClassifierError> {
        let features = feature_vector(scores);
        self.artifact()?
            .run(&features)
            .map_err(ClassifierError::Unavailable)
    }

    /// Run inference and decode into a severity class.
    pub fn classify(&self, scores: &SymptomScores) -> Result<Severity, ClassifierError> {
        Ok(match self.classify_raw(scores)? {
            RawOutput::Categorical(class_scores) => Severity::from_index(argmax(&class_scores)),
            RawOutput::Scalar(value) => Severity::from_scalar(value),
        })
    }
}

fn feature_vector(scores: &SymptomScores) -> [f32; NUM_FEATURES] {
    scores.as_array().map(|v| v as f32)
}

/// Index of the first maximum, matching the categorical head's training
/// convention for ties.
fn argmax(values: &[f32; NUM_CLASSES]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX artifact loaded and optimized via tract.
struct OnnxClassifier {
    plan: TractModel,
}

impl OnnxClassifier {
    fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Err(format!("model file not found: {}", path.display()));
        }
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| format!("failed to parse ONNX model: {e}"))?
            .with_input_fact(0, f32::fact([1, NUM_FEATURES]).into())
            .map_err(|e| format!("failed to set input shape: {e}"))?
            .into_optimized()
            .map_err(|e| format!("failed to optimize model: {e}"))?
            .into_runnable()
            .map_err(|e| format!("failed to create runnable model: {e}"))?;
        tracing::info!(path = %path.display(), "Classifier model loaded");
        Ok(Self { plan })
    }
}

impl RawClassifier for OnnxClassifier {
    fn run(&self, features: &[f32; NUM_FEATURES]) -> Result<RawOutput, String> {
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, NUM_FEATURES), features.to_vec())
            .map_err(|e| format!("failed to build input tensor: {e}"))?
            .into();

        let result = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| format!("inference failed: {e}"))?;

        let output = result
            .first()
            .ok_or_else(|| "model produced no output".to_string())?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| format!("unexpected output type: {e}"))?;
        let values: Vec<f32> = view.iter().copied().collect();
        decode_output(&values)
    }
}

/// A 4-wide output is the categorical head; anything else is read as a
/// scalar regression value (first element).
fn decode_output(values: &[f32]) -> Result<RawOutput, String> {
    if values.len() == NUM_CLASSES {
        Ok(RawOutput::Categorical([
            values[0], values[1], values[2], values[3],
        ]))
    } else {
        values
            .first()
            .copied()
            .map(RawOutput::Scalar)
            .ok_or_else(|| "model produced an empty output".to_string())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub struct FnClassifier<F>(pub F);

    impl<F> RawClassifier for FnClassifier<F>
    where
        F: Fn(&[f32; NUM_FEATURES]) -> Result<RawOutput, String> + Send + Sync,
    {
        fn run(&self, features: &[f32; NUM_FEATURES]) -> Result<RawOutput, String> {
            (self.0)(features)
        }
    }

    /// Handle whose artifact always returns the given output.
    pub fn handle_returning(output: RawOutput) -> ModelHandle {
        ModelHandle::with_loader(Box::new(move || {
            let output = output.clone();
            Ok(Box::new(FnClassifier(move |_: &[f32; NUM_FEATURES]| {
                Ok(output.clone())
            })) as Box<dyn RawClassifier>)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FnClassifier, handle_returning};
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn any_scores() -> SymptomScores {
        SymptomScores {
            appetite: 2,
            interest: 3,
            fatigue: 4,
            worthlessness: 1,
            concentration: 2,
            agitation: 3,
            suicidal_ideation: 1,
            sleep_disturbance: 5,
            aggression: 1,
            panic_attacks: 2,
            hopelessness: 3,
            restlessness: 4,
        }
    }

    #[test]
    fn categorical_output_takes_argmax() {
        let handle = handle_returning(RawOutput::Categorical([0.1, 0.2, 0.6, 0.1]));
        assert_eq!(handle.classify(&any_scores()).unwrap(), Severity::Moderate);
    }

    #[test]
    fn categorical_tie_takes_first_maximum() {
        let handle = handle_returning(RawOutput::Categorical([0.4, 0.4, 0.1, 0.1]));
        assert_eq!(handle.classify(&any_scores()).unwrap(), Severity::None);
    }

    #[test]
    fn scalar_output_rounds_and_clamps() {
        let handle = handle_returning(RawOutput::Scalar(2.6));
        assert_eq!(handle.classify(&any_scores()).unwrap(), Severity::Severe);

        let handle = handle_returning(RawOutput::Scalar(17.0));
        assert_eq!(handle.classify(&any_scores()).unwrap(), Severity::Severe);
    }

    #[test]
    fn decode_output_recognizes_both_shapes() {
        assert_eq!(
            decode_output(&[0.0, 1.0, 0.0, 0.0]).unwrap(),
            RawOutput::Categorical([0.0, 1.0, 0.0, 0.0])
        );
        assert_eq!(decode_output(&[1.7]).unwrap(), RawOutput::Scalar(1.7));
        // Unexpected widths fall back to the first value.
        assert_eq!(decode_output(&[2.2, 0.0]).unwrap(), RawOutput::Scalar(2.2));
        assert!(decode_output(&[]).is_err());
    }

    #[test]
    fn successful_load_runs_loader_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let handle = ModelHandle::with_loader(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FnClassifier(|_: &[f32; NUM_FEATURES]| {
                Ok(RawOutput::Scalar(1.0))
            })) as Box<dyn RawClassifier>)
        }));

        assert!(handle.classify(&any_scores()).is_ok());
        assert!(handle.classify(&any_scores()).is_ok());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_is_cached_and_not_retried() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let handle = ModelHandle::with_loader(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("model file not found: psyche_model.onnx".to_string())
        }));

        let first = handle.classify(&any_scores());
        let second = handle.classify(&any_scores());
        assert!(matches!(first, Err(ClassifierError::Unavailable(_))));
        assert!(matches!(second, Err(ClassifierError::Unavailable(_))));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inference_error_becomes_unavailable() {
        let handle = ModelHandle::with_loader(Box::new(|| {
            Ok(Box::new(FnClassifier(|_: &[f32; NUM_FEATURES]| {
                Err("inference failed: bad tensor".to_string())
            })) as Box<dyn RawClassifier>)
        }));
        assert!(matches!(
            handle.classify(&any_scores()),
            Err(ClassifierError::Unavailable(_))
        ));
    }

    #[test]
    fn missing_artifact_file_fails_to_load() {
        let handle =
            ModelHandle::from_onnx_path(PathBuf::from("definitely-missing-model.onnx"));
        match handle.classify(&any_scores()) {
            Err(ClassifierError::Unavailable(msg)) => {
                assert!(msg.contains("model file not found"));
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
    }
}
