use serde::{Deserialize, Serialize};

use super::InferenceError;

/// Fitted per-feature normalisation, exported by the training job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl Scaler {
    /// Number of features the scaler was fit on.
    pub fn n_features(&self) -> Result<usize, InferenceError> {
        let (offsets, scale) = self.parameters();
        if offsets.is_empty() {
            return Err(InferenceError::InvalidArtifact(
                "scaler has no fitted features".to_string(),
            ));
        }
        if offsets.len() != scale.len() {
            return Err(InferenceError::ShapeMismatch {
                stage: "scaler",
                expected: offsets.len(),
                actual: scale.len(),
            });
        }
        if offsets.iter().chain(scale).any(|v| !v.is_finite()) {
            return Err(InferenceError::InvalidArtifact(
                "scaler parameters must be finite".to_string(),
            ));
        }
        Ok(offsets.len())
    }

    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>, InferenceError> {
        let expected = self.n_features()?;
        if x.len() != expected {
            return Err(InferenceError::ShapeMismatch {
                stage: "scaler",
                expected,
                actual: x.len(),
            });
        }

        let scaled = match self {
            Scaler::Standard { mean, scale } => x
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(value, (mean, scale))| {
                    // Constant columns were fit with a zero scale; they pass through centred.
                    let scale = if *scale == 0.0 { 1.0 } else { *scale };
                    (value - mean) / scale
                })
                .collect(),
            Scaler::MinMax { min, scale } => x
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(value, (min, scale))| value * scale + min)
                .collect(),
        };
        Ok(scaled)
    }

    fn parameters(&self) -> (&[f64], &[f64]) {
        match self {
            Scaler::Standard { mean, scale } => (mean.as_slice(), scale.as_slice()),
            Scaler::MinMax { min, scale } => (min.as_slice(), scale.as_slice()),
        }
    }
}
