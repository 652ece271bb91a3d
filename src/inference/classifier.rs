use serde::{Deserialize, Serialize};

use super::InferenceError;

/// Fitted model applied to the scaled vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    LogisticRegression { coef: Vec<f64>, intercept: f64 },
    KMeans { cluster_centers: Vec<Vec<f64>> },
}

/// Model output before it is read as a risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawLabel {
    Binary(u8),
    Cluster(usize),
}

impl Classifier {
    pub fn n_features(&self) -> Result<usize, InferenceError> {
        match self {
            Classifier::LogisticRegression { coef, intercept } => {
                if coef.is_empty() {
                    return Err(InferenceError::InvalidArtifact(
                        "logistic regression has no coefficients".to_string(),
                    ));
                }
                if coef.iter().chain(std::iter::once(intercept)).any(|v| !v.is_finite()) {
                    return Err(InferenceError::InvalidArtifact(
                        "logistic regression parameters must be finite".to_string(),
                    ));
                }
                Ok(coef.len())
            }
            Classifier::KMeans { cluster_centers } => {
                if cluster_centers.len() < 2 {
                    return Err(InferenceError::InvalidArtifact(format!(
                        "k-means needs at least 2 clusters, found {}",
                        cluster_centers.len()
                    )));
                }
                let width = cluster_centers[0].len();
                if width == 0 {
                    return Err(InferenceError::InvalidArtifact(
                        "k-means cluster centres are empty".to_string(),
                    ));
                }
                if let Some(ragged) = cluster_centers.iter().find(|c| c.len() != width) {
                    return Err(InferenceError::ShapeMismatch {
                        stage: "classifier",
                        expected: width,
                        actual: ragged.len(),
                    });
                }
                Ok(width)
            }
        }
    }

    pub fn classify(&self, x: &[f64]) -> Result<RawLabel, InferenceError> {
        let expected = self.n_features()?;
        if x.len() != expected {
            return Err(InferenceError::ShapeMismatch {
                stage: "classifier",
                expected,
                actual: x.len(),
            });
        }

        let label = match self {
            Classifier::LogisticRegression { coef, intercept } => {
                let decision = dot(coef, x) + intercept;
                RawLabel::Binary(u8::from(decision > 0.0))
            }
            Classifier::KMeans { cluster_centers } => {
                // Strict `<` keeps the lowest id on ties.
                let mut nearest = 0;
                let mut best = f64::INFINITY;
                for (id, centre) in cluster_centers.iter().enumerate() {
                    let distance = squared_distance(centre, x);
                    if distance < best {
                        best = distance;
                        nearest = id;
                    }
                }
                RawLabel::Cluster(nearest)
            }
        };
        Ok(label)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(a, b)| (a - b) * (a - b)).sum()
}
