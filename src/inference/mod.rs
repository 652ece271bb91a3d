//! Diabetes-risk inference: scale, classify, interpret.
//!
//! The scaler and classifier are fitted elsewhere and exported as tagged JSON
//! documents. They are read once at startup into a [`Pipeline`], which is then
//! shared read-only by every worker. Nothing here mutates after construction, so
//! [`Pipeline::predict`] is a pure function of its input and the loaded artifacts.

mod classifier;
mod scaler;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use classifier::{Classifier, RawLabel};
pub use scaler::Scaler;

use crate::features::FEATURE_COUNT;

/// Cluster id that the training job labelled as the diabetic group.
pub const HIGH_RISK_CLUSTER: usize = 1;

pub const HIGH_RISK_LABEL: &str = "Diabétique";
pub const LOW_RISK_LABEL: &str = "Non diabétique";

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("model artifact {path} unavailable: {reason}")]
    ModelUnavailable { path: PathBuf, reason: String },
    #[error("{stage} expects {expected} features, got {actual}")]
    ShapeMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
}

/// Risk label produced by the pipeline. Only [`Pipeline`] can mint one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Prediction {
    high_risk: bool,
}

impl Prediction {
    pub fn is_high_risk(&self) -> bool {
        self.high_risk
    }

    pub fn label(&self) -> &'static str {
        label_for(self.high_risk)
    }

    fn interpret(raw: RawLabel) -> Self {
        let high_risk = match raw {
            RawLabel::Binary(label) => label == 1,
            RawLabel::Cluster(id) => id == HIGH_RISK_CLUSTER,
        };
        Self { high_risk }
    }
}

pub fn label_for(high_risk: bool) -> &'static str {
    if high_risk {
        HIGH_RISK_LABEL
    } else {
        LOW_RISK_LABEL
    }
}

/// Every intermediate value of one scoring run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub scaled: Vec<f64>,
    pub raw: RawLabel,
    pub prediction: Prediction,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    scaler: Scaler,
    classifier: Classifier,
}

impl Pipeline {
    /// Pair a scaler with a classifier, checking both agree on the feature count.
    pub fn new(scaler: Scaler, classifier: Classifier) -> Result<Self, InferenceError> {
        let scaler_width = scaler.n_features()?;
        if scaler_width != FEATURE_COUNT {
            return Err(InferenceError::ShapeMismatch {
                stage: "scaler",
                expected: FEATURE_COUNT,
                actual: scaler_width,
            });
        }
        let classifier_width = classifier.n_features()?;
        if classifier_width != scaler_width {
            return Err(InferenceError::ShapeMismatch {
                stage: "classifier",
                expected: scaler_width,
                actual: classifier_width,
            });
        }
        Ok(Self { scaler, classifier })
    }

    pub fn load(scaler_path: &Path, classifier_path: &Path) -> Result<Self, InferenceError> {
        let scaler: Scaler = read_artifact(scaler_path)?;
        let classifier: Classifier = read_artifact(classifier_path)?;
        // A file that parses but holds unusable parameters is as unavailable as a missing one.
        scaler.n_features().map_err(|e| unusable(scaler_path, e))?;
        classifier.n_features().map_err(|e| unusable(classifier_path, e))?;
        let pipeline = Self::new(scaler, classifier)?;
        tracing::info!(
            scaler = %scaler_path.display(),
            classifier = %classifier_path.display(),
            kind = pipeline.classifier_kind(),
            "loaded inference artifacts"
        );
        Ok(pipeline)
    }

    pub fn predict(&self, features: &[f64]) -> Result<Prediction, InferenceError> {
        self.assess(features).map(|a| a.prediction)
    }

    pub fn assess(&self, features: &[f64]) -> Result<Assessment, InferenceError> {
        let scaled = self.scaler.transform(features)?;
        let raw = self.classifier.classify(&scaled)?;
        let prediction = Prediction::interpret(raw);
        tracing::debug!(?features, ?scaled, ?raw, high_risk = prediction.high_risk, "scored feature vector");
        Ok(Assessment {
            scaled,
            raw,
            prediction,
        })
    }

    pub fn classifier_kind(&self) -> &'static str {
        match self.classifier {
            Classifier::LogisticRegression { .. } => "logistic_regression",
            Classifier::KMeans { .. } => "k_means",
        }
    }
}

fn unusable(path: &Path, err: InferenceError) -> InferenceError {
    InferenceError::ModelUnavailable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, InferenceError> {
    let unavailable = |reason: String| InferenceError::ModelUnavailable {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = fs::read(path).map_err(|e| unavailable(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| unavailable(e.to_string()))
}
