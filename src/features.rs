//! Feature vector assembly for the diabetes-risk model.
//!
//! Submitted forms arrive as untyped string maps. [`ClinicalFeatures::from_form`]
//! turns them into typed vitals, and [`ClinicalFeatures::to_vector`] lays them out
//! in the column order the scaler and classifier were fit on.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::PATIENT_NAME_MAX_LEN;

/// Number of inputs the model consumes.
pub const FEATURE_COUNT: usize = 8;

/// Column order of the training data. `to_vector` must follow it exactly.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "pregnancies",
    "glucose",
    "blood_pressure",
    "skin_thickness",
    "insulin",
    "bmi",
    "diabetes_pedigree_function",
    "age",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// One or more submitted fields were missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid input: {}", joined(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.to_string(),
                message: message.into(),
            }],
        }
    }

    /// `Ok(())` when nothing was collected.
    pub fn check(errors: Vec<FieldError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self { errors })
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

fn joined(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The eight vitals scored by the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClinicalFeatures {
    pub pregnancies: i32,
    pub glucose: f64,
    pub blood_pressure: f64,
    pub skin_thickness: f64,
    pub insulin: f64,
    pub bmi: f64,
    pub diabetes_pedigree_function: f64,
    pub age: i32,
}

impl ClinicalFeatures {
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();
        let features = Self::collect(form, &mut errors);
        ValidationError::check(errors)?;
        features.ok_or_else(|| ValidationError::field("features", "incomplete"))
    }

    /// Ordered as [`FEATURE_NAMES`].
    #[must_use]
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            f64::from(self.pregnancies),
            self.glucose,
            self.blood_pressure,
            self.skin_thickness,
            self.insulin,
            self.bmi,
            self.diabetes_pedigree_function,
            f64::from(self.age),
        ]
    }

    fn collect(form: &HashMap<String, String>, errors: &mut Vec<FieldError>) -> Option<Self> {
        // Evaluate every field before combining so all problems are reported at once.
        let pregnancies = parse_field::<i32>(form, "pregnancies", errors);
        let glucose = parse_field::<f64>(form, "glucose", errors);
        let blood_pressure = parse_field::<f64>(form, "blood_pressure", errors);
        let skin_thickness = parse_field::<f64>(form, "skin_thickness", errors);
        let insulin = parse_field::<f64>(form, "insulin", errors);
        let bmi = parse_field::<f64>(form, "bmi", errors);
        let diabetes_pedigree_function =
            parse_field::<f64>(form, "diabetes_pedigree_function", errors);
        let age = parse_field::<i32>(form, "age", errors);

        Some(Self {
            pregnancies: pregnancies?,
            glucose: glucose?,
            blood_pressure: blood_pressure?,
            skin_thickness: skin_thickness?,
            insulin: insulin?,
            bmi: bmi?,
            diabetes_pedigree_function: diabetes_pedigree_function?,
            age: age?,
        })
    }
}

/// A validated patient submission: who, plus the vitals to score.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientIntake {
    pub name: String,
    pub features: ClinicalFeatures,
}

impl PatientIntake {
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();
        let name = required_text(form, "name", PATIENT_NAME_MAX_LEN, &mut errors);
        let features = ClinicalFeatures::collect(form, &mut errors);
        ValidationError::check(errors)?;

        match (name, features) {
            (Some(name), Some(features)) => Ok(Self { name, features }),
            _ => Err(ValidationError::field("form", "incomplete")),
        }
    }
}

/// Trimmed, non-blank value of `field`.
pub(crate) fn required<'a>(
    form: &'a HashMap<String, String>,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<&'a str> {
    match form.get(field).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Some(value),
        _ => {
            errors.push(FieldError {
                field: field.to_string(),
                message: "is required".to_string(),
            });
            None
        }
    }
}

/// [`required`], limited to `max` characters.
pub(crate) fn required_text(
    form: &HashMap<String, String>,
    field: &str,
    max: usize,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    let value = required(form, field, errors)?;
    within_length(field, value, max, errors).then(|| value.to_string())
}

/// Trimmed value of `field`, `None` when absent or blank.
pub(crate) fn present<'a>(form: &'a HashMap<String, String>, field: &str) -> Option<&'a str> {
    form.get(field).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// [`present`], limited to `max` characters.
pub(crate) fn optional_text(
    form: &HashMap<String, String>,
    field: &str,
    max: usize,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    let value = present(form, field)?;
    within_length(field, value, max, errors).then(|| value.to_string())
}

/// Columns are sized in characters, not bytes.
pub(crate) fn within_length(
    field: &str,
    value: &str,
    max: usize,
    errors: &mut Vec<FieldError>,
) -> bool {
    let len = value.chars().count();
    if len > max {
        errors.push(FieldError {
            field: field.to_string(),
            message: format!("must be at most {max} characters, got {len}"),
        });
        return false;
    }
    true
}

trait Measurement: FromStr + Copy {
    const KIND: &'static str;
    fn is_valid(self) -> bool;
}

impl Measurement for f64 {
    const KIND: &'static str = "a number";

    fn is_valid(self) -> bool {
        self.is_finite() && self >= 0.0
    }
}

impl Measurement for i32 {
    const KIND: &'static str = "a whole number";

    fn is_valid(self) -> bool {
        self >= 0
    }
}

fn parse_field<T: Measurement>(
    form: &HashMap<String, String>,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    let raw = required(form, field, errors)?;
    match raw.parse::<T>() {
        Ok(value) if value.is_valid() => Some(value),
        Ok(_) => {
            errors.push(FieldError {
                field: field.to_string(),
                message: format!("must be a finite, non-negative value, got {raw:?}"),
            });
            None
        }
        Err(_) => {
            errors.push(FieldError {
                field: field.to_string(),
                message: format!("must be {}, got {raw:?}", T::KIND),
            });
            None
        }
    }
}
