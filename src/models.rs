use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::features::{ClinicalFeatures, PatientIntake};
use crate::inference::{self, Prediction};
use crate::schema::{doctors, patients};

// Character widths of the VARCHAR columns. Forms are checked against these
// before anything reaches the store.
pub const NAME_MAX_LEN: usize = 100;
pub const EMAIL_MAX_LEN: usize = 150;
pub const SPECIALTY_MAX_LEN: usize = 100;
pub const PHONE_MAX_LEN: usize = 20;
pub const PATIENT_NAME_MAX_LEN: usize = 150;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = doctors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Doctor {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Doctor {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = doctors)]
pub struct NewDoctor {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub specialty: Option<String>,
    pub phone: Option<String>,
}

/// Profile edit. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = doctors)]
pub struct DoctorChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub specialty: Option<String>,
    pub phone: Option<String>,
}

impl DoctorChanges {
    pub(crate) fn apply(self, doctor: &mut Doctor) {
        if let Some(first_name) = self.first_name {
            doctor.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            doctor.last_name = last_name;
        }
        if let Some(email) = self.email {
            doctor.email = email;
        }
        if let Some(specialty) = self.specialty {
            doctor.specialty = Some(specialty);
        }
        if let Some(phone) = self.phone {
            doctor.phone = Some(phone);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = patients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Patient {
    pub id: i32,
    pub doctor_id: i32,
    pub name: String,
    pub age: i32,
    pub pregnancies: i32,
    pub glucose: f64,
    pub blood_pressure: f64,
    pub skin_thickness: f64,
    pub insulin: f64,
    pub bmi: f64,
    pub diabetes_pedigree_function: f64,
    pub prediction: bool,
    pub created_at: NaiveDateTime,
}

impl Patient {
    /// The vitals exactly as stored on this row.
    pub fn features(&self) -> ClinicalFeatures {
        ClinicalFeatures {
            pregnancies: self.pregnancies,
            glucose: self.glucose,
            blood_pressure: self.blood_pressure,
            skin_thickness: self.skin_thickness,
            insulin: self.insulin,
            bmi: self.bmi,
            diabetes_pedigree_function: self.diabetes_pedigree_function,
            age: self.age,
        }
    }

    pub fn prediction_label(&self) -> &'static str {
        inference::label_for(self.prediction)
    }
}

/// Row to insert. The label can only come from a pipeline [`Prediction`].
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = patients)]
pub struct NewPatient {
    doctor_id: i32,
    name: String,
    age: i32,
    pregnancies: i32,
    glucose: f64,
    blood_pressure: f64,
    skin_thickness: f64,
    insulin: f64,
    bmi: f64,
    diabetes_pedigree_function: f64,
    prediction: bool,
}

impl NewPatient {
    pub fn new(doctor_id: i32, intake: PatientIntake, prediction: Prediction) -> Self {
        let f = intake.features;
        Self {
            doctor_id,
            name: intake.name,
            age: f.age,
            pregnancies: f.pregnancies,
            glucose: f.glucose,
            blood_pressure: f.blood_pressure,
            skin_thickness: f.skin_thickness,
            insulin: f.insulin,
            bmi: f.bmi,
            diabetes_pedigree_function: f.diabetes_pedigree_function,
            prediction: prediction.is_high_risk(),
        }
    }

    pub fn doctor_id(&self) -> i32 {
        self.doctor_id
    }

    /// Materialise the stored row once the store has assigned an id.
    pub(crate) fn into_patient(self, id: i32, created_at: NaiveDateTime) -> Patient {
        Patient {
            id,
            doctor_id: self.doctor_id,
            name: self.name,
            age: self.age,
            pregnancies: self.pregnancies,
            glucose: self.glucose,
            blood_pressure: self.blood_pressure,
            skin_thickness: self.skin_thickness,
            insulin: self.insulin,
            bmi: self.bmi,
            diabetes_pedigree_function: self.diabetes_pedigree_function,
            prediction: self.prediction,
            created_at,
        }
    }
}
