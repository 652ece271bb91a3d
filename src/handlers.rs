use std::collections::HashMap;

use actix_web::http::header;
use actix_web::{HttpResponse, web};
use serde::Serialize;
use serde_json::json;

use crate::auth::{self, AuthenticatedDoctor, Credentials, Registration, SessionManager};
use crate::errors::{AppError, LOGIN_PATH};
use crate::features::PatientIntake;
use crate::inference::Pipeline;
use crate::models::{Doctor, NewPatient, Patient};
use crate::store::{DoctorStore, PatientStore};

type Form = web::Form<HashMap<String, String>>;

#[derive(Debug, Serialize)]
pub struct PatientView<'a> {
    #[serde(flatten)]
    pub patient: &'a Patient,
    pub prediction_label: &'static str,
}

impl<'a> From<&'a Patient> for PatientView<'a> {
    fn from(patient: &'a Patient) -> Self {
        Self {
            patient,
            prediction_label: patient.prediction_label(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PatientList<'a> {
    doctor_name: String,
    patients: Vec<PatientView<'a>>,
}

#[derive(Debug, Serialize)]
struct RecordedPatient<'a> {
    patient: PatientView<'a>,
    prediction: &'static str,
}

pub async fn index() -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, LOGIN_PATH))
        .finish()
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

// Handler to register a new doctor
pub async fn register(
    doctors: web::Data<dyn DoctorStore>,
    form: Form,
) -> Result<HttpResponse, AppError> {
    let registration = Registration::from_form(&form)?;

    let doctor = web::block(move || -> Result<Doctor, AppError> {
        let new_doctor = registration.into_new_doctor()?;
        Ok(doctors.create(new_doctor)?)
    })
    .await??;

    tracing::info!(doctor_id = doctor.id, "registered doctor");
    Ok(HttpResponse::Created().json(doctor))
}

// Handler to open a session
pub async fn login(
    doctors: web::Data<dyn DoctorStore>,
    sessions: web::Data<SessionManager>,
    form: Form,
) -> Result<HttpResponse, AppError> {
    let credentials = Credentials::from_form(&form)?;

    let doctor = web::block(move || auth::authenticate(doctors.get_ref(), &credentials)).await??;
    let cookie = sessions.issue(doctor.id)?;

    tracing::info!(doctor_id = doctor.id, "doctor logged in");
    Ok(HttpResponse::Ok().cookie(cookie).json(doctor))
}

pub async fn logout(sessions: web::Data<SessionManager>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(sessions.clear())
        .json(json!({ "message": "Logged out" }))
}

pub async fn get_profile(
    session: AuthenticatedDoctor,
    doctors: web::Data<dyn DoctorStore>,
) -> Result<HttpResponse, AppError> {
    let doctor = current_doctor(doctors, session).await?;
    Ok(HttpResponse::Ok().json(doctor))
}

pub async fn update_profile(
    session: AuthenticatedDoctor,
    doctors: web::Data<dyn DoctorStore>,
    form: Form,
) -> Result<HttpResponse, AppError> {
    let changes = auth::profile_changes(&form)?;

    let doctor = web::block(move || doctors.update(session.doctor_id, changes))
        .await??
        .ok_or(AppError::Unauthenticated)?;

    tracing::info!(doctor_id = doctor.id, "updated profile");
    Ok(HttpResponse::Ok().json(doctor))
}

// Handler to list the signed-in doctor's patients
pub async fn list_patients(
    session: AuthenticatedDoctor,
    doctors: web::Data<dyn DoctorStore>,
    patients: web::Data<dyn PatientStore>,
) -> Result<HttpResponse, AppError> {
    let doctor = current_doctor(doctors, session).await?;
    let doctor_id = doctor.id;
    let rows = web::block(move || patients.list_by_doctor(doctor_id)).await??;

    Ok(HttpResponse::Ok().json(PatientList {
        doctor_name: doctor.display_name(),
        patients: rows.iter().map(PatientView::from).collect(),
    }))
}

// Handler to score and record a new patient
pub async fn create_patient(
    session: AuthenticatedDoctor,
    doctors: web::Data<dyn DoctorStore>,
    pipeline: web::Data<Pipeline>,
    patients: web::Data<dyn PatientStore>,
    form: Form,
) -> Result<HttpResponse, AppError> {
    let intake = PatientIntake::from_form(&form)?;
    let doctor = current_doctor(doctors, session).await?;

    // The label is computed here, from the same intake that gets stored.
    let prediction = pipeline.predict(&intake.features.to_vector())?;
    let new_patient = NewPatient::new(doctor.id, intake, prediction);

    let patient = web::block(move || patients.create(new_patient)).await??;

    tracing::info!(
        doctor_id = patient.doctor_id,
        patient_id = patient.id,
        high_risk = patient.prediction,
        "recorded patient"
    );
    Ok(HttpResponse::Created().json(RecordedPatient {
        patient: PatientView::from(&patient),
        prediction: prediction.label(),
    }))
}

/// A session whose doctor no longer resolves is treated as no session.
async fn current_doctor(
    doctors: web::Data<dyn DoctorStore>,
    session: AuthenticatedDoctor,
) -> Result<Doctor, AppError> {
    web::block(move || doctors.find_by_id(session.doctor_id))
        .await??
        .ok_or(AppError::Unauthenticated)
}
