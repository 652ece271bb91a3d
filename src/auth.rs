//! Session/auth gate.
//!
//! Login verifies an Argon2 hash and hands out a sealed session cookie. Every
//! doctor-scoped route takes an [`AuthenticatedDoctor`], which only extracts when
//! that cookie opens under the server key and has not outlived its TTL.

use std::collections::HashMap;
use std::future::{Ready, ready};

use actix_web::cookie::{Cookie, SameSite, time};
use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, web};
use once_cell::sync::Lazy;

use crate::crypto::{CryptoUtils, SessionClaims, SessionKey};
use crate::errors::AppError;
use crate::features::{
    FieldError, ValidationError, optional_text, present, required, required_text, within_length,
};
use crate::models::{
    Doctor, DoctorChanges, EMAIL_MAX_LEN, NAME_MAX_LEN, NewDoctor, PHONE_MAX_LEN, SPECIALTY_MAX_LEN,
};
use crate::store::DoctorStore;

pub const SESSION_COOKIE: &str = "doctor_session";

// Checked when the email is unknown so that both login failures pay for one Argon2 run.
static DECOY_HASH: Lazy<Option<String>> =
    Lazy::new(|| CryptoUtils::hash_password("no such doctor").ok());

/// Issues and resolves session cookies.
#[derive(Debug, Clone)]
pub struct SessionManager {
    key: SessionKey,
    ttl: chrono::Duration,
    secure: bool,
}

impl SessionManager {
    pub fn new(key: SessionKey, ttl: chrono::Duration, secure: bool) -> Self {
        Self { key, ttl, secure }
    }

    pub fn issue(&self, doctor_id: i32) -> Result<Cookie<'static>, AppError> {
        let claims = SessionClaims {
            doctor_id,
            issued_at: chrono::Utc::now().timestamp(),
        };
        let token = self
            .key
            .seal(&claims)
            .map_err(|e| AppError::Internal(format!("sealing session: {e:#}")))?;

        Ok(Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::seconds(self.ttl.num_seconds()))
            .finish())
    }

    /// An expired cookie that makes the browser drop the session.
    pub fn clear(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .finish();
        cookie.make_removal();
        cookie
    }

    pub fn resolve(&self, token: &str) -> Result<SessionClaims, AppError> {
        self.resolve_at(token, chrono::Utc::now().timestamp())
    }

    fn resolve_at(&self, token: &str, now: i64) -> Result<SessionClaims, AppError> {
        let claims = self.key.open(token).map_err(|e| {
            tracing::warn!(error = %e, "rejected session token");
            AppError::Unauthenticated
        })?;

        let age = now - claims.issued_at;
        if age < 0 || age > self.ttl.num_seconds() {
            tracing::warn!(doctor_id = claims.doctor_id, age, "expired session token");
            return Err(AppError::Unauthenticated);
        }
        Ok(claims)
    }
}

/// Identity of the doctor behind the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedDoctor {
    pub doctor_id: i32,
}

impl AuthenticatedDoctor {
    fn from_http(req: &HttpRequest) -> Result<Self, AppError> {
        let sessions = req
            .app_data::<web::Data<SessionManager>>()
            .ok_or_else(|| AppError::Internal("session manager not configured".into()))?;
        let cookie = req.cookie(SESSION_COOKIE).ok_or(AppError::Unauthenticated)?;
        let claims = sessions.resolve(cookie.value())?;
        Ok(Self {
            doctor_id: claims.doctor_id,
        })
    }
}

impl FromRequest for AuthenticatedDoctor {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Self::from_http(req))
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();
        let email = required(form, "email", &mut errors).map(normalize_email);
        // Passwords are taken verbatim, surrounding spaces included.
        let password = match form.get("password") {
            Some(p) if !p.is_empty() => Some(p.clone()),
            _ => {
                errors.push(FieldError {
                    field: "password".into(),
                    message: "is required".into(),
                });
                None
            }
        };
        ValidationError::check(errors)?;
        match (email, password) {
            (Some(email), Some(password)) => Ok(Self { email, password }),
            _ => Err(ValidationError::field("form", "incomplete")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub credentials: Credentials,
    pub specialty: Option<String>,
    pub phone: Option<String>,
}

impl Registration {
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();
        let first_name = required_text(form, "first_name", NAME_MAX_LEN, &mut errors);
        let last_name = required_text(form, "last_name", NAME_MAX_LEN, &mut errors);
        let specialty = optional_text(form, "specialty", SPECIALTY_MAX_LEN, &mut errors);
        let phone = optional_text(form, "phone", PHONE_MAX_LEN, &mut errors);
        let credentials = match Credentials::from_form(form) {
            Ok(c) => Some(c),
            Err(e) => {
                errors.extend(e.errors);
                None
            }
        };
        if let Some(c) = &credentials {
            check_email(&c.email, &mut errors);
        }
        ValidationError::check(errors)?;

        match (first_name, last_name, credentials) {
            (Some(first_name), Some(last_name), Some(credentials)) => Ok(Self {
                first_name,
                last_name,
                credentials,
                specialty,
                phone,
            }),
            _ => Err(ValidationError::field("form", "incomplete")),
        }
    }

    /// Hash the password and build the row. Argon2 is slow, so call this off the async workers.
    pub fn into_new_doctor(self) -> Result<NewDoctor, AppError> {
        let password_hash = CryptoUtils::hash_password(&self.credentials.password)
            .map_err(|e| AppError::Internal(format!("{e:#}")))?;
        Ok(NewDoctor {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.credentials.email,
            password_hash,
            specialty: self.specialty,
            phone: self.phone,
        })
    }
}

/// Blank or absent fields are left unchanged.
pub fn profile_changes(form: &HashMap<String, String>) -> Result<DoctorChanges, ValidationError> {
    let mut errors = Vec::new();
    let first_name = optional_text(form, "first_name", NAME_MAX_LEN, &mut errors);
    let last_name = optional_text(form, "last_name", NAME_MAX_LEN, &mut errors);
    let email = present(form, "email").map(normalize_email);
    if let Some(email) = &email {
        check_email(email, &mut errors);
    }
    let specialty = optional_text(form, "specialty", SPECIALTY_MAX_LEN, &mut errors);
    let phone = optional_text(form, "phone", PHONE_MAX_LEN, &mut errors);
    ValidationError::check(errors)?;
    Ok(DoctorChanges {
        first_name,
        last_name,
        email,
        specialty,
        phone,
    })
}

/// Unknown email and wrong password both come back as `InvalidCredentials`.
pub fn authenticate(doctors: &dyn DoctorStore, credentials: &Credentials) -> Result<Doctor, AppError> {
    let Some(doctor) = doctors.find_by_email(&credentials.email)? else {
        if let Some(decoy) = DECOY_HASH.as_deref() {
            let _ = CryptoUtils::verify_password(&credentials.password, decoy);
        }
        tracing::warn!("login attempt for unknown email");
        return Err(AppError::InvalidCredentials);
    };

    let matches = CryptoUtils::verify_password(&credentials.password, &doctor.password_hash)
        .map_err(|e| AppError::Internal(format!("doctor {}: {e:#}", doctor.id)))?;
    if !matches {
        tracing::warn!(doctor_id = doctor.id, "login failed: wrong password");
        return Err(AppError::InvalidCredentials);
    }
    Ok(doctor)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if !within_length("email", email, EMAIL_MAX_LEN, errors) {
        return;
    }
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !well_formed {
        errors.push(FieldError {
            field: "email".into(),
            message: format!("{email:?} is not a valid email address"),
        });
    }
}
