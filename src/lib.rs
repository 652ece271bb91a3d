//! Clinical record service that scores each recorded patient for diabetes risk.

use std::sync::Arc;

use actix_web::web;
use diesel::PgConnection;
use diesel::r2d2::{self, ConnectionManager};

pub mod auth;
pub mod crypto;
pub mod errors;
pub mod features;
pub mod handlers;
pub mod inference;
pub mod models;
pub mod schema;
pub mod settings;
pub mod store;

use crate::errors::AppError;
use crate::features::ValidationError;

// Database connection pool type
pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Shared application state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub doctors: Arc<dyn store::DoctorStore>,
    pub patients: Arc<dyn store::PatientStore>,
    pub pipeline: Arc<inference::Pipeline>,
    pub sessions: Arc<auth::SessionManager>,
}

impl AppState {
    /// One backing store serving both record kinds.
    pub fn new<S>(store: S, pipeline: inference::Pipeline, sessions: auth::SessionManager) -> Self
    where
        S: store::DoctorStore + store::PatientStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            doctors: store.clone(),
            patients: store,
            pipeline: Arc::new(pipeline),
            sessions: Arc::new(sessions),
        }
    }

    /// Register state and routes on an `App`.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::from(self.doctors.clone()))
            .app_data(web::Data::from(self.patients.clone()))
            .app_data(web::Data::from(self.pipeline.clone()))
            .app_data(web::Data::from(self.sessions.clone()))
            .app_data(web::FormConfig::default().error_handler(|err, _req| {
                AppError::from(ValidationError::field("form", err.to_string())).into()
            }))
            .route("/", web::get().to(handlers::index))
            .route("/health", web::get().to(handlers::health))
            .route("/register", web::post().to(handlers::register))
            .route("/login", web::post().to(handlers::login))
            .route("/logout", web::post().to(handlers::logout))
            .service(
                web::resource("/profile")
                    .route(web::get().to(handlers::get_profile))
                    .route(web::post().to(handlers::update_profile)),
            )
            .service(
                web::resource("/patients")
                    .route(web::get().to(handlers::list_patients))
                    .route(web::post().to(handlers::create_patient)),
            );
    }
}
