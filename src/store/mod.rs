//! Doctor and patient record stores.
//!
//! Handlers talk to the two traits below. [`PgStore`] backs them with diesel over
//! an r2d2 pool; [`MemoryStore`] keeps rows in process and is what the test-suite
//! runs against. Both calls are synchronous, so handlers run them under
//! `web::block`.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgStore, ensure_schema};

use crate::models::{Doctor, DoctorChanges, NewDoctor, NewPatient, Patient};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email {0} is already registered")]
    DuplicateEmail(String),
    #[error("doctor {0} does not exist")]
    ForeignKey(i32),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("store lock poisoned")]
    LockPoisoned,
}

pub trait DoctorStore: Send + Sync {
    /// Fails with [`StoreError::DuplicateEmail`] without inserting anything when the email is taken.
    fn create(&self, doctor: NewDoctor) -> Result<Doctor, StoreError>;
    fn find_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError>;
    fn find_by_id(&self, id: i32) -> Result<Option<Doctor>, StoreError>;
    /// `Ok(None)` when no doctor has this id.
    fn update(&self, id: i32, changes: DoctorChanges) -> Result<Option<Doctor>, StoreError>;
}

pub trait PatientStore: Send + Sync {
    fn create(&self, patient: NewPatient) -> Result<Patient, StoreError>;
    /// Ascending id, i.e. insertion order.
    fn list_by_doctor(&self, doctor_id: i32) -> Result<Vec<Patient>, StoreError>;
}
