use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use super::{DoctorStore, PatientStore, StoreError};
use crate::DbPool;
use crate::models::{Doctor, DoctorChanges, NewDoctor, NewPatient, Patient};
use crate::schema::{doctors, patients};

const SCHEMA_SQL: &str =
    include_str!("../../migrations/2025-01-01-000000_create_doctors_and_patients/up.sql");

pub fn build_pool(database_url: &str, max_size: u32) -> Result<DbPool, r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder().max_size(max_size).build(manager)
}

/// Create the tables when missing. Safe to run on every start.
pub fn ensure_schema(pool: &DbPool) -> Result<(), StoreError> {
    let mut conn = pool.get()?;
    conn.batch_execute(SCHEMA_SQL)?;
    Ok(())
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn connect(database_url: &str, max_size: u32) -> Result<Self, StoreError> {
        Ok(Self::new(build_pool(database_url, max_size)?))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn email_conflict(err: DieselError, email: &str) -> StoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            StoreError::DuplicateEmail(email.to_string())
        }
        other => StoreError::Database(other),
    }
}

impl DoctorStore for PgStore {
    fn create(&self, doctor: NewDoctor) -> Result<Doctor, StoreError> {
        let mut conn = self.pool.get()?;
        // The unique index still catches a concurrent registration between the check and the insert.
        let taken = doctors::table
            .filter(doctors::email.eq(&doctor.email))
            .select(doctors::id)
            .first::<i32>(&mut conn)
            .optional()?;
        if taken.is_some() {
            return Err(StoreError::DuplicateEmail(doctor.email));
        }

        diesel::insert_into(doctors::table)
            .values(&doctor)
            .returning(Doctor::as_returning())
            .get_result(&mut conn)
            .map_err(|e| email_conflict(e, &doctor.email))
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError> {
        let mut conn = self.pool.get()?;
        let doctor = doctors::table
            .filter(doctors::email.eq(email))
            .select(Doctor::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(doctor)
    }

    fn find_by_id(&self, id: i32) -> Result<Option<Doctor>, StoreError> {
        let mut conn = self.pool.get()?;
        let doctor = doctors::table
            .find(id)
            .select(Doctor::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(doctor)
    }

    fn update(&self, id: i32, changes: DoctorChanges) -> Result<Option<Doctor>, StoreError> {
        let mut conn = self.pool.get()?;
        let new_email = changes.email.clone();
        let now = chrono::Utc::now().naive_utc();

        let updated = diesel::update(doctors::table.find(id))
            .set((&changes, doctors::updated_at.eq(now)))
            .returning(Doctor::as_returning())
            .get_result(&mut conn)
            .optional();

        match updated {
            Ok(doctor) => Ok(doctor),
            Err(e) => Err(email_conflict(e, new_email.as_deref().unwrap_or_default())),
        }
    }
}

impl PatientStore for PgStore {
    fn create(&self, patient: NewPatient) -> Result<Patient, StoreError> {
        let mut conn = self.pool.get()?;
        let doctor_id = patient.doctor_id();

        diesel::insert_into(patients::table)
            .values(&patient)
            .returning(Patient::as_returning())
            .get_result(&mut conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                    StoreError::ForeignKey(doctor_id)
                }
                other => StoreError::Database(other),
            })
    }

    fn list_by_doctor(&self, doctor_id: i32) -> Result<Vec<Patient>, StoreError> {
        let mut conn = self.pool.get()?;
        let rows = patients::table
            .filter(patients::doctor_id.eq(doctor_id))
            .order(patients::id.asc())
            .select(Patient::as_select())
            .load(&mut conn)?;
        Ok(rows)
    }
}
