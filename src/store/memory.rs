use std::sync::{Arc, Mutex, MutexGuard};

use super::{DoctorStore, PatientStore, StoreError};
use crate::models::{Doctor, DoctorChanges, NewDoctor, NewPatient, Patient};

#[derive(Debug, Default)]
struct Tables {
    doctors: Vec<Doctor>,
    patients: Vec<Patient>,
    next_doctor_id: i32,
    next_patient_id: i32,
}

/// In-process store enforcing the schema's unique email and doctor foreign key.
/// Column widths are checked when forms are parsed, not here.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of doctors registered with `email`.
    pub fn count_doctors_with_email(&self, email: &str) -> usize {
        self.lock()
            .map(|t| t.doctors.iter().filter(|d| d.email == email).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

impl DoctorStore for MemoryStore {
    fn create(&self, doctor: NewDoctor) -> Result<Doctor, StoreError> {
        let mut tables = self.lock()?;
        if tables.doctors.iter().any(|d| d.email == doctor.email) {
            return Err(StoreError::DuplicateEmail(doctor.email));
        }

        tables.next_doctor_id += 1;
        let created_at = now();
        let row = Doctor {
            id: tables.next_doctor_id,
            first_name: doctor.first_name,
            last_name: doctor.last_name,
            email: doctor.email,
            password_hash: doctor.password_hash,
            specialty: doctor.specialty,
            phone: doctor.phone,
            created_at,
            updated_at: created_at,
        };
        tables.doctors.push(row.clone());
        Ok(row)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError> {
        let tables = self.lock()?;
        Ok(tables.doctors.iter().find(|d| d.email == email).cloned())
    }

    fn find_by_id(&self, id: i32) -> Result<Option<Doctor>, StoreError> {
        let tables = self.lock()?;
        Ok(tables.doctors.iter().find(|d| d.id == id).cloned())
    }

    fn update(&self, id: i32, changes: DoctorChanges) -> Result<Option<Doctor>, StoreError> {
        let mut tables = self.lock()?;
        if let Some(email) = &changes.email {
            if tables.doctors.iter().any(|d| d.id != id && &d.email == email) {
                return Err(StoreError::DuplicateEmail(email.clone()));
            }
        }

        let Some(doctor) = tables.doctors.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        changes.apply(doctor);
        doctor.updated_at = now();
        Ok(Some(doctor.clone()))
    }
}

impl PatientStore for MemoryStore {
    fn create(&self, patient: NewPatient) -> Result<Patient, StoreError> {
        let mut tables = self.lock()?;
        let doctor_id = patient.doctor_id();
        if !tables.doctors.iter().any(|d| d.id == doctor_id) {
            return Err(StoreError::ForeignKey(doctor_id));
        }

        tables.next_patient_id += 1;
        let row = patient.into_patient(tables.next_patient_id, now());
        tables.patients.push(row.clone());
        Ok(row)
    }

    fn list_by_doctor(&self, doctor_id: i32) -> Result<Vec<Patient>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .patients
            .iter()
            .filter(|p| p.doctor_id == doctor_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{ClinicalFeatures, PatientIntake};
    use crate::inference::{Classifier, Pipeline, Scaler};

    fn new_doctor(email: &str) -> NewDoctor {
        NewDoctor {
            first_name: "Claire".into(),
            last_name: "Petit".into(),
            email: email.into(),
            password_hash: "hash".into(),
            specialty: None,
            phone: None,
        }
    }

    fn new_patient(doctor_id: i32, name: &str) -> NewPatient {
        let features = ClinicalFeatures {
            pregnancies: 1,
            glucose: 85.0,
            blood_pressure: 66.0,
            skin_thickness: 29.0,
            insulin: 0.0,
            bmi: 26.6,
            diabetes_pedigree_function: 0.351,
            age: 31,
        };
        let pipeline = Pipeline::new(
            Scaler::Standard { mean: vec![0.0; 8], scale: vec![1.0; 8] },
            Classifier::LogisticRegression { coef: vec![0.0; 8], intercept: -1.0 },
        )
        .unwrap();
        let prediction = pipeline.predict(&features.to_vector()).unwrap();
        NewPatient::new(doctor_id, PatientIntake { name: name.into(), features }, prediction)
    }

    #[test]
    fn duplicate_email_creates_no_row() {
        let store = MemoryStore::new();
        DoctorStore::create(&store, new_doctor("a@x.com")).unwrap();
        let err = DoctorStore::create(&store, new_doctor("a@x.com")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(ref e) if e == "a@x.com"));
        assert_eq!(store.count_doctors_with_email("a@x.com"), 1);
    }

    #[test]
    fn finds_by_email_and_id() {
        let store = MemoryStore::new();
        let doctor = DoctorStore::create(&store, new_doctor("b@x.com")).unwrap();
        assert_eq!(store.find_by_email("b@x.com").unwrap(), Some(doctor.clone()));
        assert_eq!(store.find_by_id(doctor.id).unwrap(), Some(doctor));
        assert_eq!(store.find_by_email("nobody@x.com").unwrap(), None);
        assert_eq!(store.find_by_id(99).unwrap(), None);
    }

    #[test]
    fn update_rejects_email_of_another_doctor() {
        let store = MemoryStore::new();
        DoctorStore::create(&store, new_doctor("one@x.com")).unwrap();
        let two = DoctorStore::create(&store, new_doctor("two@x.com")).unwrap();

        let changes = DoctorChanges {
            email: Some("one@x.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(two.id, changes),
            Err(StoreError::DuplicateEmail(_))
        ));

        let same = DoctorChanges {
            email: Some("two@x.com".into()),
            specialty: Some("Cardiology".into()),
            ..Default::default()
        };
        let updated = store.update(two.id, same).unwrap().unwrap();
        assert_eq!(updated.specialty.as_deref(), Some("Cardiology"));
        assert!(store.update(42, DoctorChanges::default()).unwrap().is_none());
    }

    #[test]
    fn patient_needs_existing_doctor() {
        let store = MemoryStore::new();
        let err = PatientStore::create(&store, new_patient(5, "Orphan")).unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey(5)));
    }

    #[test]
    fn patients_are_scoped_to_their_doctor() {
        let store = MemoryStore::new();
        let a = DoctorStore::create(&store, new_doctor("a@x.com")).unwrap();
        let b = DoctorStore::create(&store, new_doctor("b@x.com")).unwrap();

        PatientStore::create(&store, new_patient(a.id, "First")).unwrap();
        PatientStore::create(&store, new_patient(a.id, "Second")).unwrap();
        PatientStore::create(&store, new_patient(b.id, "Other")).unwrap();

        let names: Vec<_> = store
            .list_by_doctor(a.id)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["First", "Second"]);

        let of_b = store.list_by_doctor(b.id).unwrap();
        assert_eq!(of_b.len(), 1);
        assert!(of_b.iter().all(|p| p.doctor_id == b.id));
    }
}
