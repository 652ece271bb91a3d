use std::path::PathBuf;

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::{StatusCode, header};
use actix_web::{App, test};
use serde_json::Value;

use mediscore::AppState;
use mediscore::auth::{SESSION_COOKIE, SessionManager};
use mediscore::crypto::SessionKey;
use mediscore::features::ClinicalFeatures;
use mediscore::inference::Pipeline;
use mediscore::store::{MemoryStore, PatientStore};

fn pipeline() -> Pipeline {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    Pipeline::load(&dir.join("scaler.json"), &dir.join("logistic_regression.json")).unwrap()
}

fn state(store: &MemoryStore) -> AppState {
    let sessions = SessionManager::new(
        SessionKey::from_secret("integration-secret"),
        chrono::Duration::hours(1),
        false,
    );
    AppState::new(store.clone(), pipeline(), sessions)
}

macro_rules! app {
    ($store:expr) => {{
        let state = state($store);
        test::init_service(App::new().configure(move |cfg| state.configure(cfg))).await
    }};
}

fn registration(email: &str) -> Vec<(&'static str, String)> {
    vec![
        ("first_name", "Amina".to_string()),
        ("last_name", "Diallo".to_string()),
        ("email", email.to_string()),
        ("password", "p".to_string()),
        ("specialty", "Endocrinology".to_string()),
    ]
}

fn high_risk_patient(name: &str) -> Vec<(&'static str, String)> {
    vec![
        ("name", name.to_string()),
        ("pregnancies", "6".into()),
        ("glucose", "148".into()),
        ("blood_pressure", "72".into()),
        ("skin_thickness", "35".into()),
        ("insulin", "0".into()),
        ("bmi", "33.6".into()),
        ("diabetes_pedigree_function", "0.627".into()),
        ("age", "50".into()),
    ]
}

fn low_risk_patient(name: &str) -> Vec<(&'static str, String)> {
    vec![
        ("name", name.to_string()),
        ("pregnancies", "1".into()),
        ("glucose", "85".into()),
        ("blood_pressure", "66".into()),
        ("skin_thickness", "29".into()),
        ("insulin", "0".into()),
        ("bmi", "26.6".into()),
        ("diabetes_pedigree_function", "0.351".into()),
        ("age", "31".into()),
    ]
}

fn session_cookie(resp: &ServiceResponse) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.into_owned())
}

macro_rules! register_and_login {
    ($app:expr, $email:expr) => {{
        let email: &str = $email;
        let req = test::TestRequest::post()
            .uri("/register")
            .set_form(registration(email))
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/login")
            .set_form([("email", email), ("password", "p")])
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        session_cookie(&resp).expect("login sets a session cookie")
    }};
}

#[actix_web::test]
async fn duplicate_registration_keeps_one_row() {
    let store = MemoryStore::new();
    let app = app!(&store);

    let first = test::TestRequest::post()
        .uri("/register")
        .set_form(registration("a@x.com"))
        .to_request();
    let resp = test::call_service(&app, first).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["email"], "a@x.com");
    assert!(body.get("password_hash").is_none());

    let second = test::TestRequest::post()
        .uri("/register")
        .set_form(registration("a@x.com"))
        .to_request();
    let resp = test::call_service(&app, second).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "DUPLICATE_EMAIL");

    assert_eq!(store.count_doctors_with_email("a@x.com"), 1);
}

#[actix_web::test]
async fn wrong_password_sets_no_session() {
    let store = MemoryStore::new();
    let app = app!(&store);
    register_and_login!(&app, "a@x.com");

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("email", "a@x.com"), ("password", "wrong")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&resp).is_none());
}

#[actix_web::test]
async fn patient_routes_require_a_session() {
    let store = MemoryStore::new();
    let app = app!(&store);

    let req = test::TestRequest::get().uri("/patients").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");

    let req = test::TestRequest::post()
        .uri("/patients")
        .cookie(Cookie::new(SESSION_COOKIE, "forged"))
        .set_form(high_risk_patient("Eve"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
}

#[actix_web::test]
async fn stored_prediction_matches_stored_features() {
    let store = MemoryStore::new();
    let app = app!(&store);
    let cookie = register_and_login!(&app, "a@x.com");

    for form in [high_risk_patient("Jeanne"), low_risk_patient("Paul")] {
        let req = test::TestRequest::post()
            .uri("/patients")
            .cookie(cookie.clone())
            .set_form(form)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let rows = store.list_by_doctor(1).unwrap();
    assert_eq!(rows.len(), 2);
    let pipeline = pipeline();
    for row in &rows {
        let recomputed = pipeline.predict(&row.features().to_vector()).unwrap();
        assert_eq!(row.prediction, recomputed.is_high_risk());
    }
    assert!(rows[0].prediction);
    assert!(!rows[1].prediction);
    assert_eq!(
        rows[0].features(),
        ClinicalFeatures {
            pregnancies: 6,
            glucose: 148.0,
            blood_pressure: 72.0,
            skin_thickness: 35.0,
            insulin: 0.0,
            bmi: 33.6,
            diabetes_pedigree_function: 0.627,
            age: 50,
        }
    );
}

#[actix_web::test]
async fn create_patient_reports_label() {
    let store = MemoryStore::new();
    let app = app!(&store);
    let cookie = register_and_login!(&app, "a@x.com");

    let req = test::TestRequest::post()
        .uri("/patients")
        .cookie(cookie)
        .set_form(high_risk_patient("Jeanne"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["prediction"], "Diabétique");
    assert_eq!(body["patient"]["name"], "Jeanne");
    assert_eq!(body["patient"]["prediction"], true);
    assert_eq!(body["patient"]["prediction_label"], "Diabétique");
}

#[actix_web::test]
async fn invalid_vitals_are_rejected_without_a_row() {
    let store = MemoryStore::new();
    let app = app!(&store);
    let cookie = register_and_login!(&app, "a@x.com");

    let mut form = high_risk_patient("Jeanne");
    form.retain(|(k, _)| *k != "insulin");
    form.push(("glucose", "lots".into()));
    form.retain(|(k, v)| !(*k == "glucose" && v == "148"));

    let req = test::TestRequest::post()
        .uri("/patients")
        .cookie(cookie)
        .set_form(form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    let fields: Vec<_> = body["error"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap().to_string())
        .collect();
    assert!(fields.contains(&"insulin".to_string()));
    assert!(fields.contains(&"glucose".to_string()));
    assert!(store.list_by_doctor(1).unwrap().is_empty());
}

#[actix_web::test]
async fn doctors_only_see_their_own_patients() {
    let store = MemoryStore::new();
    let app = app!(&store);
    let alice = register_and_login!(&app, "alice@x.com");
    let bob = register_and_login!(&app, "bob@x.com");

    let req = test::TestRequest::post()
        .uri("/patients")
        .cookie(alice.clone())
        .set_form(high_risk_patient("Alice's patient"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get().uri("/patients").cookie(bob).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["patients"].as_array().unwrap().len(), 0);

    let req = test::TestRequest::get().uri("/patients").cookie(alice).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["doctor_name"], "Amina Diallo");
    let patients = body["patients"].as_array().unwrap();
    assert_eq!(patients.len(), 1);
    assert_eq!(patients[0]["name"], "Alice's patient");
}

#[actix_web::test]
async fn profile_update_changes_only_given_fields() {
    let store = MemoryStore::new();
    let app = app!(&store);
    register_and_login!(&app, "taken@x.com");
    let cookie = register_and_login!(&app, "a@x.com");

    let req = test::TestRequest::post()
        .uri("/profile")
        .cookie(cookie.clone())
        .set_form([("phone", "0102030405"), ("last_name", "")])
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["phone"], "0102030405");
    assert_eq!(body["last_name"], "Diallo");
    assert_eq!(body["specialty"], "Endocrinology");

    let req = test::TestRequest::post()
        .uri("/profile")
        .cookie(cookie.clone())
        .set_form([("email", "taken@x.com")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get().uri("/profile").cookie(cookie).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["email"], "a@x.com");
}

fn field_names(body: &Value) -> Vec<String> {
    body["error"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap().to_string())
        .collect()
}

#[actix_web::test]
async fn values_wider_than_their_columns_are_rejected() {
    let store = MemoryStore::new();
    let app = app!(&store);

    let mut form = registration("long@x.com");
    form[0].1 = "a".repeat(101);
    let req = test::TestRequest::post().uri("/register").set_form(form).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(field_names(&body), ["first_name"]);
    assert_eq!(store.count_doctors_with_email("long@x.com"), 0);

    let cookie = register_and_login!(&app, "a@x.com");

    let req = test::TestRequest::post()
        .uri("/profile")
        .cookie(cookie.clone())
        .set_form([("phone", "0".repeat(21))])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(field_names(&body), ["phone"]);

    let mut form = high_risk_patient("");
    form[0].1 = "n".repeat(151);
    let req = test::TestRequest::post()
        .uri("/patients")
        .cookie(cookie)
        .set_form(form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(field_names(&body), ["name"]);
    assert!(store.list_by_doctor(1).unwrap().is_empty());
}

#[actix_web::test]
async fn logout_expires_the_cookie() {
    let store = MemoryStore::new();
    let app = app!(&store);

    let req = test::TestRequest::post().uri("/logout").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = session_cookie(&resp).expect("logout resets the cookie");
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.max_age(), Some(actix_web::cookie::time::Duration::ZERO));
}

#[actix_web::test]
async fn root_redirects_to_login() {
    let store = MemoryStore::new();
    let app = app!(&store);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
