extern crate dotenvy;

use actix_web::{App, HttpServer, middleware};
use anyhow::Context;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use mediscore::AppState;
use mediscore::auth::SessionManager;
use mediscore::crypto::SessionKey;
use mediscore::inference::Pipeline;
use mediscore::settings::Settings;
use mediscore::store::{PgStore, ensure_schema};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new().context("loading configuration")?;

    // Refuse to serve without a usable model.
    let pipeline = Pipeline::load(&settings.scaler_path, &settings.model_path)
        .context("loading inference artifacts")?;

    // create db connection pool
    let store = PgStore::connect(&settings.database_url, settings.pool_size)
        .context("connecting to the database")?;
    ensure_schema(store.pool()).context("creating database schema")?;

    let sessions = SessionManager::new(
        SessionKey::from_secret(&settings.secret_key),
        settings.session_ttl(),
        settings.secure_cookies,
    );
    let state = AppState::new(store, pipeline, sessions);

    tracing::info!(host = %settings.host, port = settings.port, "starting server");
    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(middleware::Logger::default())
            .configure(move |cfg| state.configure(cfg))
    })
    .bind((settings.host.as_str(), settings.port))
    .with_context(|| format!("binding {}:{}", settings.host, settings.port))?
    .run()
    .await
    .context("running server")
}
