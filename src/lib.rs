#[macro_use]
extern crate rocket;

use std::sync::Arc;

use error::BackendError;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::action_log::{ActionLogger, FileActionLog};
use crate::config::Config;
use crate::data::store::{Collection, Database, JsonFileStore};
use crate::data::user::db::UserDbExt;
use crate::enrollment::registrar::Registrar;
use crate::enrollment::RulesEngine;
use crate::error::ConfigurationError;
use crate::route::mount_api;
use crate::security::Security;

pub mod action_log;
pub mod config;
pub mod data;
pub mod enrollment;
pub mod error;
pub mod resp;
pub mod role;
pub mod route;
pub mod security;
pub mod util;

pub fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        if let Err(err) = tracing_log::LogTracer::init() {
            eprintln!("Unable to forward log records: {}", err);
        }

        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();
        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = match Config::load() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            c
        }
        Err(ConfigurationError::NotFound(_)) => {
            let c = Config::default();
            if c.save().is_err() {
                tracing::warn!("Unable to save generated configuration.");
            }
            c
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            return Err(other.into());
        }
    };

    build(c)
}

/// Assembles the backend around `c` without touching global state.
pub fn build(c: Config) -> Result<Rocket<Build>, BackendError> {
    tracing::info!("Initializing token signing secret...");
    let security = Security::load(&c.security_dir).map_err(BackendError::Security)?;

    tracing::info!("Using data directory: {}", c.data_dir.display());
    let db = Database::new(JsonFileStore::new(&c.data_dir));
    for collection in Collection::ALL {
        if !db.is_initialized(collection) {
            tracing::info!("Initializing empty '{}' collection.", collection);
            db.save::<serde_json::Value>(collection, &[])?;
        }
    }

    db.seed_admin(&c.seed_admin).map_err(BackendError::Seed)?;

    let log = match &c.action_log_path {
        Some(path) => {
            tracing::info!("Writing action log to: {}", path.display());
            ActionLogger::new(Arc::new(FileActionLog::new(path)))
        }
        None => ActionLogger::default(),
    };

    if c.enforce_prerequisites {
        tracing::info!("Course prerequisites are enforced.");
    }
    let registrar = Registrar::new(
        db.clone(),
        RulesEngine::new(c.enforce_prerequisites),
        log.clone(),
    );

    tracing::info!("Starting HTTP server...");
    let mut r = rocket::build()
        .manage(c)
        .manage(security)
        .manage(db)
        .manage(log)
        .manage(registrar);

    tracing::info!("Setting up CORS...");
    let cors = rocket_cors::CorsOptions {
        allowed_origins: AllowedOrigins::All,
        allowed_methods: vec![Method::Get, Method::Put, Method::Post, Method::Delete]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: AllowedHeaders::All,
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?;

    r = r.attach(cors);
    r = mount_api(r);

    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::CollectionStore;

    #[test]
    fn build_initializes_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let c = Config::rooted(dir.path());
        build(c.clone()).expect("unable to build backend");

        let store = JsonFileStore::new(&c.data_dir);
        for collection in Collection::ALL {
            assert!(store.path(collection).exists(), "{} missing", collection);
        }
        let users = store.load(Collection::Users).expect("users not stored");
        assert_eq!(users.len(), 1);
        assert!(c.security_dir.join("auth_token.secret").exists());

        // A second start keeps the seeded admin and the signing secret.
        let secret = std::fs::read(c.security_dir.join("auth_token.secret")).unwrap();
        build(c.clone()).expect("unable to rebuild backend");
        assert_eq!(store.load(Collection::Users).unwrap().len(), 1);
        assert_eq!(
            std::fs::read(c.security_dir.join("auth_token.secret")).unwrap(),
            secret
        );
    }
}
