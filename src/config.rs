use std::sync::Arc;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::audit::{AuditSink, LogAuditSink};
use crate::model::mongodb::ensure_indexes_exist;
use crate::service::{
    CandidateDesk, ElectionRegistry, RecommendationEngine, ResultsAggregator, VoteEngine,
};
use crate::store::{MongoStore, Store};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // secrets
    jwt_secret: String,
    ballot_salt: String,
}

impl Config {
    /// Secret key used to verify identity tokens.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Secret key mixed into every ballot hash.
    pub fn ballot_salt(&self) -> &[u8] {
        self.ballot_salt.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.ballot_salt.is_empty() {
            error!("`ballot_salt` must not be empty");
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
    // non-secrets
    db_name: Option<String>,
}

/// Database used when `db_name` is not configured.
const DEFAULT_DB_NAME: &str = "elections";

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures the unique indexes exist, and places an `Arc<dyn Store>` into
/// managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db_name = config.db_name.as_deref().unwrap_or(DEFAULT_DB_NAME);
        let db = client.database(db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online, using {db_name}!");

        // Manage the state.
        let store: Arc<dyn Store> = Arc::new(MongoStore::new(client, db));
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// A fairing that builds every engine from the managed store and config,
/// and places each into managed state.
///
/// Must be attached after [`ConfigFairing`] and whichever fairing provides
/// the store.
pub struct ServicesFairing;

#[rocket::async_trait]
impl Fairing for ServicesFairing {
    fn info(&self) -> Info {
        Info {
            name: "Services",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(store) = rocket.state::<Arc<dyn Store>>().cloned() else {
            error!("No store available to build services from");
            return Err(rocket);
        };
        let Some(salt) = rocket.state::<Config>().map(|c| c.ballot_salt().to_vec()) else {
            error!("Application config must be loaded before services");
            return Err(rocket);
        };
        let audit: Arc<dyn AuditSink> = Arc::new(LogAuditSink);

        rocket = rocket
            .manage(ElectionRegistry::new(store.clone(), audit.clone()))
            .manage(RecommendationEngine::new(store.clone(), audit.clone()))
            .manage(CandidateDesk::new(store.clone(), audit.clone()))
            .manage(VoteEngine::new(store.clone(), audit, salt))
            .manage(ResultsAggregator::new(store));
        info!("Services ready");
        Ok(rocket)
    }
}
