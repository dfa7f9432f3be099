#[macro_use]
extern crate rocket;
#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

use config::{ConfigFairing, DatabaseFairing, ServicesFairing};
use logging::LoggerFairing;

/// Assemble the server, backed by MongoDB.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(ServicesFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// Assemble the server around an already-constructed store, with test secrets.
#[cfg(test)]
pub(crate) fn rocket_for_store(store: std::sync::Arc<dyn store::Store>) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("jwt_secret", "test jwt secret"))
        .merge(("ballot_salt", "test ballot salt"))
        .merge(("log_level", "off"));
    rocket::custom(figment)
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(store)
        .attach(ServicesFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}
