use chrono::{Duration, FixedOffset, Offset, Utc};
use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::eligibility::WindowPolicy;
use crate::model::mongodb::ensure_indexes_exist;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    #[serde(default)]
    enforce_voting_hours: bool,
    #[serde(default)]
    voting_hours_utc_offset: i32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to verify JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// The offset daily voting hours are read in, or `None` if
    /// `voting_hours_utc_offset` (minutes east of UTC) is out of range.
    pub fn voting_hours_offset(&self) -> Option<FixedOffset> {
        self.voting_hours_utc_offset
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    /// How the voting window is evaluated.
    ///
    /// The offset is checked at ignition; should it still be out of range, UTC is used.
    pub fn window_policy(&self) -> WindowPolicy {
        WindowPolicy {
            enforce_voting_hours: self.enforce_voting_hours,
            offset: self.voting_hours_offset().unwrap_or_else(|| Utc.fix()),
        }
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
        if config.voting_hours_offset().is_none() {
            error!(
                "voting_hours_utc_offset {} is not a valid UTC offset in minutes",
                config.voting_hours_utc_offset
            );
            return Err(rocket);
        }
        if config.enforce_voting_hours {
            info!(
                "Daily voting hours enforced at UTC offset {} minutes",
                config.voting_hours_utc_offset
            );
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
}

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures the indexes exist, and places both a `Client` and a `Database`
/// into managed state.
///
/// Ballot recording uses multi-document transactions, so the database must be
/// a replica set (a single-node one is fine).
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
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "evote".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_policy_offset() {
        let mut config = Config::example();
        config.enforce_voting_hours = true;
        config.voting_hours_utc_offset = 8 * 60;
        let policy = config.window_policy();
        assert!(policy.enforce_voting_hours);
        assert_eq!(policy.offset.local_minus_utc(), 8 * 3600);

        config.voting_hours_utc_offset = 48 * 60;
        assert!(config.voting_hours_offset().is_none());
        assert_eq!(config.window_policy().offset.local_minus_utc(), 0);
    }

    #[test]
    fn huge_offset_does_not_overflow() {
        let mut config = Config::example();
        for offset in [i32::MAX / 2, i32::MAX, i32::MIN] {
            config.voting_hours_utc_offset = offset;
            assert!(config.voting_hours_offset().is_none());
            assert_eq!(config.window_policy().offset.local_minus_utc(), 0);
        }
    }

    #[rocket::async_test]
    async fn invalid_offset_fails_ignition() {
        let figment = rocket::Config::figment()
            .merge(("auth_ttl", 60))
            .merge(("jwt_secret", "test-jwt-secret"))
            .merge(("voting_hours_utc_offset", i32::MAX / 2));
        let result = rocket::custom(figment).attach(ConfigFairing).ignite().await;
        assert!(result.is_err());

        let figment = rocket::Config::figment()
            .merge(("auth_ttl", 60))
            .merge(("jwt_secret", "test-jwt-secret"))
            .merge(("voting_hours_utc_offset", 8 * 60));
        let rocket = rocket::custom(figment)
            .attach(ConfigFairing)
            .ignite()
            .await
            .unwrap();
        let config = rocket.state::<Config>().unwrap();
        assert_eq!(config.window_policy().offset.local_minus_utc(), 8 * 3600);
    }
}
