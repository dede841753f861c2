//! Configuration for the server.

use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub admin_api_key: String,
    pub simulation: SimulationConfig,
}

/// Simulation policy knobs. Probabilities are per tick, per match.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub tick_interval_secs: u64,
    pub goal_probability: f64,
    pub finish_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
            goal_probability: 0.05,
            finish_probability: 0.3,
        }
    }
}

/// Parse an env var, warning instead of silently dropping a bad value.
fn parsed_env<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring unparseable {}={:?}, using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn probability_env(name: &str, default: f64) -> f64 {
    let value = parsed_env(name, default);
    if !(0.0..=1.0).contains(&value) {
        tracing::warn!("{}={} is outside [0, 1], clamping", name, value);
    }
    value.clamp(0.0, 1.0)
}

impl Config {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = parsed_env("PORT", 8080);
        let database_path = std::env::var("DATABASE_PATH")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map(|s| PathBuf::from(s.trim_start_matches("sqlite:")))
            .unwrap_or_else(|_| PathBuf::from("./data/scores.db"));
        let admin_api_key =
            std::env::var("ADMIN_API_KEY").map_err(|_| std::env::VarError::NotPresent)?;

        let defaults = SimulationConfig::default();
        let mut tick_interval_secs =
            parsed_env("SIM_TICK_SECS", defaults.tick_interval_secs);
        if tick_interval_secs == 0 {
            tracing::warn!("SIM_TICK_SECS=0 is not a usable interval, using 1");
            tick_interval_secs = 1;
        }
        let goal_probability = probability_env("GOAL_PROBABILITY", defaults.goal_probability);
        let finish_probability =
            probability_env("FINISH_PROBABILITY", defaults.finish_probability);

        Ok(Self {
            host,
            port,
            database_path,
            admin_api_key,
            simulation: SimulationConfig {
                tick_interval_secs,
                goal_probability,
                finish_probability,
            },
        })
    }

    pub fn for_test(database_path: PathBuf, admin_api_key: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_path,
            admin_api_key: admin_api_key.to_string(),
            simulation: SimulationConfig::default(),
        }
    }
}
