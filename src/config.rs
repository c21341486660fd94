use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub jwt_secret: String,
    /// When unset the service keeps everything in memory.
    pub database_url: Option<String>,
    pub api_rps: u32,
    pub assignment_webhook_url: Option<String>,
    pub app_base_url: String,
    pub rng_seed: Option<u64>,
    /// JSON file loaded into empty collections at startup.
    pub seed_path: Option<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            jwt_secret: get_env("JWT_SECRET")?,
            database_url: get_env_opt("DATABASE_URL"),
            api_rps: get_env_parse_or("API_RPS", 50)?,
            assignment_webhook_url: get_env_opt("ASSIGNMENT_WEBHOOK_URL"),
            app_base_url: get_env_opt("APP_BASE_URL").unwrap_or_default(),
            rng_seed: match get_env_opt("RNG_SEED") {
                Some(_) => Some(get_env_parse("RNG_SEED")?),
                None => None,
            },
            seed_path: get_env_opt("SEED_PATH"),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(_) => get_env_parse(name),
        None => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
