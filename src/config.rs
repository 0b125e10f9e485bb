use std::time::Duration;
use std::{env, io};

use serde::Serialize;
use tracing::debug;

const DEFAULT_MIN_INTERVAL_MS: u64 = 1_100;
const DEFAULT_PRIMARY_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_FALLBACK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BATCH_CHUNK_SIZE: usize = 10;
const DEFAULT_BATCH_STAGGER_MS: u64 = 200;
const DEFAULT_CACHE_MAX_AGE_DAYS: u32 = 30;

pub const DEFAULT_NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_VIACEP_BASE_URL: &str = "https://viacep.com.br";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub min_interval_ms: u64,
    pub primary_timeout_ms: u64,
    pub fallback_timeout_ms: u64,
    pub batch_chunk_size: usize,
    pub batch_stagger_ms: u64,
    pub cache_max_age_days: u32,
    pub country_name: String,
    pub country_code: String,
    pub nominatim_base_url: String,
    pub viacep_base_url: String,
    pub user_agent: String,
    pub contact_email: Option<String>,
    pub database_file_name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub min_interval_ms: u64,
    pub primary_timeout_ms: u64,
    pub fallback_timeout_ms: u64,
    pub batch_chunk_size: usize,
    pub batch_stagger_ms: u64,
    pub cache_max_age_days: u32,
    pub country_code: String,
    pub nominatim_base_url: String,
    pub viacep_base_url: String,
    pub database_file_name: String,
    pub has_contact_email: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            min_interval_ms: parse_u64("GEOCODER_MIN_INTERVAL_MS", DEFAULT_MIN_INTERVAL_MS),
            primary_timeout_ms: parse_u64(
                "GEOCODER_PRIMARY_TIMEOUT_MS",
                DEFAULT_PRIMARY_TIMEOUT_MS,
            )
            .max(1),
            fallback_timeout_ms: parse_u64(
                "GEOCODER_FALLBACK_TIMEOUT_MS",
                DEFAULT_FALLBACK_TIMEOUT_MS,
            )
            .max(1),
            batch_chunk_size: parse_usize("GEOCODER_BATCH_CHUNK_SIZE", DEFAULT_BATCH_CHUNK_SIZE)
                .max(1),
            batch_stagger_ms: parse_u64("GEOCODER_BATCH_STAGGER_MS", DEFAULT_BATCH_STAGGER_MS),
            cache_max_age_days: parse_u32(
                "GEOCODER_CACHE_MAX_AGE_DAYS",
                DEFAULT_CACHE_MAX_AGE_DAYS,
            ),
            country_name: non_empty("GEOCODER_COUNTRY_NAME").unwrap_or_else(|| "Brasil".into()),
            country_code: non_empty("GEOCODER_COUNTRY_CODE").unwrap_or_else(|| "br".into()),
            nominatim_base_url: non_empty("NOMINATIM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_NOMINATIM_BASE_URL.into()),
            viacep_base_url: non_empty("VIACEP_BASE_URL")
                .unwrap_or_else(|| DEFAULT_VIACEP_BASE_URL.into()),
            user_agent: non_empty("GEOCODER_USER_AGENT")
                .unwrap_or_else(|| format!("georef/{}", env!("CARGO_PKG_VERSION"))),
            contact_email: non_empty("GEOCODER_CONTACT_EMAIL"),
            database_file_name: non_empty("CACHE_DATABASE_FILE")
                .unwrap_or_else(|| "geocode-cache.db".to_string()),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            min_interval_ms: self.min_interval_ms,
            primary_timeout_ms: self.primary_timeout_ms,
            fallback_timeout_ms: self.fallback_timeout_ms,
            batch_chunk_size: self.batch_chunk_size,
            batch_stagger_ms: self.batch_stagger_ms,
            cache_max_age_days: self.cache_max_age_days,
            country_code: self.country_code.clone(),
            nominatim_base_url: self.nominatim_base_url.clone(),
            viacep_base_url: self.viacep_base_url.clone(),
            database_file_name: self.database_file_name.clone(),
            has_contact_email: self.contact_email.is_some(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }

    pub fn batch_stagger(&self) -> Duration {
        Duration::from_millis(self.batch_stagger_ms)
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}
