use crate::app_config::{AppConfig, SheetConfig, ShortenerConfig};
use crate::ConfigError;

const DEFAULT_SHORTENER_BASE_URL: &str = "https://api.short.io";
const DEFAULT_SHEET_BASE_URL: &str = "https://coda.io/apis/v1";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    // Empty values count as unset, as blank `.env` template lines do.
    let present = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|value| !value.trim().is_empty())
    };

    let require = |var: &str| -> Result<String, ConfigError> {
        present(var).ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default =
        |var: &str, default: &str| -> String { present(var).unwrap_or_else(|| default.to_string()) };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        match raw.parse::<usize>() {
            Ok(0) => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be at least 1".to_string(),
            }),
            Ok(value) => Ok(value),
            Err(e) => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            }),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let log_level = or_default("FEEDTAG_LOG_LEVEL", "info");

    let feed_list_path = PathBuf::from(or_default("FEEDTAG_FEED_LIST", "links.txt"));
    let raw_dir = PathBuf::from(or_default("FEEDTAG_RAW_DIR", "raw_csv"));
    let interval_file = PathBuf::from(or_default("FEEDTAG_INTERVAL_FILE", "interval_data.csv"));
    let backend_file = PathBuf::from(or_default("FEEDTAG_BACKEND_FILE", "Finalize Backend.csv"));

    let interval_secs = parse_u64("FEEDTAG_INTERVAL_SECS", "3600")?;
    if interval_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "FEEDTAG_INTERVAL_SECS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let prediction_top_k = parse_positive_usize("FEEDTAG_PREDICTION_TOP_K", "1")?;
    let query_token_limit = parse_positive_usize("FEEDTAG_QUERY_TOKENS", "800")?;
    let http_timeout_secs = parse_u64("FEEDTAG_HTTP_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("FEEDTAG_USER_AGENT", "feedtag/0.1 (rss-tagging)");

    let db_max_connections = parse_u32("FEEDTAG_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections = parse_u32("FEEDTAG_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("FEEDTAG_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let shortener = match present("SHORT_IO_TOKEN") {
        Some(token) => Some(ShortenerConfig {
            token,
            domain: require("SHORT_IO_DOMAIN")?,
            base_url: or_default("SHORT_IO_BASE_URL", DEFAULT_SHORTENER_BASE_URL),
        }),
        None => None,
    };

    let sheet = match present("CODA_TOKEN") {
        Some(token) => Some(SheetConfig {
            token,
            doc_id: require("CODA_DOC")?,
            table_id: require("CODA_TABLE")?,
            base_url: or_default("CODA_BASE_URL", DEFAULT_SHEET_BASE_URL),
        }),
        None => None,
    };

    Ok(AppConfig {
        database_url,
        log_level,
        feed_list_path,
        raw_dir,
        interval_file,
        backend_file,
        interval_secs,
        prediction_top_k,
        query_token_limit,
        http_timeout_secs,
        user_agent,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        shortener,
        sheet,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
