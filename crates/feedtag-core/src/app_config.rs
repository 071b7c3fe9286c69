use std::path::PathBuf;

/// Credentials and endpoint for the link-shortening service.
#[derive(Clone)]
pub struct ShortenerConfig {
    pub token: String,
    pub domain: String,
    pub base_url: String,
}

impl std::fmt::Debug for ShortenerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortenerConfig")
            .field("token", &"[redacted]")
            .field("domain", &self.domain)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Credentials and table coordinates for the spreadsheet sink.
#[derive(Clone)]
pub struct SheetConfig {
    pub token: String,
    pub doc_id: String,
    pub table_id: String,
    pub base_url: String,
}

impl std::fmt::Debug for SheetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetConfig")
            .field("token", &"[redacted]")
            .field("doc_id", &self.doc_id)
            .field("table_id", &self.table_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
    pub feed_list_path: PathBuf,
    pub raw_dir: PathBuf,
    pub interval_file: PathBuf,
    pub backend_file: PathBuf,
    /// Trailing window length, in seconds.
    pub interval_secs: u64,
    pub prediction_top_k: usize,
    pub query_token_limit: usize,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// `None` when no shortener credentials are configured; links are then left unshortened.
    pub shortener: Option<ShortenerConfig>,
    /// `None` when no spreadsheet credentials are configured; the export step is skipped.
    pub sheet: Option<SheetConfig>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("feed_list_path", &self.feed_list_path)
            .field("raw_dir", &self.raw_dir)
            .field("interval_file", &self.interval_file)
            .field("backend_file", &self.backend_file)
            .field("interval_secs", &self.interval_secs)
            .field("prediction_top_k", &self.prediction_top_k)
            .field("query_token_limit", &self.query_token_limit)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("shortener", &self.shortener)
            .field("sheet", &self.sheet)
            .finish()
    }
}
