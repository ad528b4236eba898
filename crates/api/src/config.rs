use chrono::FixedOffset;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Canonical reporting timezone as a fixed offset from UTC, in
    /// minutes. All day boundaries and HH:MM formatting use this zone.
    pub canonical_tz_offset_mins: i32,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3000`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `CANONICAL_TZ_OFFSET_MINS`| `0`                     |
    ///
    /// # Panics
    ///
    /// Panics on unparseable values; misconfiguration should fail fast
    /// at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let canonical_tz_offset_mins: i32 = std::env::var("CANONICAL_TZ_OFFSET_MINS")
            .unwrap_or_else(|_| "0".into())
            .parse()
            .expect("CANONICAL_TZ_OFFSET_MINS must be a valid i32");

        let config = Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            canonical_tz_offset_mins,
        };
        // Validate the offset eagerly so a bad value fails at startup.
        config.canonical_zone();
        config
    }

    /// The canonical reporting timezone.
    pub fn canonical_zone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.canonical_tz_offset_mins * 60)
            .expect("CANONICAL_TZ_OFFSET_MINS must be within +/- 24h")
    }
}
