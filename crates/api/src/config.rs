//! Application configuration loaded from environment variables.

use entity_store::DEFAULT_PAGE_LIMIT;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory storage when unset
/// - `API_PERMISSIONS`: comma-separated permissions granted to callers (default: `"*"`)
/// - `LIST_PAGE_LIMIT`: page size used when a list request gives none (default: `20`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub permissions: Vec<String>,
    pub page_limit: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            permissions: std::env::var("API_PERMISSIONS")
                .map(|raw| parse_permissions(&raw))
                .unwrap_or(defaults.permissions),
            page_limit: std::env::var("LIST_PAGE_LIMIT")
                .ok()
                .and_then(|l| l.parse().ok())
                .filter(|l| *l > 0)
                .unwrap_or(defaults.page_limit),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            permissions: vec!["*".to_string()],
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Splits a comma-separated permission list, dropping blanks.
pub fn parse_permissions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.permissions, vec!["*"]);
        assert_eq!(config.page_limit, 20);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_permissions() {
        assert_eq!(
            parse_permissions(" brand.view, brand.update ,,placeholder.*"),
            vec!["brand.view", "brand.update", "placeholder.*"]
        );
        assert!(parse_permissions(" , ").is_empty());
    }
}
