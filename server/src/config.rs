use serde::Serialize;

const DEFAULT_REDIS_PREFIX: &str = "funnel:";
const DEFAULT_HTTP_RATE_LIMIT_PER_SECOND: u64 = 50;
const DEFAULT_HTTP_RATE_LIMIT_BURST: u32 = 100;
const DEFAULT_POSTBACK_RATE_LIMIT_PER_MINUTE: u64 = 600;
const DEFAULT_POSTBACK_RATE_LIMIT_BURST: u32 = 60;
const DEFAULT_HTTP_BODY_LIMIT_BYTES: usize = 16 * 1024;

/// Transport and persistence settings for the HTTP service.
///
/// Limits set to `None` are disabled.
#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    /// Redis URL for player records; the in-memory store is used when unset.
    pub redis_url: Option<String>,
    pub redis_prefix: String,
    pub http_rate_limit_per_second: Option<u64>,
    pub http_rate_limit_burst: Option<u32>,
    pub postback_rate_limit_per_minute: Option<u64>,
    pub postback_rate_limit_burst: Option<u32>,
    pub http_body_limit_bytes: Option<usize>,
    /// Browser origins allowed by CORS. `*` allows any.
    pub allowed_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub metrics_auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_prefix: DEFAULT_REDIS_PREFIX.to_string(),
            http_rate_limit_per_second: Some(DEFAULT_HTTP_RATE_LIMIT_PER_SECOND),
            http_rate_limit_burst: Some(DEFAULT_HTTP_RATE_LIMIT_BURST),
            postback_rate_limit_per_minute: Some(DEFAULT_POSTBACK_RATE_LIMIT_PER_MINUTE),
            postback_rate_limit_burst: Some(DEFAULT_POSTBACK_RATE_LIMIT_BURST),
            http_body_limit_bytes: Some(DEFAULT_HTTP_BODY_LIMIT_BYTES),
            allowed_origins: vec!["*".to_string()],
            metrics_auth_token: None,
        }
    }
}

impl ServerConfig {
    /// Config for tests and local tooling: no rate limits, open CORS.
    pub fn unlimited() -> Self {
        Self {
            http_rate_limit_per_second: None,
            http_rate_limit_burst: None,
            postback_rate_limit_per_minute: None,
            postback_rate_limit_burst: None,
            ..Self::default()
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }
}

/// Parses a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://a.example, ,https://b.example "),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert!(config.allows_any_origin());
        assert_eq!(config.redis_prefix, "funnel:");

        let config = ServerConfig::unlimited();
        assert_eq!(config.http_rate_limit_per_second, None);
        assert_eq!(config.postback_rate_limit_burst, None);
    }
}
