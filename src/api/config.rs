/// Where the marketplace backend lives.
///
/// The base URL already includes the `/api` prefix; operation paths are
/// appended to it. Overridable through the environment for pointing the
/// console at a staging or production backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
}

/// Environment variable that overrides the backend base URL.
pub const BASE_URL_VAR: &str = "SOUK_API_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8085/api";

impl ApiConfig {
    /// Creates a configuration with an explicit base URL.
    ///
    /// A trailing slash is stripped so path joining stays uniform.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Reads the base URL from `SOUK_API_URL`, defaulting to the local
    /// development backend.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(BASE_URL_VAR) {
            Ok(url) if !url.is_empty() => Self::new(&url),
            _ => Self::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_local_backend() {
        assert_eq!(ApiConfig::default().base_url, "http://localhost:8085/api");
    }

    #[test]
    fn test_trailing_slash_is_stripped() {
        let config = ApiConfig::new("http://staging.example.com/api/");
        assert_eq!(config.base_url, "http://staging.example.com/api");
    }
}
