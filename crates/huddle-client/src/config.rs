//! Client configuration loaded from environment variables.
//!
//! Every setting has a default that points at a locally running backend, so
//! the client starts with zero configuration during development.

use std::time::Duration;

use url::Url;

use huddle_net::BackoffPolicy;
use huddle_store::SummaryPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api/";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root of the REST API. Always ends with `/`.
    /// Env: `HUDDLE_BASE_URL`
    /// Default: `http://localhost:3000/api/`
    pub base_url: String,

    /// Origin of the real-time server.
    /// Env: `HUDDLE_SOCKET_URL`
    /// Default: the origin of `base_url`.
    pub socket_url: String,

    /// Bearer token sent with every request, for deployments that do not
    /// authenticate with the session cookie.
    /// Env: `HUDDLE_AUTH_TOKEN`
    /// Default: none.
    pub auth_token: Option<String>,

    /// Env: `HUDDLE_RECONNECT_ATTEMPTS` (0 disables), `HUDDLE_RECONNECT_BASE_MS`,
    /// `HUDDLE_RECONNECT_MAX_MS`
    /// Default: 5 attempts, 500 ms doubling up to 30 s.
    pub reconnect: BackoffPolicy,

    /// Env: `HUDDLE_SUMMARY_POLICY` (`receipt` | `causal`)
    /// Default: `receipt`
    pub summary_policy: SummaryPolicy,

    /// Env: `HUDDLE_HTTP_TIMEOUT_SECS`
    /// Default: 30
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            socket_url: "http://localhost:3000".to_string(),
            auth_token: None,
            reconnect: BackoffPolicy::default(),
            summary_policy: SummaryPolicy::default(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("HUDDLE_BASE_URL") {
            match normalize_base_url(&raw) {
                Some(url) => {
                    config.socket_url = url.origin().ascii_serialization();
                    config.base_url = url.to_string();
                }
                None => tracing::warn!(value = %raw, "Invalid HUDDLE_BASE_URL, using default"),
            }
        }

        if let Some(raw) = lookup("HUDDLE_SOCKET_URL") {
            if Url::parse(&raw).is_ok() {
                config.socket_url = raw;
            } else {
                tracing::warn!(value = %raw, "Invalid HUDDLE_SOCKET_URL, using default");
            }
        }

        if let Some(token) = lookup("HUDDLE_AUTH_TOKEN") {
            if !token.is_empty() {
                config.auth_token = Some(token);
            }
        }

        if let Some(n) = parse_var::<u32>(&lookup, "HUDDLE_RECONNECT_ATTEMPTS") {
            config.reconnect.max_attempts = n;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "HUDDLE_RECONNECT_BASE_MS") {
            config.reconnect.base = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "HUDDLE_RECONNECT_MAX_MS") {
            config.reconnect.max = Duration::from_millis(ms);
        }
        if config.reconnect.max < config.reconnect.base {
            tracing::warn!("HUDDLE_RECONNECT_MAX_MS below base delay, raising it");
            config.reconnect.max = config.reconnect.base;
        }

        if let Some(raw) = lookup("HUDDLE_SUMMARY_POLICY") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "receipt" => config.summary_policy = SummaryPolicy::Receipt,
                "causal" => config.summary_policy = SummaryPolicy::Causal,
                _ => tracing::warn!(value = %raw, "Invalid HUDDLE_SUMMARY_POLICY, using default"),
            }
        }

        if let Some(secs) = parse_var::<u64>(&lookup, "HUDDLE_HTTP_TIMEOUT_SECS") {
            if secs > 0 {
                config.http_timeout = Duration::from_secs(secs);
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid number, using default");
            None
        }
    }
}

/// Parse an http(s) URL and make sure its path ends with `/`, so relative
/// endpoint paths join underneath it.
fn normalize_base_url(raw: &str) -> Option<Url> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ClientConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.socket_url, "http://localhost:3000");
        assert_eq!(config.reconnect, BackoffPolicy::default());
        assert_eq!(config.summary_policy, SummaryPolicy::Receipt);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_base_url_sets_socket_origin() {
        let config = config_from(&[("HUDDLE_BASE_URL", "https://chat.example.com/api")]);
        assert_eq!(config.base_url, "https://chat.example.com/api/");
        assert_eq!(config.socket_url, "https://chat.example.com");

        let config = config_from(&[
            ("HUDDLE_BASE_URL", "https://chat.example.com/api/"),
            ("HUDDLE_SOCKET_URL", "https://rt.example.com"),
        ]);
        assert_eq!(config.socket_url, "https://rt.example.com");
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[
            ("HUDDLE_BASE_URL", "ftp://nope"),
            ("HUDDLE_RECONNECT_ATTEMPTS", "many"),
            ("HUDDLE_SUMMARY_POLICY", "newest"),
            ("HUDDLE_HTTP_TIMEOUT_SECS", "0"),
        ]);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.summary_policy, SummaryPolicy::Receipt);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_reconnect_and_policy_overrides() {
        let config = config_from(&[
            ("HUDDLE_RECONNECT_ATTEMPTS", "0"),
            ("HUDDLE_RECONNECT_BASE_MS", "2000"),
            ("HUDDLE_RECONNECT_MAX_MS", "1000"),
            ("HUDDLE_SUMMARY_POLICY", "Causal"),
            ("HUDDLE_AUTH_TOKEN", "t0k"),
        ]);
        assert!(!config.reconnect.is_enabled());
        assert_eq!(config.reconnect.base, Duration::from_secs(2));
        assert_eq!(config.reconnect.max, Duration::from_secs(2));
        assert_eq!(config.summary_policy, SummaryPolicy::Causal);
        assert_eq!(config.auth_token.as_deref(), Some("t0k"));
    }
}
