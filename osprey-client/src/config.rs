//! OpenSearch client configuration.
//!
//! Configuration is built in code with the `with_*` setters, or loaded from
//! a TOML document or from `OSPREY_*` environment variables.
//!
//! ```toml
//! urls = ["http://node-1:9200", "http://node-2:9200"]
//! username = "admin"
//! password = "admin"
//! request_timeout_ms = 30000
//! max_retries = 5
//! retry_status_codes = [429, 503]
//!
//! [headers]
//! X-Opaque-Id = "indexer"
//! ```

use osprey_http::TransportConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::bulk::BulkOutcomePolicy;
use crate::error::{Error, Result};

/// Prefix of the environment variables read by [`ClientConfig::from_env`].
pub const ENV_PREFIX: &str = "OSPREY_";

/// OpenSearch client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// OpenSearch URL(s).
    pub urls: Vec<String>,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout, per attempt.
    pub request_timeout: Duration,
    /// Maximum number of retries per request.
    pub max_retries: u32,
    /// First retry wait.
    pub retry_initial_backoff: Duration,
    /// Waits at or above this stop retrying.
    pub retry_max_backoff: Duration,
    /// Envelope statuses that are retried like transport errors.
    pub retry_status_codes: Vec<u16>,
    /// Enable response compression.
    pub compression: bool,
    /// Headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// User agent override.
    pub user_agent: Option<String>,
    /// Count deletes of missing documents as succeeded bulk items.
    pub delete_not_found_is_success: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:9200")
    }
}

impl ClientConfig {
    /// Create a new configuration with a single URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            password: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_initial_backoff: Duration::from_millis(100),
            retry_max_backoff: Duration::from_secs(8),
            retry_status_codes: Vec::new(),
            compression: true,
            headers: Vec::new(),
            user_agent: None,
            delete_not_found_is_success: false,
        }
    }

    /// Create configuration with multiple URLs for a cluster.
    pub fn cluster<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set basic authentication credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set maximum retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the exponential backoff bounds.
    pub fn with_retry_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.retry_initial_backoff = initial;
        self.retry_max_backoff = max;
        self
    }

    /// Retry responses with these envelope statuses.
    pub fn with_retry_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retry_status_codes = codes.into_iter().collect();
        self
    }

    /// Enable or disable compression.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Count deletes of missing documents as succeeded bulk items.
    pub fn with_delete_not_found_is_success(mut self, enabled: bool) -> Self {
        self.delete_not_found_is_success = enabled;
        self
    }

    /// The outcome policy for bulk responses.
    pub fn bulk_outcome_policy(&self) -> BulkOutcomePolicy {
        BulkOutcomePolicy {
            delete_not_found_is_success: self.delete_not_found_is_success,
        }
    }

    /// Check the configuration for values the client cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.urls.is_empty() {
            return Err(Error::Config("No URLs provided".to_string()));
        }
        if self.urls.iter().any(|u| u.trim().is_empty()) {
            return Err(Error::Config("Empty URL".to_string()));
        }
        if self.retry_initial_backoff > self.retry_max_backoff {
            return Err(Error::Config(format!(
                "retry_initial_backoff ({:?}) exceeds retry_max_backoff ({:?})",
                self.retry_initial_backoff, self.retry_max_backoff
            )));
        }
        // The first retry already waits at least twice the initial backoff.
        if self.max_retries > 0
            && self.retry_max_backoff <= self.retry_initial_backoff.saturating_mul(2)
        {
            return Err(Error::Config(format!(
                "retry_max_backoff ({:?}) must exceed twice retry_initial_backoff ({:?}) when retries are enabled",
                self.retry_max_backoff, self.retry_initial_backoff
            )));
        }
        Ok(())
    }

    /// Transport settings derived from this configuration.
    pub fn transport_config(&self) -> TransportConfig {
        let mut builder = TransportConfig::builder()
            .urls(self.urls.iter().cloned())
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .gzip(self.compression);
        if let Some(username) = &self.username {
            builder = builder.basic_auth(username.clone(), self.password.clone());
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        for (name, value) in &self.headers {
            builder = builder.default_header(name.clone(), value.clone());
        }
        builder.build()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("TOML parse error: {}", e)))?;
        let config = file.apply(Self::default());
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `OSPREY_*` environment variables, reading a `.env` file
    /// first if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Ignore if .env doesn't exist
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from variables supplied by `lookup`, keyed by their full
    /// `OSPREY_*` name.
    ///
    /// Recognized: `URLS` (comma separated), `USERNAME`, `PASSWORD`,
    /// `CONNECT_TIMEOUT_MS`, `REQUEST_TIMEOUT_MS`, `MAX_RETRIES`,
    /// `RETRY_INITIAL_BACKOFF_MS`, `RETRY_MAX_BACKOFF_MS`,
    /// `RETRY_STATUS_CODES` (comma separated), `COMPRESSION`, `USER_AGENT`,
    /// `DELETE_NOT_FOUND_IS_SUCCESS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        let mut config = Self::default();
        if let Some(urls) = var("URLS") {
            config.urls = split_list(&urls).map(str::to_string).collect();
        }
        if let Some(username) = var("USERNAME") {
            config.username = Some(username);
        }
        if let Some(password) = var("PASSWORD") {
            config.password = Some(password);
        }
        if let Some(ms) = var("CONNECT_TIMEOUT_MS") {
            config.connect_timeout = Duration::from_millis(parse_var("CONNECT_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = var("REQUEST_TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(parse_var("REQUEST_TIMEOUT_MS", &ms)?);
        }
        if let Some(n) = var("MAX_RETRIES") {
            config.max_retries = parse_var("MAX_RETRIES", &n)?;
        }
        if let Some(ms) = var("RETRY_INITIAL_BACKOFF_MS") {
            config.retry_initial_backoff =
                Duration::from_millis(parse_var("RETRY_INITIAL_BACKOFF_MS", &ms)?);
        }
        if let Some(ms) = var("RETRY_MAX_BACKOFF_MS") {
            config.retry_max_backoff =
                Duration::from_millis(parse_var("RETRY_MAX_BACKOFF_MS", &ms)?);
        }
        if let Some(codes) = var("RETRY_STATUS_CODES") {
            config.retry_status_codes = split_list(&codes)
                .map(|c| parse_var::<u16>("RETRY_STATUS_CODES", c))
                .collect::<Result<_>>()?;
        }
        if let Some(flag) = var("COMPRESSION") {
            config.compression = parse_bool("COMPRESSION", &flag)?;
        }
        if let Some(user_agent) = var("USER_AGENT") {
            config.user_agent = Some(user_agent);
        }
        if let Some(flag) = var("DELETE_NOT_FOUND_IS_SUCCESS") {
            config.delete_not_found_is_success = parse_bool("DELETE_NOT_FOUND_IS_SUCCESS", &flag)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{}{}: {}", ENV_PREFIX, name, e)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "{}{}: expected a boolean, got {:?}",
            ENV_PREFIX, name, other
        ))),
    }
}

/// On-disk shape of the configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    urls: Option<Vec<String>>,
    username: Option<String>,
    password: Option<String>,
    connect_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    retry_initial_backoff_ms: Option<u64>,
    retry_max_backoff_ms: Option<u64>,
    retry_status_codes: Option<Vec<u16>>,
    compression: Option<bool>,
    user_agent: Option<String>,
    delete_not_found_is_success: Option<bool>,
    headers: BTreeMap<String, String>,
}

impl FileConfig {
    fn apply(self, mut config: ClientConfig) -> ClientConfig {
        if let Some(urls) = self.urls {
            config.urls = urls;
        }
        config.username = self.username.or(config.username);
        config.password = self.password.or(config.password);
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.request_timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
        if let Some(ms) = self.retry_initial_backoff_ms {
            config.retry_initial_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = self.retry_max_backoff_ms {
            config.retry_max_backoff = Duration::from_millis(ms);
        }
        if let Some(codes) = self.retry_status_codes {
            config.retry_status_codes = codes;
        }
        if let Some(compression) = self.compression {
            config.compression = compression;
        }
        config.user_agent = self.user_agent.or(config.user_agent);
        if let Some(flag) = self.delete_not_found_is_success {
            config.delete_not_found_is_success = flag;
        }
        config.headers.extend(self.headers);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.urls, vec!["http://127.0.0.1:9200"]);
        assert_eq!(config.max_retries, 3);
        assert!(config.retry_status_codes.is_empty());
        assert!(!config.delete_not_found_is_success);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_setters() {
        let config = ClientConfig::cluster(["http://a:9200", "http://b:9200"])
            .with_basic_auth("admin", "secret")
            .with_max_retries(7)
            .with_retry_backoff(Duration::from_millis(10), Duration::from_secs(1))
            .with_retry_status_codes([429])
            .with_header("X-Opaque-Id", "job-1")
            .with_delete_not_found_is_success(true);

        assert_eq!(config.urls.len(), 2);
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.retry_status_codes, vec![429]);
        assert!(config.bulk_outcome_policy().delete_not_found_is_success);

        let transport = config.transport_config();
        assert_eq!(transport.urls.len(), 2);
        assert_eq!(transport.username.as_deref(), Some("admin"));
        assert_eq!(transport.default_headers.len(), 1);
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::cluster(Vec::<String>::new()).validate().is_err());
        let config = ClientConfig::default()
            .with_retry_backoff(Duration::from_secs(10), Duration::from_secs(1));
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        // Exponential backoff would refuse even the first retry
        let config = ClientConfig::default()
            .with_retry_backoff(Duration::from_secs(5), Duration::from_secs(8))
            .with_max_retries(3);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = ClientConfig::default()
            .with_retry_backoff(Duration::from_secs(5), Duration::from_secs(8))
            .with_max_retries(0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let config = ClientConfig::from_toml_str(
            r#"
            urls = ["http://node-1:9200", "http://node-2:9200"]
            username = "admin"
            password = "admin"
            request_timeout_ms = 5000
            max_retries = 5
            retry_status_codes = [429, 503]
            delete_not_found_is_success = true

            [headers]
            X-Opaque-Id = "indexer"
            "#,
        )
        .unwrap();

        assert_eq!(config.urls.len(), 2);
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_status_codes, vec![429, 503]);
        assert!(config.delete_not_found_is_success);
        assert_eq!(
            config.headers,
            vec![("X-Opaque-Id".to_string(), "indexer".to_string())]
        );
    }

    #[test]
    fn test_from_toml_str_rejects_unknown_keys() {
        let result = ClientConfig::from_toml_str("max_retry = 5");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OSPREY_URLS", "http://a:9200, http://b:9200"),
            ("OSPREY_MAX_RETRIES", "2"),
            ("OSPREY_RETRY_STATUS_CODES", "429,503"),
            ("OSPREY_COMPRESSION", "off"),
            ("OSPREY_REQUEST_TIMEOUT_MS", "1500"),
        ]);
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.urls, vec!["http://a:9200", "http://b:9200"]);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_status_codes, vec![429, 503]);
        assert!(!config.compression);
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let result = ClientConfig::from_lookup(|k| {
            (k == "OSPREY_MAX_RETRIES").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("OSPREY_MAX_RETRIES")));
    }
}
