//! reqwest-backed transport.

use async_trait::async_trait;
use base64::Engine;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};
use url::Url;

use crate::{Result, Transport, TransportConfig, TransportError, TransportRequest, TransportResponse};

/// HTTP transport rotating over the configured node URLs.
#[derive(Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
    urls: Arc<Vec<Url>>,
    next_url: Arc<AtomicUsize>,
    default_headers: Arc<HeaderMap>,
    timeout: std::time::Duration,
}

impl ReqwestTransport {
    /// Create a transport from its configuration.
    pub fn new(config: &TransportConfig) -> Result<Self> {
        if config.urls.is_empty() {
            return Err(TransportError::InvalidUrl("no node URLs configured".to_string()));
        }
        let urls = config
            .urls
            .iter()
            .map(|raw| Url::parse(raw))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| TransportError::Request(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| TransportError::Request(format!("invalid header value: {e}")))?;
            default_headers.insert(name, value);
        }
        if let Some(username) = &config.username {
            let credentials = match &config.password {
                Some(p) => format!("{}:{}", username, p),
                None => format!("{}:", username),
            };
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            let mut value = HeaderValue::try_from(format!("Basic {}", encoded))
                .map_err(|e| TransportError::Request(e.to_string()))?;
            value.set_sensitive(true);
            default_headers.insert(http::header::AUTHORIZATION, value);
        }

        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(config.gzip)
            .build()?;

        debug!(urls = ?config.urls, "Created HTTP transport");

        Ok(Self {
            inner,
            urls: Arc::new(urls),
            next_url: Arc::new(AtomicUsize::new(0)),
            default_headers: Arc::new(default_headers),
            timeout: config.timeout,
        })
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Pick the next node URL, round-robin.
    fn next_base(&self) -> &Url {
        let idx = self.next_url.fetch_add(1, Ordering::Relaxed) % self.urls.len();
        &self.urls[idx]
    }

    /// Build the full URL for a request.
    fn build_url(&self, request: &TransportRequest) -> Result<Url> {
        let mut url = self.next_base().clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        let path = request.path.trim_start_matches('/');
        url.set_path(&format!("{}/{}", base_path, path));

        if !request.params.is_empty() {
            let mut query_pairs = url.query_pairs_mut();
            for (key, value) in &request.params {
                query_pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if error.is_connect() {
            TransportError::Connection(error.to_string())
        } else {
            TransportError::Http(error)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let url = self.build_url(&request)?;
        trace!(method = %request.method, %url, "Sending request");

        let mut builder = self.inner.request(request.method.clone(), url);

        for (name, value) in self.default_headers.iter() {
            builder = builder.header(name, value);
        }
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        TransportResponse::from_reqwest(response)
            .await
            .map_err(|e| match e {
                TransportError::Http(e) => self.classify(e),
                other => other,
            })
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("urls", &self.urls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_requires_urls() {
        let config = TransportConfig::builder().urls(Vec::<String>::new()).build();
        assert!(matches!(
            ReqwestTransport::new(&config),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_build_url_keeps_base_path() {
        let config = TransportConfig::builder()
            .url("http://localhost:9200/proxy/")
            .build();
        let transport = ReqwestTransport::new(&config).unwrap();
        let request = TransportRequest::new(Method::POST, "/_bulk").param("refresh", "true");

        let url = transport.build_url(&request).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/proxy/_bulk?refresh=true");
    }

    #[test]
    fn test_round_robin() {
        let config = TransportConfig::builder()
            .urls(["http://a:9200", "http://b:9200"])
            .build();
        let transport = ReqwestTransport::new(&config).unwrap();

        assert_eq!(transport.next_base().host_str(), Some("a"));
        assert_eq!(transport.next_base().host_str(), Some("b"));
        assert_eq!(transport.next_base().host_str(), Some("a"));
    }

    #[tokio::test]
    async fn test_send_roundtrip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(query_param("refresh", "wait_for"))
            .and(header("content-type", "application/x-ndjson"))
            .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
            .and(body_string("{\"delete\":{\"_id\":\"1\"}}\n"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"took":1}"#))
            .expect(1)
            .mount(&server)
            .await;

        let config = TransportConfig::builder()
            .url(server.uri())
            .basic_auth("admin", Some("secret".to_string()))
            .build();
        let transport = ReqwestTransport::new(&config).unwrap();

        let request = TransportRequest::new(Method::POST, "/_bulk")
            .param("refresh", "wait_for")
            .header("Content-Type", "application/x-ndjson")
            .unwrap()
            .body("{\"delete\":{\"_id\":\"1\"}}\n");

        let response = transport.send(request).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text(), r#"{"took":1}"#);
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let config = TransportConfig::builder().url(server.uri()).build();
        let transport = ReqwestTransport::new(&config).unwrap();

        let response = transport
            .send(TransportRequest::new(Method::GET, "/"))
            .await
            .unwrap();
        assert_eq!(response.status(), 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_connection_refused_is_classified() {
        // Port 9 (discard) is closed on test machines.
        let config = TransportConfig::builder()
            .url("http://127.0.0.1:9")
            .connect_timeout(std::time::Duration::from_secs(2))
            .build();
        let transport = ReqwestTransport::new(&config).unwrap();

        let err = transport
            .send(TransportRequest::new(Method::GET, "/"))
            .await
            .unwrap_err();
        assert!(err.is_connection(), "{err:?}");
    }
}
