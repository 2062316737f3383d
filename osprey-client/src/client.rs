//! OpenSearch client implementation.

use bytes::Bytes;
use http::Method;
use osprey_http::{
    BackoffExt, BackoffRetrier, ExponentialBackoff, ReqwestTransport, Retrier, Transport,
    TransportRequest, TransportResponse, retry_with,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bulk::BulkService;
use crate::cluster::{ClusterGetSettingsService, ClusterPutSettingsService};
use crate::config::ClientConfig;
use crate::error::{ApiError, Error, Result};

/// Retrier deciding over [`Error`]s, shareable across requests.
pub type SharedRetrier = Arc<dyn Retrier<Error>>;

/// OpenSearch client.
///
/// Cheap to clone; clones share the transport and retrier.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    retrier: SharedRetrier,
}

impl Client {
    /// Create a client talking HTTP to the configured nodes.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config.transport_config())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client on top of any transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        info!(urls = ?config.urls, max_retries = config.max_retries, "Initializing OpenSearch client");
        let retrier = default_retrier(&config);
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                retrier,
            }),
        }
    }

    /// Replace the retrier used for every request.
    pub fn with_retrier(self, retrier: impl Retrier<Error> + 'static) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config: self.inner.config.clone(),
                transport: self.inner.transport.clone(),
                retrier: Arc::new(retrier),
            }),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The retrier requests use unless they bring their own.
    pub fn retrier(&self) -> &SharedRetrier {
        &self.inner.retrier
    }

    /// Start a bulk request.
    pub fn bulk(&self) -> BulkService {
        BulkService::new(self.clone())
    }

    /// Read cluster-wide settings.
    pub fn cluster_get_settings(&self) -> ClusterGetSettingsService {
        ClusterGetSettingsService::new(self.clone())
    }

    /// Update cluster-wide settings.
    pub fn cluster_put_settings(&self) -> ClusterPutSettingsService {
        ClusterPutSettingsService::new(self.clone())
    }

    /// Send a request, retrying per the retrier, and check the response
    /// status.
    ///
    /// With a deadline, the whole exchange including retry waits must finish
    /// in time or fails with [`Error::DeadlineExceeded`].
    pub async fn perform_request(&self, options: PerformRequestOptions) -> Result<TransportResponse> {
        let retrier = options
            .retrier
            .clone()
            .unwrap_or_else(|| self.inner.retrier.clone());

        let mut attempt = 0u32;
        let exchange = retry_with(
            || {
                attempt += 1;
                self.attempt(&options, attempt)
            },
            retrier.as_ref(),
            |err: &Error, wait: Duration| {
                warn!(
                    method = %options.method,
                    path = %options.path,
                    wait_ms = wait.as_millis() as u64,
                    error = %err,
                    "Request failed, retrying"
                );
            },
        );

        match options.deadline {
            Some(deadline) => tokio::time::timeout(deadline, exchange)
                .await
                .map_err(|_| Error::DeadlineExceeded(deadline))?,
            None => exchange.await,
        }
    }

    async fn attempt(&self, options: &PerformRequestOptions, attempt: u32) -> Result<TransportResponse> {
        let request = options.to_transport_request()?;
        let response = self.inner.transport.send(request).await?;
        debug!(
            method = %options.method,
            path = %options.path,
            status = response.status().as_u16(),
            attempt,
            "Request completed"
        );
        check_response(response, &options.ignore_errors)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("urls", &self.inner.config.urls)
            .finish()
    }
}

fn default_retrier(config: &ClientConfig) -> SharedRetrier {
    let backoff = ExponentialBackoff::new(config.retry_initial_backoff, config.retry_max_backoff)
        .with_max_retries(config.max_retries);
    Arc::new(
        BackoffRetrier::new(backoff).with_status_codes(config.retry_status_codes.iter().copied()),
    )
}

/// Pass 2xx responses and those with an ignored status; turn everything
/// else into an [`ApiError`].
pub fn check_response(response: TransportResponse, ignore_errors: &[u16]) -> Result<TransportResponse> {
    let status = response.status().as_u16();
    if (200..=299).contains(&status) || ignore_errors.contains(&status) {
        return Ok(response);
    }
    Err(ApiError::from_body(status, response.bytes()).into())
}

/// Everything needed to issue one REST call.
#[derive(Clone)]
pub struct PerformRequestOptions {
    /// HTTP method.
    pub method: Method,
    /// Path, e.g. `/_bulk`.
    pub path: String,
    /// Query parameters.
    pub params: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Bytes>,
    /// Content type of the body; `application/json` when unset.
    pub content_type: Option<String>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Retrier overriding the client's.
    pub retrier: Option<SharedRetrier>,
    /// Statuses outside 2xx to accept.
    pub ignore_errors: Vec<u16>,
    /// Upper bound on the whole exchange, retries included.
    pub deadline: Option<Duration>,
}

impl PerformRequestOptions {
    /// Options for `method` on `path`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
            content_type: None,
            headers: Vec::new(),
            retrier: None,
            ignore_errors: Vec::new(),
            deadline: None,
        }
    }

    /// Add a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add query parameters.
    pub fn params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.params.extend(params);
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the content type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Add headers.
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Use `retrier` instead of the client's.
    pub fn retrier(mut self, retrier: Option<SharedRetrier>) -> Self {
        self.retrier = retrier;
        self
    }

    /// Accept these statuses.
    pub fn ignore_errors(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.ignore_errors.extend(codes);
        self
    }

    /// Bound the whole exchange.
    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    fn to_transport_request(&self) -> Result<TransportRequest> {
        let mut request = TransportRequest::new(self.method.clone(), self.path.clone());
        request.params = self.params.clone();
        if let Some(body) = &self.body {
            let content_type = self.content_type.as_deref().unwrap_or("application/json");
            request = request.header("Content-Type", content_type)?.body(body.clone());
        }
        for (name, value) in &self.headers {
            request = request.header(name, value)?;
        }
        Ok(request)
    }
}

impl std::fmt::Debug for PerformRequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformRequestOptions")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .field("ignore_errors", &self.ignore_errors)
            .field("deadline", &self.deadline)
            .finish()
    }
}
