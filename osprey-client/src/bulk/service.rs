//! The bulk accumulator and its send operation.

use bytes::Bytes;
use http::Method;
use std::time::Duration;
use tracing::{debug, warn};

use super::action::BulkAction;
use super::response::BulkResponse;
use crate::client::{Client, PerformRequestOptions, SharedRetrier};
use crate::error::{Error, Result};
use crate::params::{CommonParams, common_params_setters};

const NDJSON: &str = "application/x-ndjson";

/// An encoded action waiting to be sent.
#[derive(Debug, Clone)]
struct Pending {
    action: BulkAction,
    lines: Vec<String>,
}

/// Collects bulk actions and sends them as one `_bulk` request.
///
/// Actions are encoded when added, so encoding errors surface from
/// [`add`](Self::add) and [`estimated_size_in_bytes`](Self::estimated_size_in_bytes)
/// is the exact body length.
///
/// A successful [`send`](Self::send) empties the accumulator, even when
/// individual items failed. Any error leaves the pending actions in place
/// so the batch can be sent again.
///
/// ```no_run
/// # async fn run(client: osprey_client::Client) -> osprey_client::Result<()> {
/// use osprey_client::{DeleteAction, IndexAction};
/// use serde_json::json;
///
/// let mut bulk = client.bulk().index("tweets");
/// bulk.add(IndexAction::new().id("1").doc(json!({"user": "olivere"})))?;
/// bulk.add(DeleteAction::new().id("2"))?;
///
/// let response = bulk.send().await?;
/// for item in response.failed() {
///     eprintln!("{:?} failed: {:?}", item.id, item.error);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BulkService {
    client: Client,
    pending: Vec<Pending>,
    size_in_bytes: usize,
    index: Option<String>,
    doc_type: Option<String>,
    refresh: Option<String>,
    routing: Option<String>,
    pipeline: Option<String>,
    timeout: Option<String>,
    wait_for_active_shards: Option<String>,
    common: CommonParams,
    retrier: Option<SharedRetrier>,
    deadline: Option<Duration>,
}

impl BulkService {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            pending: Vec::new(),
            size_in_bytes: 0,
            index: None,
            doc_type: None,
            refresh: None,
            routing: None,
            pipeline: None,
            timeout: None,
            wait_for_active_shards: None,
            common: CommonParams::default(),
            retrier: None,
            deadline: None,
        }
    }

    /// Default index for actions without one.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Default document type for actions without one.
    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// Refresh policy: `true`, `false` or `wait_for`.
    pub fn refresh(mut self, refresh: impl Into<String>) -> Self {
        self.refresh = Some(refresh.into());
        self
    }

    /// Default routing value.
    pub fn routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    /// Default ingest pipeline.
    pub fn pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    /// Server-side timeout, e.g. `1m`.
    pub fn timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// Active shard copies required before writing, e.g. `all` or `2`.
    pub fn wait_for_active_shards(mut self, count: impl Into<String>) -> Self {
        self.wait_for_active_shards = Some(count.into());
        self
    }

    /// Retrier for this service, replacing the client's.
    pub fn retrier(mut self, retrier: SharedRetrier) -> Self {
        self.retrier = Some(retrier);
        self
    }

    /// Limit for the whole send, retries included.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Append an action, encoding it right away.
    ///
    /// On error the accumulator is unchanged.
    pub fn add(&mut self, action: impl Into<BulkAction>) -> Result<&mut Self> {
        let action = action.into();
        let lines = action.encode()?;
        self.size_in_bytes += lines.iter().map(|line| line.len() + 1).sum::<usize>();
        self.pending.push(Pending { action, lines });
        Ok(self)
    }

    /// Append several actions; stops at the first one failing to encode.
    pub fn add_all<I, A>(&mut self, actions: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<BulkAction>,
    {
        for action in actions {
            self.add(action)?;
        }
        Ok(self)
    }

    /// Number of actions waiting to be sent.
    pub fn number_of_actions(&self) -> usize {
        self.pending.len()
    }

    /// Size of the request body the pending actions make up.
    pub fn estimated_size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    /// The pending actions, in insertion order.
    pub fn actions(&self) -> impl Iterator<Item = &BulkAction> {
        self.pending.iter().map(|p| &p.action)
    }

    /// The request body: every line newline-terminated, in insertion order.
    pub fn body_as_string(&self) -> String {
        let mut body = String::with_capacity(self.size_in_bytes);
        for line in self.pending.iter().flat_map(|p| &p.lines) {
            body.push_str(line);
            body.push('\n');
        }
        body
    }

    /// The request body as bytes.
    pub fn body(&self) -> Bytes {
        Bytes::from(self.body_as_string())
    }

    /// Drop all pending actions without sending.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.size_in_bytes = 0;
    }

    fn path(&self) -> String {
        match (self.index.as_deref(), self.doc_type.as_deref()) {
            (Some(index), Some(doc_type)) if !index.is_empty() && !doc_type.is_empty() => {
                format!("/{}/{}/_bulk", index, doc_type)
            }
            (Some(index), _) if !index.is_empty() => format!("/{}/_bulk", index),
            _ => "/_bulk".to_string(),
        }
    }

    fn build_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        self.common.append_to(&mut params);
        let optional = [
            ("refresh", &self.refresh),
            ("routing", &self.routing),
            ("pipeline", &self.pipeline),
            ("timeout", &self.timeout),
            ("wait_for_active_shards", &self.wait_for_active_shards),
        ];
        for (name, value) in optional {
            if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                params.push((name.to_string(), value.clone()));
            }
        }
        params
    }

    /// Send the pending actions.
    ///
    /// Fails without a request when nothing is pending. Per-item failures are
    /// reported in the response, not as an error.
    pub async fn send(&mut self) -> Result<BulkResponse> {
        if self.pending.is_empty() {
            return Err(Error::Validation("No bulk actions to commit".to_string()));
        }

        let path = self.path();
        let options = PerformRequestOptions::new(Method::POST, path.as_str())
            .params(self.build_params())
            .body(self.body())
            .content_type(NDJSON)
            .headers(self.common.headers.clone())
            .retrier(self.retrier.clone())
            .deadline(self.deadline);

        let response = self.client.perform_request(options).await?;
        let response = response
            .json::<BulkResponse>()?
            .with_policy(self.client.config().bulk_outcome_policy());

        debug!(
            path = %path,
            actions = self.pending.len(),
            bytes = self.size_in_bytes,
            took_ms = response.took,
            errors = response.errors,
            "Bulk request completed"
        );
        if response.errors {
            debug!(failed = response.failed().len(), "Bulk request had failed items");
        }
        is_aligned(self.pending.len(), &response);

        self.reset();
        Ok(response)
    }
}

common_params_setters!(BulkService);

/// Whether the response holds one item per submitted action.
fn is_aligned(submitted: usize, response: &BulkResponse) -> bool {
    if response.items.len() == submitted {
        return true;
    }
    warn!(
        submitted,
        items = response.items.len(),
        "Bulk response items do not match submitted actions; positional correlation is unreliable"
    );
    false
}

impl std::fmt::Debug for BulkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkService")
            .field("actions", &self.pending.len())
            .field("size_in_bytes", &self.size_in_bytes)
            .field("index", &self.index)
            .field("doc_type", &self.doc_type)
            .field("deadline", &self.deadline)
            .finish()
    }
}
