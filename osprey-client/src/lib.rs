//! # Osprey Client
//!
//! An OpenSearch client centered on bulk indexing.
//!
//! ## Features
//!
//! - **Bulk**: index, create, update and delete actions encoded to the
//!   newline-delimited bulk format, accumulated and sent in one request
//! - **Correlation**: per-item results grouped by action kind, outcome or
//!   document id
//! - **Retries**: every request runs through a configurable retrier with
//!   backoff and an optional deadline
//! - **Cluster settings**: read and update cluster-wide settings
//! - **Configuration**: TOML files and `OSPREY_*` environment variables
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use osprey_client::{Client, ClientConfig, IndexAction, UpdateAction};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> osprey_client::Result<()> {
//!     let client = Client::new(ClientConfig::new("http://localhost:9200"))?;
//!
//!     let mut bulk = client.bulk().index("tweets").refresh("wait_for");
//!     bulk.add(IndexAction::new().id("1").doc(json!({"user": "olivere"})))?;
//!     bulk.add(UpdateAction::new().id("1").doc(json!({"retweets": 42})))?;
//!
//!     let response = bulk.send().await?;
//!     println!("{} succeeded, {} failed", response.succeeded().len(), response.failed().len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bulk;
mod client;
mod cluster;
mod config;
mod error;
mod params;
mod script;

pub use bulk::{
    BulkAction, BulkOpType, BulkOutcomePolicy, BulkResponse, BulkResponseItem, BulkService,
    DeleteAction, GetResult, IndexAction, Payload, ShardsInfo, UpdateAction,
};
pub use client::{Client, PerformRequestOptions, SharedRetrier, check_response};
pub use cluster::{ClusterGetSettingsService, ClusterPutSettingsService};
pub use config::{ClientConfig, ENV_PREFIX};
pub use error::{ApiError, Error, ErrorDetails, Result, ScriptErrorPosition};
pub use params::CommonParams;
pub use script::Script;

// Re-export transport types callers need for custom transports and retriers
pub use osprey_http::{
    Backoff, BackoffExt, BackoffRetrier, ConstantBackoff, ExponentialBackoff, Retrier, Retryable,
    SimpleBackoff, StopBackoff, StopRetrier, Transport, TransportError, TransportRequest,
    TransportResponse, ZeroBackoff,
};

/// Prelude for common imports.
///
/// ```
/// use osprey_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bulk::{
        BulkAction, BulkOpType, BulkResponse, BulkService, DeleteAction, IndexAction,
        UpdateAction,
    };
    pub use crate::client::Client;
    pub use crate::config::ClientConfig;
    pub use crate::error::{Error, Result};
    pub use crate::script::Script;
}
