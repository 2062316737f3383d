// Osprey - an OpenSearch client for Rust
//
// This library bundles the transport layer (backoff, retries, HTTP) with the
// client services built on top of it (bulk indexing, cluster settings).

// Re-export the client surface
pub use osprey_client::*;

// Re-export the transport crate for custom transports and backoff policies
pub use osprey_http;

/// Prelude for common imports.
///
/// ```
/// use osprey::prelude::*;
/// ```
pub mod prelude {
    pub use osprey_client::prelude::*;
    pub use osprey_http::prelude::{
        Backoff, BackoffExt, ConstantBackoff, ExponentialBackoff, Retrier, TransportError,
    };
}
