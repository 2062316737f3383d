//! Bulk indexing: actions, the accumulator that sends them, and the
//! correlated response.

mod action;
mod response;
mod service;

pub use action::{BulkAction, BulkOpType, DeleteAction, IndexAction, Payload, UpdateAction};
pub use response::{BulkOutcomePolicy, BulkResponse, BulkResponseItem, GetResult, ShardsInfo};
pub use service::BulkService;
