//! Bulk response and per-item correlation.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::fmt;

use super::action::BulkOpType;
use crate::error::{ErrorDetails, Result};

/// Decides which item statuses count as success.
///
/// Items succeed when their status is in `200..=299` and they carry no
/// error. A delete that hit a missing document reports 404; whether that
/// counts as success (the document is gone either way) is configurable and
/// off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcomePolicy {
    /// Count a delete answered with 404 as succeeded.
    pub delete_not_found_is_success: bool,
}

impl BulkOutcomePolicy {
    /// Whether `item` succeeded under this policy.
    pub fn is_success(&self, item: &BulkResponseItem) -> bool {
        if item.error.is_some() {
            return false;
        }
        if (200..=299).contains(&item.status) {
            return true;
        }
        self.delete_not_found_is_success
            && item.op_type == BulkOpType::Delete
            && item.status == 404
    }
}

/// Response of the bulk endpoint.
///
/// `items` is positionally aligned with the submitted actions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    /// Time taken in milliseconds.
    #[serde(default)]
    pub took: u64,
    /// Whether any item failed.
    #[serde(default)]
    pub errors: bool,
    /// Per-action results, in submission order.
    #[serde(default, deserialize_with = "deserialize_items")]
    pub items: Vec<BulkResponseItem>,
    #[serde(skip)]
    policy: BulkOutcomePolicy,
}

impl BulkResponse {
    /// Use `policy` for [`succeeded`](Self::succeeded) and
    /// [`failed`](Self::failed).
    pub fn with_policy(mut self, policy: BulkOutcomePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The policy in effect.
    pub fn policy(&self) -> BulkOutcomePolicy {
        self.policy
    }

    /// Items of the given kind.
    pub fn by_action(&self, op_type: BulkOpType) -> Vec<&BulkResponseItem> {
        self.items.iter().filter(|i| i.op_type == op_type).collect()
    }

    /// Results of index actions.
    pub fn indexed(&self) -> Vec<&BulkResponseItem> {
        self.by_action(BulkOpType::Index)
    }

    /// Results of create actions.
    pub fn created(&self) -> Vec<&BulkResponseItem> {
        self.by_action(BulkOpType::Create)
    }

    /// Results of update actions.
    pub fn updated(&self) -> Vec<&BulkResponseItem> {
        self.by_action(BulkOpType::Update)
    }

    /// Results of delete actions.
    pub fn deleted(&self) -> Vec<&BulkResponseItem> {
        self.by_action(BulkOpType::Delete)
    }

    /// Items that succeeded.
    pub fn succeeded(&self) -> Vec<&BulkResponseItem> {
        self.succeeded_with(&self.policy)
    }

    /// Items that failed; the complement of [`succeeded`](Self::succeeded).
    pub fn failed(&self) -> Vec<&BulkResponseItem> {
        self.failed_with(&self.policy)
    }

    /// Items that succeeded under `policy`.
    pub fn succeeded_with(&self, policy: &BulkOutcomePolicy) -> Vec<&BulkResponseItem> {
        self.items.iter().filter(|i| policy.is_success(i)).collect()
    }

    /// Items that failed under `policy`.
    pub fn failed_with(&self, policy: &BulkOutcomePolicy) -> Vec<&BulkResponseItem> {
        self.items.iter().filter(|i| !policy.is_success(i)).collect()
    }

    /// All items for document `id`, in submission order.
    pub fn by_id(&self, id: &str) -> Vec<&BulkResponseItem> {
        self.items.iter().filter(|i| i.id == id).collect()
    }
}

/// Result of one bulk action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkResponseItem {
    /// The action kind this item answers.
    #[serde(skip)]
    pub op_type: BulkOpType,
    /// Index name.
    #[serde(rename = "_index", default)]
    pub index: String,
    /// Mapping type, if reported.
    #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Document id.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Document version after the action.
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Outcome such as `created`, `updated`, `deleted`, `noop`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Shard replication summary.
    #[serde(rename = "_shards", default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<ShardsInfo>,
    /// Sequence number assigned to the operation.
    #[serde(rename = "_seq_no", default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<i64>,
    /// Primary term assigned to the operation.
    #[serde(rename = "_primary_term", default, skip_serializing_if = "Option::is_none")]
    pub primary_term: Option<i64>,
    /// Item status code.
    #[serde(default)]
    pub status: u16,
    /// Whether a refresh was forced.
    #[serde(default)]
    pub forced_refresh: bool,
    /// Error details for failed items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
    /// Updated document, for updates that asked for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<GetResult>,
}

/// Shard replication summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardsInfo {
    /// Shards the operation should have reached.
    #[serde(default)]
    pub total: u32,
    /// Shards it reached.
    #[serde(default)]
    pub successful: u32,
    /// Shards that failed.
    #[serde(default)]
    pub failed: u32,
}

/// A fetched document, embedded in update results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetResult {
    /// Index name.
    #[serde(rename = "_index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Document id.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Document version.
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Sequence number.
    #[serde(rename = "_seq_no", default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<i64>,
    /// Primary term.
    #[serde(rename = "_primary_term", default, skip_serializing_if = "Option::is_none")]
    pub primary_term: Option<i64>,
    /// Whether the document exists.
    #[serde(default)]
    pub found: bool,
    /// The document source, undecoded.
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Box<RawValue>>,
    /// Stored fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,
}

impl GetResult {
    /// Decode the source into `T`, if present.
    pub fn source_as<T: for<'de> Deserialize<'de>>(&self) -> Result<Option<T>> {
        match &self.source {
            Some(raw) => Ok(Some(serde_json::from_str(raw.get())?)),
            None => Ok(None),
        }
    }
}

/// Items arrive as single-key objects, the key naming the action kind.
fn deserialize_items<'de, D>(deserializer: D) -> std::result::Result<Vec<BulkResponseItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let tagged: Vec<TaggedItem> = Vec::deserialize(deserializer)?;
    Ok(tagged.into_iter().map(|t| t.0).collect())
}

struct TaggedItem(BulkResponseItem);

impl<'de> Deserialize<'de> for TaggedItem {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(TaggedItemVisitor)
    }
}

struct TaggedItemVisitor;

const ONE_ACTION: &str = "exactly one of index, create, update or delete";

impl<'de> Visitor<'de> for TaggedItemVisitor {
    type Value = TaggedItem;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ONE_ACTION)
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let (op_type, mut item) = map
            .next_entry::<BulkOpType, BulkResponseItem>()?
            .ok_or_else(|| de::Error::invalid_length(0, &ONE_ACTION))?;

        // A repeated key counts too; keeping either value would misalign results.
        let mut extra = 0;
        while map.next_entry::<de::IgnoredAny, de::IgnoredAny>()?.is_some() {
            extra += 1;
        }
        if extra > 0 {
            return Err(de::Error::invalid_length(1 + extra, &ONE_ACTION));
        }

        item.op_type = op_type;
        Ok(TaggedItem(item))
    }
}
