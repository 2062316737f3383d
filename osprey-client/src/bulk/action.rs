//! Bulk actions and their wire encoding.
//!
//! Every action renders to one metadata line, followed by a payload line for
//! everything but deletes:
//!
//! ```text
//! {"index":{"_index":"tweets","_id":"1"}}
//! {"message":"hi","user":"olivere"}
//! {"delete":{"_index":"tweets","_id":"1"}}
//! ```
//!
//! Metadata keys follow a fixed order, omitting unset fields. JSON documents
//! given as [`serde_json::Value`] come out with their keys sorted; raw
//! documents are embedded as written.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::script::Script;

/// The kind of a bulk action, as used on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOpType {
    /// Index (create or replace) a document.
    #[default]
    Index,
    /// Create a document, failing if it exists.
    Create,
    /// Partially update a document.
    Update,
    /// Delete a document.
    Delete,
}

impl BulkOpType {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for BulkOpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A JSON value, serialized on encode.
    Json(Value),
    /// Pre-encoded JSON, embedded verbatim rather than as a JSON string.
    Raw(String),
}

impl Payload {
    /// Serialize any document into a raw payload, keeping its field order.
    pub fn from_serialize<T: Serialize + ?Sized>(doc: &T) -> Result<Self> {
        Ok(Self::Raw(serde_json::to_string(doc)?))
    }

    fn encoded(&self) -> Result<EncodedPayload<'_>> {
        match self {
            Self::Json(value) => Ok(EncodedPayload::Json(value)),
            Self::Raw(raw) => Ok(EncodedPayload::Raw(serde_json::from_str(raw)?)),
        }
    }

    fn is_empty_raw(&self) -> bool {
        matches!(self, Self::Raw(raw) if raw.is_empty())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Payload {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

impl From<&str> for Payload {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_string())
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum EncodedPayload<'a> {
    Json(&'a Value),
    Raw(&'a RawValue),
}

/// Identity of the document an action targets. Empty values are left out
/// of the metadata line.
#[derive(Debug, Clone, Default, PartialEq)]
struct Target {
    index: Option<String>,
    doc_type: Option<String>,
    id: Option<String>,
    routing: Option<String>,
    parent: Option<String>,
    version: Option<i64>,
    version_type: Option<String>,
    if_seq_no: Option<i64>,
    if_primary_term: Option<i64>,
}

macro_rules! target_setters {
    ($ty:ty) => {
        impl $ty {
            /// Target index; falls back to the bulk service's index when unset.
            pub fn index(mut self, index: impl Into<String>) -> Self {
                self.target.index = Some(index.into());
                self
            }

            /// Target mapping type, for clusters that still use them.
            pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
                self.target.doc_type = Some(doc_type.into());
                self
            }

            /// Document id; the server assigns one when unset.
            pub fn id(mut self, id: impl Into<String>) -> Self {
                self.target.id = Some(id.into());
                self
            }

            /// Routing key.
            pub fn routing(mut self, routing: impl Into<String>) -> Self {
                self.target.routing = Some(routing.into());
                self
            }

            /// Parent document id.
            pub fn parent(mut self, parent: impl Into<String>) -> Self {
                self.target.parent = Some(parent.into());
                self
            }

            /// Expected document version.
            pub fn version(mut self, version: i64) -> Self {
                self.target.version = Some(version);
                self
            }

            /// Versioning scheme, e.g. `external`.
            pub fn version_type(mut self, version_type: impl Into<String>) -> Self {
                self.target.version_type = Some(version_type.into());
                self
            }

            /// Only apply if the document still has this sequence number.
            pub fn if_seq_no(mut self, seq_no: i64) -> Self {
                self.target.if_seq_no = Some(seq_no);
                self
            }

            /// Only apply if the document still has this primary term.
            pub fn if_primary_term(mut self, primary_term: i64) -> Self {
                self.target.if_primary_term = Some(primary_term);
                self
            }

            /// The document id, if set.
            pub fn doc_id(&self) -> Option<&str> {
                self.target.id.as_deref()
            }
        }
    };
}

/// Index or create a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexAction {
    target: Target,
    pipeline: Option<String>,
    doc: Option<Payload>,
}

impl IndexAction {
    /// Create an empty index action.
    pub fn new() -> Self {
        Self::default()
    }

    /// The document to write.
    pub fn doc(mut self, doc: impl Into<Payload>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Serialize `doc` and use it as the document.
    pub fn try_doc<T: Serialize + ?Sized>(self, doc: &T) -> Result<Self> {
        Ok(self.doc(Payload::from_serialize(doc)?))
    }

    /// Ingest pipeline to run the document through.
    pub fn pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }
}

target_setters!(IndexAction);

/// Partially update a document, by doc or by script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateAction {
    target: Target,
    retry_on_conflict: Option<u32>,
    doc: Option<Payload>,
    upsert: Option<Payload>,
    script: Option<Script>,
    doc_as_upsert: Option<bool>,
    scripted_upsert: Option<bool>,
    detect_noop: Option<bool>,
    return_source: Option<bool>,
}

impl UpdateAction {
    /// Create an empty update action.
    pub fn new() -> Self {
        Self::default()
    }

    /// Partial document to merge. An empty raw document is left out.
    pub fn doc(mut self, doc: impl Into<Payload>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Serialize `doc` and use it as the partial document.
    pub fn try_doc<T: Serialize + ?Sized>(self, doc: &T) -> Result<Self> {
        Ok(self.doc(Payload::from_serialize(doc)?))
    }

    /// Document to create when the target does not exist.
    pub fn upsert(mut self, doc: impl Into<Payload>) -> Self {
        self.upsert = Some(doc.into());
        self
    }

    /// Update script.
    pub fn script(mut self, script: Script) -> Self {
        self.script = Some(script);
        self
    }

    /// Use the partial document as upsert document.
    pub fn doc_as_upsert(mut self, enable: bool) -> Self {
        self.doc_as_upsert = Some(enable);
        self
    }

    /// Run the script whether or not the document exists.
    pub fn scripted_upsert(mut self, enable: bool) -> Self {
        self.scripted_upsert = Some(enable);
        self
    }

    /// Skip updates that would not change the document.
    pub fn detect_noop(mut self, enable: bool) -> Self {
        self.detect_noop = Some(enable);
        self
    }

    /// Return the updated source in the response item.
    pub fn return_source(mut self, enable: bool) -> Self {
        self.return_source = Some(enable);
        self
    }

    /// How often to retry on version conflicts.
    pub fn retry_on_conflict(mut self, retries: u32) -> Self {
        self.retry_on_conflict = Some(retries);
        self
    }
}

target_setters!(UpdateAction);

/// Delete a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteAction {
    target: Target,
}

impl DeleteAction {
    /// Create an empty delete action.
    pub fn new() -> Self {
        Self::default()
    }
}

target_setters!(DeleteAction);

/// One write operation within a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    /// Index a document.
    Index(IndexAction),
    /// Create a document; the action fails if it exists.
    Create(IndexAction),
    /// Update a document.
    Update(UpdateAction),
    /// Delete a document.
    Delete(DeleteAction),
}

impl From<IndexAction> for BulkAction {
    fn from(action: IndexAction) -> Self {
        Self::Index(action)
    }
}

impl From<UpdateAction> for BulkAction {
    fn from(action: UpdateAction) -> Self {
        Self::Update(action)
    }
}

impl From<DeleteAction> for BulkAction {
    fn from(action: DeleteAction) -> Self {
        Self::Delete(action)
    }
}

#[derive(Serialize)]
struct Meta<'a> {
    #[serde(rename = "_index", skip_serializing_if = "Option::is_none")]
    index: Option<&'a str>,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    doc_type: Option<&'a str>,
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_on_conflict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    routing: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pipeline: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    if_seq_no: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    if_primary_term: Option<i64>,
}

impl<'a> Meta<'a> {
    fn new(target: &'a Target) -> Self {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|s| !s.is_empty())
        }
        Self {
            index: non_empty(&target.index),
            doc_type: non_empty(&target.doc_type),
            id: non_empty(&target.id),
            parent: non_empty(&target.parent),
            retry_on_conflict: None,
            routing: non_empty(&target.routing),
            version: target.version.filter(|v| *v != 0),
            version_type: non_empty(&target.version_type),
            pipeline: None,
            if_seq_no: target.if_seq_no,
            if_primary_term: target.if_primary_term,
        }
    }

    fn line(&self, op: BulkOpType) -> Result<String> {
        let command = BTreeMap::from([(op.as_str(), self)]);
        Ok(serde_json::to_string(&command)?)
    }
}

#[derive(Serialize)]
struct UpdateData<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    detect_noop: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc: Option<EncodedPayload<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc_as_upsert: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    script: Option<&'a Script>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scripted_upsert: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upsert: Option<EncodedPayload<'a>>,
    #[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
    source: Option<bool>,
}

/// Pre-encoded JSON may span lines; its line breaks are insignificant
/// whitespace and must not leak into the ndjson body.
fn single_line(line: String) -> String {
    if line.contains(['\n', '\r']) {
        line.replace(['\n', '\r'], " ")
    } else {
        line
    }
}

impl BulkAction {
    /// The wire kind of this action.
    pub fn op_type(&self) -> BulkOpType {
        match self {
            Self::Index(_) => BulkOpType::Index,
            Self::Create(_) => BulkOpType::Create,
            Self::Update(_) => BulkOpType::Update,
            Self::Delete(_) => BulkOpType::Delete,
        }
    }

    /// The target document id, if set.
    pub fn doc_id(&self) -> Option<&str> {
        match self {
            Self::Index(a) | Self::Create(a) => a.doc_id(),
            Self::Update(a) => a.doc_id(),
            Self::Delete(a) => a.doc_id(),
        }
    }

    /// Encode into wire lines, without trailing newlines.
    ///
    /// Fails only if a payload is not valid JSON.
    pub fn encode(&self) -> Result<Vec<String>> {
        let op = self.op_type();
        match self {
            Self::Index(action) | Self::Create(action) => {
                let meta = Meta {
                    pipeline: action.pipeline.as_deref().filter(|p| !p.is_empty()),
                    ..Meta::new(&action.target)
                };
                let doc = match &action.doc {
                    Some(doc) => serde_json::to_string(&doc.encoded()?)?,
                    None => "null".to_string(),
                };
                Ok(vec![meta.line(op)?, single_line(doc)])
            }
            Self::Update(action) => {
                let meta = Meta {
                    retry_on_conflict: action.retry_on_conflict,
                    ..Meta::new(&action.target)
                };
                let doc = match &action.doc {
                    Some(doc) if !doc.is_empty_raw() => Some(doc.encoded()?),
                    _ => None,
                };
                let upsert = action.upsert.as_ref().map(Payload::encoded).transpose()?;
                let data = UpdateData {
                    detect_noop: action.detect_noop,
                    doc,
                    doc_as_upsert: action.doc_as_upsert,
                    script: action.script.as_ref(),
                    scripted_upsert: action.scripted_upsert,
                    upsert,
                    source: action.return_source,
                };
                Ok(vec![meta.line(op)?, single_line(serde_json::to_string(&data)?)])
            }
            Self::Delete(action) => Ok(vec![Meta::new(&action.target).line(op)?]),
        }
    }

    /// Create a `create` action from an index action.
    pub fn create(action: IndexAction) -> Self {
        Self::Create(action)
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Ok(lines) => f.write_str(&lines.join("\n")),
            Err(e) => write!(f, "error: {}", e),
        }
    }
}
