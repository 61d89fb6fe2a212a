// Copyright 2025 Bucatini Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Change stream event representation.
//!
//! [`ChangeEvent`] is the value that flows through the relay: it is created
//! when the feed yields a change, handed to the publisher for delivery, and
//! discarded once its resume token has been checkpointed. Ownership moves
//! along the pipeline; events are never shared across iterations.
//!
//! The payload written to the output stream is the canonical MongoDB Extended
//! JSON rendering of the event (see [`ChangeEvent::to_payload`]), which keeps
//! extended types such as `Decimal128`, `Int64` and `ObjectId` lossless and
//! reconstructable by downstream consumers.

use bson::{Bson, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Error converting a driver event into a [`ChangeEvent`].
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The resume token could not be represented as a BSON document.
    #[error("failed to convert resume token: {0}")]
    ResumeToken(String),
}

/// Error encoding a [`ChangeEvent`] into its stream payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The event could not be serialized to BSON.
    #[error("failed to encode event payload: {0}")]
    Encode(#[from] bson::ser::Error),
}

/// MongoDB change stream operation types.
///
/// `Unknown` preserves the original operation string for forward
/// compatibility with server versions newer than this library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum OperationType {
    /// A document was inserted
    Insert,

    /// A document was updated in place
    Update,

    /// A document was deleted
    Delete,

    /// A document was replaced entirely
    Replace,

    /// The change stream was invalidated (collection dropped, renamed, ...)
    Invalidate,

    /// The watched collection was dropped
    Drop,

    /// The database was dropped
    #[serde(rename = "dropdatabase")]
    DropDatabase,

    /// The collection was renamed
    Rename,

    /// An operation type this library does not know about
    #[serde(untagged)]
    Unknown(String),
}

/// MongoDB namespace (database + collection) an operation occurred in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    /// Database name
    pub database: String,

    /// Collection name
    pub collection: String,
}

impl Namespace {
    /// Creates a namespace from database and collection names.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Returns the fully qualified `"database.collection"` name.
    ///
    /// This is the checkpoint key: distinct collections always map to
    /// distinct keys.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

/// What changed in an update operation (in addition to the full document).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateDescription {
    /// Fields that were added or modified
    #[serde(rename = "updatedFields")]
    pub updated_fields: Document,

    /// Fields that were removed
    #[serde(rename = "removedFields")]
    pub removed_fields: Vec<String>,
}

/// A single change observed on the watched collection.
///
/// Events carry the full current-state snapshot of the affected document
/// (the feed is opened with update lookup enabled), not merely a diff, so
/// the published record is complete on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Type of operation that occurred
    #[serde(rename = "operationType")]
    pub operation: OperationType,

    /// Namespace the operation occurred in
    #[serde(rename = "ns")]
    pub namespace: Namespace,

    /// Document key (`_id`, plus the shard key on sharded clusters)
    #[serde(rename = "documentKey", skip_serializing_if = "Option::is_none")]
    pub document_key: Option<Document>,

    /// Full document after the operation (always requested via update lookup;
    /// absent for deletes and invalidations)
    #[serde(rename = "fullDocument", skip_serializing_if = "Option::is_none")]
    pub full_document: Option<Document>,

    /// Field-level description of an update, when applicable
    #[serde(rename = "updateDescription", skip_serializing_if = "Option::is_none")]
    pub update_description: Option<UpdateDescription>,

    /// Oplog timestamp of the operation
    #[serde(rename = "clusterTime")]
    pub cluster_time: DateTime<Utc>,

    /// Resume token positioned immediately after this event.
    ///
    /// Opaque to everything except the feed itself; checkpoint stores must
    /// round-trip it unchanged.
    #[serde(rename = "_id")]
    pub resume_token: Document,
}

impl ChangeEvent {
    /// Returns true if this event invalidates the change stream.
    #[inline]
    pub fn is_invalidate(&self) -> bool {
        self.operation == OperationType::Invalidate
    }

    /// Returns the collection name.
    #[inline]
    pub fn collection_name(&self) -> &str {
        &self.namespace.collection
    }

    /// Returns the document `_id`, if the event carries a document key.
    pub fn document_id(&self) -> Option<&Bson> {
        self.document_key.as_ref()?.get("_id")
    }

    /// Returns the document `_id` rendered for logging.
    pub fn document_id_display(&self) -> String {
        match self.document_id() {
            Some(id) => id.to_string(),
            None => "<none>".to_string(),
        }
    }

    /// Encodes the event as its stream payload: canonical MongoDB Extended
    /// JSON with lexicographically ordered keys.
    ///
    /// The encoding is deterministic (the same event always produces the
    /// same bytes) and lossless for extended BSON types — `Decimal128`,
    /// 64-bit integers, `ObjectId`s and binary values all survive the trip
    /// through the stream.
    pub fn to_payload(&self) -> Result<String, PayloadError> {
        let doc = bson::to_document(self)?;
        Ok(Bson::Document(doc).into_canonical_extjson().to_string())
    }
}

impl TryFrom<mongodb::change_stream::event::ChangeStreamEvent<Document>> for ChangeEvent {
    type Error = ConversionError;

    fn try_from(
        event: mongodb::change_stream::event::ChangeStreamEvent<Document>,
    ) -> Result<Self, Self::Error> {
        use mongodb::change_stream::event::OperationType as MongoOpType;

        let operation = match event.operation_type {
            MongoOpType::Insert => OperationType::Insert,
            MongoOpType::Update => OperationType::Update,
            MongoOpType::Delete => OperationType::Delete,
            MongoOpType::Replace => OperationType::Replace,
            MongoOpType::Invalidate => OperationType::Invalidate,
            MongoOpType::Drop => OperationType::Drop,
            MongoOpType::DropDatabase => OperationType::DropDatabase,
            MongoOpType::Rename => OperationType::Rename,
            other => {
                let op = format!("{other:?}");
                warn!(operation = %op, "unknown change stream operation type");
                OperationType::Unknown(op)
            }
        };

        let namespace = event
            .ns
            .map(|ns| Namespace {
                database: ns.db,
                collection: ns.coll.unwrap_or_default(),
            })
            .unwrap_or_else(|| Namespace::new("", ""));

        let update_description = event.update_description.map(|ud| UpdateDescription {
            updated_fields: ud.updated_fields,
            removed_fields: ud.removed_fields,
        });

        // MongoDB timestamps carry seconds plus an increment that orders
        // operations within the same second; the increment is mapped into
        // the sub-second range to keep that ordering.
        let cluster_time = event
            .cluster_time
            .and_then(|ts| {
                DateTime::from_timestamp(i64::from(ts.time), ts.increment.saturating_mul(1_000_000))
            })
            .unwrap_or_else(Utc::now);

        let resume_token =
            bson::to_document(&event.id).map_err(|e| ConversionError::ResumeToken(e.to_string()))?;

        Ok(Self {
            operation,
            namespace,
            document_key: event.document_key,
            full_document: event.full_document,
            update_description,
            cluster_time,
            resume_token,
        })
    }
}
