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

//! `DynamoDB`-backed checkpoint store.
//!
//! Persists resume tokens in a `DynamoDB` table, one item per watched
//! collection. The table uses a string partition key named `collectionName`
//! holding the fully qualified `"database.collection"` name; the token itself
//! is stored under the `_id` attribute as a canonical Extended JSON string,
//! which round-trips every BSON type the server may put in a token.
//!
//! Saves are unconditional upserts (`UpdateItem` with a `SET` expression):
//! writing the same token twice leaves the item exactly as a single write
//! would, and last write wins. Reads use strongly consistent gets so a
//! freshly restarted relay always sees its own last checkpoint.
//!
//! # Table Schema
//!
//! ```text
//! Partition key: collectionName (S)
//! Attribute:     _id            (S)  — canonical Extended JSON resume token
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use bucatini_stores::dynamodb::{DynamoConfig, DynamoStore};
//! use bucatini_core::CheckpointStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DynamoConfig::builder()
//!     .table_name("relay-checkpoints")
//!     .region("eu-west-1")
//!     .build()?;
//!
//! let store = DynamoStore::new(config).await?;
//! let token = store.get_resume_token("appdb.orders").await?;
//! # Ok(())
//! # }
//! ```

use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use bson::{Bson, Document};
use bucatini_core::checkpoint::{CheckpointError, CheckpointStore};
use tracing::{debug, info, trace};

/// Partition key attribute holding the `"database.collection"` name.
const KEY_ATTRIBUTE: &str = "collectionName";

/// Attribute holding the encoded resume token.
const TOKEN_ATTRIBUTE: &str = "_id";

/// Configuration for the `DynamoDB` checkpoint store.
#[derive(Debug, Clone)]
pub struct DynamoConfig {
    /// Name of the checkpoint table
    pub table_name: String,

    /// AWS region override; the ambient provider chain is used when unset
    pub region: Option<String>,

    /// Endpoint override, for local `DynamoDB` instances in tests
    pub endpoint_url: Option<String>,
}

impl DynamoConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> DynamoConfigBuilder {
        DynamoConfigBuilder::default()
    }
}

/// Builder for [`DynamoConfig`].
#[derive(Debug, Default)]
pub struct DynamoConfigBuilder {
    table_name: Option<String>,
    region: Option<String>,
    endpoint_url: Option<String>,
}

impl DynamoConfigBuilder {
    /// Sets the checkpoint table name.
    #[must_use]
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Sets the AWS region.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets an endpoint override (e.g. a local `DynamoDB` for tests).
    #[must_use]
    pub fn endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DynamoConfigError`] when the table name is missing or empty.
    pub fn build(self) -> Result<DynamoConfig, DynamoConfigError> {
        let table_name = self.table_name.ok_or(DynamoConfigError::MissingTableName)?;
        if table_name.trim().is_empty() {
            return Err(DynamoConfigError::EmptyTableName);
        }

        Ok(DynamoConfig {
            table_name,
            region: self.region,
            endpoint_url: self.endpoint_url,
        })
    }
}

/// `DynamoDB` store configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DynamoConfigError {
    /// `table_name` was not provided
    #[error("table_name is required")]
    MissingTableName,

    /// `table_name` was empty
    #[error("table_name must not be empty")]
    EmptyTableName,
}

/// Checkpoint store backed by a `DynamoDB` table.
#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: Client,
    table_name: String,
}

impl DynamoStore {
    /// Creates a store from the ambient AWS credential/region chain and
    /// verifies the checkpoint table is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Connection`] when the table cannot be
    /// reached and [`CheckpointError::Backend`] when it does not exist or
    /// access is denied.
    pub async fn new(config: DynamoConfig) -> Result<Self, CheckpointError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.region.clone() {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint) = config.endpoint_url.clone() {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let store = Self::from_client(Client::new(&sdk_config), config.table_name);

        store
            .client
            .describe_table()
            .table_name(&store.table_name)
            .send()
            .await
            .map_err(|e| map_sdk_error("describe checkpoint table", &e))?;

        info!(table = %store.table_name, "DynamoDB checkpoint table verified");
        Ok(store)
    }

    /// Creates a store from an existing client, skipping the table probe.
    #[must_use]
    pub fn from_client(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// The configured table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

#[async_trait::async_trait]
impl CheckpointStore for DynamoStore {
    async fn get_resume_token(&self, key: &str) -> Result<Option<Document>, CheckpointError> {
        trace!(table = %self.table_name, key, "reading resume token");

        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(KEY_ATTRIBUTE, AttributeValue::S(key.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| map_sdk_error("get checkpoint item", &e))?;

        let Some(item) = output.item else {
            debug!(key, "no checkpoint item");
            return Ok(None);
        };

        let encoded = item
            .get(TOKEN_ATTRIBUTE)
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| {
                CheckpointError::Serialization(format!(
                    "checkpoint item for {key} has no string {TOKEN_ATTRIBUTE} attribute"
                ))
            })?;

        let token = decode_token(encoded)?;
        debug!(key, "resume token loaded");
        Ok(Some(token))
    }

    async fn save_resume_token(
        &self,
        key: &str,
        token: &Document,
    ) -> Result<(), CheckpointError> {
        let encoded = encode_token(token);

        self.client
            .update_item()
            .table_name(&self.table_name)
            .key(KEY_ATTRIBUTE, AttributeValue::S(key.to_string()))
            .update_expression("SET #token = :token")
            .expression_attribute_names("#token", TOKEN_ATTRIBUTE)
            .expression_attribute_values(":token", AttributeValue::S(encoded))
            .send()
            .await
            .map_err(|e| map_sdk_error("save checkpoint item", &e))?;

        trace!(table = %self.table_name, key, "resume token saved");
        Ok(())
    }

    async fn delete_resume_token(&self, key: &str) -> Result<(), CheckpointError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(KEY_ATTRIBUTE, AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| map_sdk_error("delete checkpoint item", &e))?;

        debug!(table = %self.table_name, key, "resume token deleted");
        Ok(())
    }

    async fn close(&self) -> Result<(), CheckpointError> {
        Ok(())
    }
}

/// Encodes a resume token as a canonical Extended JSON string.
///
/// Canonical mode keeps extended BSON types tagged, so the decoded document
/// is identical to the one encoded.
fn encode_token(token: &Document) -> String {
    Bson::Document(token.clone()).into_canonical_extjson().to_string()
}

/// Decodes a stored token string back into the original BSON document.
fn decode_token(encoded: &str) -> Result<Document, CheckpointError> {
    let value: serde_json::Value = serde_json::from_str(encoded)
        .map_err(|e| CheckpointError::Serialization(format!("invalid token JSON: {e}")))?;
    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(other) => Err(CheckpointError::Serialization(format!(
            "token is not a document: {other}"
        ))),
        Err(e) => Err(CheckpointError::Serialization(format!(
            "invalid token Extended JSON: {e}"
        ))),
    }
}

/// Maps an AWS SDK error onto [`CheckpointError`], keeping the full error
/// chain in the message.
fn map_sdk_error<E>(operation: &str, err: &SdkError<E, HttpResponse>) -> CheckpointError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = format!("{operation}: {}", DisplayErrorContext(err));
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            CheckpointError::Connection(message)
        }
        _ => CheckpointError::Backend(message),
    }
}
