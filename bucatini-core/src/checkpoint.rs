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

//! Checkpoint persistence for change stream resume tokens.
//!
//! A checkpoint is the durably persisted resume token of the last event the
//! relay successfully published. The [`CheckpointStore`] trait abstracts the
//! backing key-value store; one record exists per collection key
//! (`"database.collection"`), last write wins.
//!
//! Stores must round-trip tokens unchanged — a saved token read back must be
//! identical to what was saved, byte for byte, or the feed cannot resume
//! from it.
//!
//! Checkpointing is optional: [`NoopStore`] satisfies the trait for
//! deployments that accept resuming from "now" after a restart.
//!
//! Stores perform no retries of their own; backing store failures propagate
//! to the caller as [`CheckpointError`].

use bson::Document;
use tracing::trace;

/// Trait for checkpoint storage backends.
///
/// Implementations persist resume tokens keyed by the fully qualified
/// collection name. `save_resume_token` is an idempotent upsert: saving the
/// same token twice leaves the stored state as a single save would.
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns the persisted token for a collection key, or `None` when no
    /// checkpoint exists (first run, or checkpointing disabled).
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    async fn get_resume_token(&self, key: &str) -> Result<Option<Document>, CheckpointError>;

    /// Upserts the token for a collection key (last write wins).
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    async fn save_resume_token(&self, key: &str, token: &Document)
        -> Result<(), CheckpointError>;

    /// Removes the token for a collection key, forcing the next run to start
    /// from the current tail. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    async fn delete_resume_token(&self, key: &str) -> Result<(), CheckpointError>;

    /// Releases any resources held by the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be closed cleanly.
    async fn close(&self) -> Result<(), CheckpointError>;
}

/// Errors from checkpoint store operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Token could not be encoded or decoded
    #[error("checkpoint serialization error: {0}")]
    Serialization(String),

    /// The backing store could not be reached
    #[error("checkpoint store connection error: {0}")]
    Connection(String),

    /// The backing store rejected the operation
    #[error("checkpoint store error: {0}")]
    Backend(String),
}

/// Checkpoint store for deployments without checkpointing.
///
/// `get` always answers `None`, so the feed opens from the current tail on
/// every run; `save` and `delete` succeed without side effects. Use this when
/// full replay-from-now after a restart is acceptable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

impl NoopStore {
    /// Creates a no-op checkpoint store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl CheckpointStore for NoopStore {
    async fn get_resume_token(&self, key: &str) -> Result<Option<Document>, CheckpointError> {
        trace!(key, "checkpointing disabled, no token");
        Ok(None)
    }

    async fn save_resume_token(
        &self,
        key: &str,
        _token: &Document,
    ) -> Result<(), CheckpointError> {
        trace!(key, "checkpointing disabled, discarding token");
        Ok(())
    }

    async fn delete_resume_token(&self, _key: &str) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), CheckpointError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn noop_store_never_returns_a_token() {
        let store = NoopStore::new();
        let token = doc! { "_data": "token" };

        store.save_resume_token("db.coll", &token).await.unwrap();
        assert!(store.get_resume_token("db.coll").await.unwrap().is_none());

        store.save_resume_token("db.coll", &token).await.unwrap();
        assert!(store.get_resume_token("db.coll").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn noop_store_delete_and_close_succeed() {
        let store = NoopStore::new();
        store.delete_resume_token("db.coll").await.unwrap();
        store.close().await.unwrap();
    }
}
