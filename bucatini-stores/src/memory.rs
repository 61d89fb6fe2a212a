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

//! In-memory checkpoint store.
//!
//! Process-local implementation of the
//! [`CheckpointStore`](bucatini_core::checkpoint::CheckpointStore) trait: a
//! thread-safe map from collection key to resume token.
//!
//! Tokens are lost when the process exits, so a relay using this store
//! effectively resumes from "now" after a restart — the same behavior as
//! [`NoopStore`](bucatini_core::checkpoint::NoopStore), except that
//! checkpoints survive within the process and can be inspected by tests.
//! For durable checkpoints use [`DynamoStore`](crate::dynamodb::DynamoStore).
//!
//! # Example
//!
//! ```rust
//! use bucatini_stores::memory::MemoryStore;
//! use bucatini_core::CheckpointStore;
//! use bson::doc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//!
//! let token = doc! { "_data": "8264ABCD0000" };
//! store.save_resume_token("appdb.orders", &token).await?;
//!
//! let retrieved = store.get_resume_token("appdb.orders").await?;
//! assert_eq!(retrieved, Some(token));
//! # Ok(())
//! # }
//! ```

use bson::Document;
use bucatini_core::checkpoint::{CheckpointError, CheckpointStore};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

/// In-memory checkpoint store.
///
/// Clones share the same underlying map, so a clone handed to the relay can
/// still be observed from the test that created it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tokens: Arc<RwLock<HashMap<String, Document>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with tokens, useful for simulating a
    /// relay that has run before.
    #[must_use]
    pub fn with_tokens(tokens: HashMap<String, Document>) -> Self {
        debug!(token_count = tokens.len(), "creating pre-populated memory store");
        Self {
            tokens: Arc::new(RwLock::new(tokens)),
        }
    }

    /// Number of collection keys with a stored token.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.read().expect("memory store lock poisoned").len()
    }

    /// Returns `true` if no tokens are stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens
            .read()
            .expect("memory store lock poisoned")
            .is_empty()
    }

    /// Removes every stored token.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn clear(&self) {
        self.tokens
            .write()
            .expect("memory store lock poisoned")
            .clear();
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Document>>, CheckpointError> {
        self.tokens
            .read()
            .map_err(|_| CheckpointError::Backend("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Document>>, CheckpointError> {
        self.tokens
            .write()
            .map_err(|_| CheckpointError::Backend("memory store lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryStore {
    async fn get_resume_token(&self, key: &str) -> Result<Option<Document>, CheckpointError> {
        let token = self.read()?.get(key).cloned();
        trace!(key, found = token.is_some(), "read resume token from memory");
        Ok(token)
    }

    async fn save_resume_token(
        &self,
        key: &str,
        token: &Document,
    ) -> Result<(), CheckpointError> {
        self.write()?.insert(key.to_string(), token.clone());
        trace!(key, "saved resume token to memory");
        Ok(())
    }

    async fn delete_resume_token(&self, key: &str) -> Result<(), CheckpointError> {
        let removed = self.write()?.remove(key);
        debug!(key, existed = removed.is_some(), "deleted resume token from memory");
        Ok(())
    }

    async fn close(&self) -> Result<(), CheckpointError> {
        Ok(())
    }
}
