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

//! Checkpoint store backends for the Bucatini change stream relay.
//!
//! This crate provides backend implementations of the
//! [`CheckpointStore`](bucatini_core::checkpoint::CheckpointStore) trait for
//! persisting `MongoDB` change stream resume tokens between relay runs.
//!
//! # Available Stores
//!
//! - **DynamoDB** (`dynamodb` feature, default): durable checkpoints in an
//!   `AWS DynamoDB` table, one item per watched collection
//! - **Memory**: process-local checkpoints for development and testing
//!
//! Running without any checkpointing at all is handled in the core crate by
//! [`NoopStore`](bucatini_core::checkpoint::NoopStore).
//!
//! # Example: DynamoDB Store
//!
//! ```rust,ignore
//! use bucatini_stores::dynamodb::{DynamoConfig, DynamoStore};
//! use bucatini_core::CheckpointStore;
//! use bson::doc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DynamoConfig::builder()
//!     .table_name("relay-checkpoints")
//!     .build()?;
//!
//! let store = DynamoStore::new(config).await?;
//!
//! let token = doc! { "_data": "8264ABCD0000" };
//! store.save_resume_token("appdb.orders", &token).await?;
//!
//! let retrieved = store.get_resume_token("appdb.orders").await?;
//! assert_eq!(retrieved, Some(token));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

#[cfg(feature = "dynamodb")]
pub mod dynamodb;
pub mod memory;
