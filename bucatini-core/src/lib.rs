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

//! Bucatini Core - MongoDB change stream relay
//!
//! Bucatini relays change events observed on a single MongoDB collection into
//! a durable, ordered ingestion stream, with optional crash-resilient
//! checkpointing so a restarted relay resumes exactly where it left off.
//!
//! The pipeline is a straight line with one feedback edge:
//!
//! ```text
//! ┌─────────────────┐    ┌─────────┐    ┌───────────┐
//! │ ChangeFeedSource│───►│  Relay  │───►│ Publisher │
//! └─────────────────┘    └────┬────┘    └───────────┘
//!                             │ (after successful publish)
//!                             ▼
//!                     ┌─────────────────┐
//!                     │ CheckpointStore │
//!                     └─────────────────┘
//! ```
//!
//! One event at a time: no event is checkpointed before its own publish has
//! been acknowledged, and no event is fetched ahead of the previous one's
//! resolution. This gives at-least-once delivery across restarts.
//!
//! # Key Components
//!
//! - [`event`] — change stream event types and their canonical payload encoding
//! - [`source`] — resumable change feed over a MongoDB collection
//! - [`checkpoint`] — resume token persistence ([`checkpoint::CheckpointStore`])
//! - [`publisher`] — stream delivery seam ([`publisher::Publisher`])
//! - [`relay`] — the orchestrator driving watch → publish → checkpoint

pub mod checkpoint;
pub mod event;
pub mod publisher;
pub mod relay;
pub mod source;

pub use checkpoint::{CheckpointStore, NoopStore};
pub use event::ChangeEvent;
pub use publisher::{PublishReceipt, Publisher};
pub use relay::{Relay, RelayConfig};
