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

//! Kinesis publisher for relaying change events to a Kinesis data stream.
//!
//! Each change event becomes one `PutRecord` call carrying the event's
//! canonical Extended JSON payload. All records use a single fixed partition
//! key, so the whole relay maps onto one shard and the stream preserves the
//! change feed's order end to end. Scaling beyond one shard's throughput is
//! a sharding-strategy change, deliberately not attempted here.
//!
//! SDK-level retries are disabled on this client: the relay drives retries
//! itself against its configured attempt ceiling, and hidden extra attempts
//! inside the SDK would make that ceiling meaningless.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bucatini_destinations::kinesis::{KinesisConfig, KinesisPublisher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KinesisConfig::builder()
//!     .stream_name("change-events")
//!     .region("eu-west-1")
//!     .build()?;
//!
//! let publisher = KinesisPublisher::new(config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Using LocalStack for testing
//!
//! ```rust,ignore
//! let config = KinesisConfig::builder()
//!     .stream_name("test-stream")
//!     .region("us-east-1")
//!     .endpoint_url("http://localhost:4566")
//!     .build()?;
//!
//! let publisher = KinesisPublisher::new(config).await?;
//! ```

pub mod config;
mod publisher;

pub use config::{KinesisConfig, KinesisConfigBuilder, KinesisConfigError};
pub use publisher::KinesisPublisher;
