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

//! Stream publisher backends for the Bucatini change stream relay.
//!
//! This crate provides implementations of the
//! [`Publisher`](bucatini_core::publisher::Publisher) trait for delivering
//! change events to ordered ingestion streams.
//!
//! # Available Publishers
//!
//! - **Kinesis** (`kinesis` feature, default): `AWS Kinesis Data Streams`
//!   via `PutRecord`, one record per change event
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bucatini_destinations::kinesis::{KinesisConfig, KinesisPublisher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KinesisConfig::builder()
//!     .stream_name("change-events")
//!     .build()?;
//!
//! let publisher = KinesisPublisher::new(config).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

#[cfg(feature = "kinesis")]
pub mod kinesis;
