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

//! Relay a collection's change stream to the console.
//!
//! The simplest possible setup: no checkpointing (the relay starts from
//! "now" on every run) and a publisher that prints each event's payload
//! instead of putting it on a stream.
//!
//! # Prerequisites
//!
//! Start MongoDB (replica set required for change streams):
//! ```bash
//! docker run -d --name mongodb -p 27017:27017 mongo:7.0 --replSet rs0
//! docker exec mongodb mongosh --eval "rs.initiate()"
//! ```
//!
//! # Running
//!
//! ```bash
//! cargo run --example relay_console
//! ```
//!
//! Then, in another terminal, generate some changes:
//! ```bash
//! docker exec mongodb mongosh testdb --eval '
//!   db.orders.insertOne({item: "widget", qty: 3})
//! '
//! ```

use bucatini_core::event::ChangeEvent;
use bucatini_core::publisher::{PublishError, PublishReceipt, Publisher};
use bucatini_core::relay::{Relay, RelayConfig};
use bucatini_core::NoopStore;
use std::error::Error;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Publisher that prints payloads instead of delivering them.
struct ConsolePublisher {
    delivered: u64,
}

#[async_trait::async_trait]
impl Publisher for ConsolePublisher {
    async fn publish(&mut self, event: &ChangeEvent) -> Result<PublishReceipt, PublishError> {
        let payload = event.to_payload().map_err(PublishError::serialization)?;
        self.delivered += 1;
        println!("{payload}");
        Ok(PublishReceipt {
            sequence_number: self.delivered.to_string(),
            shard_id: None,
        })
    }

    fn stream_name(&self) -> &str {
        "console"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bucatini_core=info"));
    fmt().with_env_filter(filter).with_target(false).init();

    let config = RelayConfig::builder()
        .mongodb_uri(std::env::var("MONGODB_URI").unwrap_or_else(|_| {
            "mongodb://localhost:27017/?replicaSet=rs0&directConnection=true".to_string()
        }))
        .database("testdb")
        .collection("orders")
        .build()?;

    info!(
        database = %config.database,
        collection = %config.collection,
        "relaying change events to the console, press Ctrl+C to stop"
    );

    let mut relay = Relay::new(config, NoopStore::new(), ConsolePublisher { delivered: 0 });

    tokio::select! {
        result = relay.run() => {
            let stats = result?;
            info!(?stats, "change feed ended");
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    info!(stats = ?relay.stats(), "relay finished");

    Ok(())
}
