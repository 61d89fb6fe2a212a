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

//! Relay orchestration: watch → publish → checkpoint.
//!
//! The [`Relay`] drives the whole loop for one collection:
//!
//! 1. **Connect** — open the MongoDB client and ping the database. A failure
//!    here is fatal; the relay never starts streaming against a database it
//!    cannot reach.
//! 2. **Open** — read the persisted resume token (if any) and open the
//!    change feed after it, or from the current tail when none exists.
//! 3. **Stream** — for each event, strictly in feed order: publish with a
//!    bounded attempt ceiling, and only after the stream acknowledges the
//!    record, advance the checkpoint to that event's resume token.
//! 4. **Stop** — release the feed subscription and close the checkpoint
//!    store, on the error paths too.
//!
//! The loop is a single logical thread of control: no concurrent fetch, no
//! concurrent publish, no parallel checkpointing. That is what makes the
//! at-least-once guarantee auditable — the persisted token can never run
//! ahead of what the output stream has actually accepted.
//!
//! Exhausting the publish attempt budget stops the loop without
//! checkpointing the failed event, so a restart re-delivers it instead of
//! silently losing it. There is no skip-and-continue mode. Restarting is an
//! operational decision made outside the process; a supervisor simply runs
//! the relay again and it resumes from the last checkpoint.
//!
//! Running two relays against the same collection key is unsupported:
//! concurrent checkpoint writers would race and could move the resume marker
//! out of order relative to what each instance has published.

use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::event::ChangeEvent;
use crate::publisher::{PublishError, PublishReceipt, Publisher};
use crate::source::{ChangeFeedSource, SourceConfig, SourceError};
use bson::{doc, Document};
use futures::{Stream, StreamExt};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default ceiling on publish attempts per event.
pub const DEFAULT_MAX_PUBLISH_ATTEMPTS: u32 = 3;

/// Relay configuration.
///
/// Built through [`RelayConfig::builder`]. Connection credentials are part
/// of the MongoDB URI; assembling the URI from the environment is the
/// launcher's job, not this crate's.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// MongoDB connection URI
    pub mongodb_uri: String,

    /// Database holding the watched collection
    pub database: String,

    /// Collection to watch
    pub collection: String,

    /// Absolute ceiling on publish attempts per event (first attempt
    /// included), default 3
    pub max_publish_attempts: u32,

    /// Delay before the first publish retry; doubles per retry
    pub retry_delay: Duration,

    /// Cap on the between-retry delay
    pub max_retry_delay: Duration,

    /// Change feed tuning
    pub source: SourceConfig,
}

impl RelayConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }

    /// Returns the checkpoint key for the watched collection.
    #[must_use]
    pub fn collection_key(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

/// Builder for [`RelayConfig`].
#[derive(Debug, Default)]
pub struct RelayConfigBuilder {
    mongodb_uri: Option<String>,
    database: Option<String>,
    collection: Option<String>,
    max_publish_attempts: Option<u32>,
    retry_delay: Option<Duration>,
    max_retry_delay: Option<Duration>,
    source: Option<SourceConfig>,
}

impl RelayConfigBuilder {
    /// Sets the MongoDB connection URI.
    #[must_use]
    pub fn mongodb_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongodb_uri = Some(uri.into());
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the collection to watch.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Sets the publish attempt ceiling (total attempts, not extra retries).
    #[must_use]
    pub fn max_publish_attempts(mut self, attempts: u32) -> Self {
        self.max_publish_attempts = Some(attempts);
        self
    }

    /// Sets the initial delay between publish retries.
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Sets the maximum delay between publish retries.
    #[must_use]
    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = Some(delay);
        self
    }

    /// Sets change feed tuning options.
    #[must_use]
    pub fn source(mut self, source: SourceConfig) -> Self {
        self.source = Some(source);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a required field is missing or the
    /// attempt ceiling is zero.
    pub fn build(self) -> Result<RelayConfig, ConfigError> {
        let mongodb_uri = self.mongodb_uri.ok_or(ConfigError::MissingMongoUri)?;
        let database = self.database.ok_or(ConfigError::MissingDatabase)?;
        let collection = self.collection.ok_or(ConfigError::MissingCollection)?;

        let max_publish_attempts = self
            .max_publish_attempts
            .unwrap_or(DEFAULT_MAX_PUBLISH_ATTEMPTS);
        if max_publish_attempts == 0 {
            return Err(ConfigError::ZeroPublishAttempts);
        }

        Ok(RelayConfig {
            mongodb_uri,
            database,
            collection,
            max_publish_attempts,
            retry_delay: self.retry_delay.unwrap_or(Duration::from_millis(100)),
            max_retry_delay: self.max_retry_delay.unwrap_or(Duration::from_secs(30)),
            source: self.source.unwrap_or_default(),
        })
    }
}

/// Relay configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `mongodb_uri` was not provided
    #[error("mongodb_uri is required")]
    MissingMongoUri,

    /// `database` was not provided
    #[error("database is required")]
    MissingDatabase,

    /// `collection` was not provided
    #[error("collection is required")]
    MissingCollection,

    /// The attempt ceiling must allow at least one attempt
    #[error("max_publish_attempts must be at least 1")]
    ZeroPublishAttempts,
}

/// Relay lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Constructed, not yet connected
    Init,
    /// Database connectivity verified
    Connected,
    /// Consuming the change feed
    Streaming,
    /// Terminal: feed released, stores closed
    Stopped,
}

/// Counters accumulated over a relay run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Events acknowledged by the output stream
    pub events_published: u64,

    /// Publish attempts that failed and were retried
    pub publish_retries: u64,

    /// Checkpoint writes performed
    pub checkpoints_written: u64,
}

/// Relay errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The database could not be reached at startup (fatal, the loop never
    /// starts)
    #[error("MongoDB connection failed: {0}")]
    Connect(#[source] mongodb::error::Error),

    /// The change feed failed unrecoverably
    #[error(transparent)]
    Source(#[from] SourceError),

    /// All publish attempts for one event failed; the event was not
    /// checkpointed and will be re-delivered on the next run
    #[error("publish attempts exhausted after {attempts} attempts")]
    PublishExhausted {
        /// Attempts performed (equals the configured ceiling)
        attempts: u32,
        /// The final attempt's error
        #[source]
        source: PublishError,
    },

    /// The checkpoint store failed; fatal to avoid checkpoint/delivery
    /// divergence
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// The orchestrator: owns its collaborators exclusively for its lifetime and
/// drives one collection's watch → publish → checkpoint loop.
pub struct Relay<S: CheckpointStore, P: Publisher> {
    config: RelayConfig,
    store: S,
    publisher: P,
    state: RelayState,
    stats: RelayStats,
}

impl<S: CheckpointStore, P: Publisher> Relay<S, P> {
    /// Creates a relay from eagerly constructed collaborators.
    ///
    /// Pass [`NoopStore`](crate::checkpoint::NoopStore) to run without
    /// checkpointing (full resume-from-now after restarts).
    pub fn new(config: RelayConfig, store: S, publisher: P) -> Self {
        info!(
            database = %config.database,
            collection = %config.collection,
            max_publish_attempts = config.max_publish_attempts,
            "creating relay"
        );
        Self {
            config,
            store,
            publisher,
            state: RelayState::Init,
            stats: RelayStats::default(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// The checkpoint store the relay was built with.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The publisher the relay was built with.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Runs the relay to completion: connect, resume, stream, stop.
    ///
    /// Returns the accumulated counters when the feed ends gracefully.
    /// Whatever the outcome, the subscription is released and the
    /// checkpoint store closed before this returns.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Connect`] if the startup connectivity probe fails
    /// - [`RelayError::Source`] if the feed fails unrecoverably
    /// - [`RelayError::PublishExhausted`] when an event exhausts its attempts
    /// - [`RelayError::Checkpoint`] when the checkpoint store fails
    pub async fn run(&mut self) -> Result<RelayStats, RelayError> {
        let result = self.connect_and_stream().await;
        self.shutdown().await;

        match result {
            Ok(()) => {
                info!(stats = ?self.stats, "relay stopped");
                Ok(self.stats.clone())
            }
            Err(e) => {
                error!(error = %e, stats = ?self.stats, "relay stopped on error");
                Err(e)
            }
        }
    }

    /// Connect, resume, stream. Factored out of [`run`](Self::run) so every
    /// exit path, early failures included, flows through one shutdown.
    async fn connect_and_stream(&mut self) -> Result<(), RelayError> {
        info!("starting relay");

        let client = mongodb::Client::with_uri_str(&self.config.mongodb_uri)
            .await
            .map_err(RelayError::Connect)?;
        let db = client.database(&self.config.database);

        // Connectivity probe: refuse to enter the loop against a database
        // we cannot reach or authenticate to.
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(RelayError::Connect)?;
        self.state = RelayState::Connected;
        info!(database = %self.config.database, "database connectivity verified");

        let key = self.config.collection_key();
        let resume_token = self.store.get_resume_token(&key).await?;
        match resume_token {
            Some(ref token) => debug!(key = %key, token = ?token, "resuming from checkpoint"),
            None => info!(key = %key, "no checkpoint, starting from current tail"),
        }

        let collection = db.collection::<Document>(&self.config.collection);
        let source = ChangeFeedSource::new(collection, self.config.source.clone());
        let feed = source.open(resume_token).await?;

        self.process_feed(feed).await
    }

    /// Runs the streaming phase over an already-open event feed.
    ///
    /// This is the loop [`run`](Self::run) enters after connecting; it is
    /// public so custom feeds (and tests) can drive the relay directly.
    /// Events are handled strictly sequentially — the next event is not
    /// pulled until the previous one is published and checkpointed.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run); the feed ending without an error is a
    /// graceful stop, not an error.
    pub async fn process_feed<F>(&mut self, mut feed: F) -> Result<(), RelayError>
    where
        F: Stream<Item = Result<ChangeEvent, SourceError>> + Unpin,
    {
        self.state = RelayState::Streaming;
        info!("relay streaming");

        while let Some(next) = feed.next().await {
            let event = match next {
                Ok(event) => event,
                Err(e) => {
                    error!(error = %e, "change feed failed, stopping relay");
                    return Err(RelayError::Source(e));
                }
            };

            let receipt = self.publish_with_retry(&event).await?;
            info!(
                collection = %event.namespace.full_name(),
                id = %event.document_id_display(),
                sequence = %receipt.sequence_number,
                "published change event"
            );

            // The checkpoint only ever advances to events the stream has
            // durably accepted. A store failure here is fatal: continuing
            // without checkpointing would let delivery and resume position
            // diverge silently.
            let key = event.namespace.full_name();
            self.store.save_resume_token(&key, &event.resume_token).await?;
            self.stats.checkpoints_written += 1;
            debug!(key = %key, "checkpoint advanced");
        }

        info!("change feed ended");
        Ok(())
    }

    /// Publishes one event, retrying up to the configured ceiling.
    ///
    /// `max_publish_attempts` counts total attempts, the first included.
    /// Retries resubmit the identical record with exponential backoff
    /// between attempts; exhaustion is fatal to the run.
    async fn publish_with_retry(
        &mut self,
        event: &ChangeEvent,
    ) -> Result<PublishReceipt, RelayError> {
        let max_attempts = self.config.max_publish_attempts;
        let mut delay = self.config.retry_delay;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.publisher.publish(event).await {
                Ok(receipt) => {
                    if attempt > 1 {
                        info!(attempts = attempt, "publish succeeded after retries");
                    }
                    self.stats.events_published += 1;
                    return Ok(receipt);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts,
                        stream = %self.publisher.stream_name(),
                        retryable = e.is_retryable(),
                        error = %e,
                        "publish attempt failed"
                    );

                    if attempt >= max_attempts {
                        error!(
                            attempts = attempt,
                            id = %event.document_id_display(),
                            "publish attempts exhausted, event will not be checkpointed"
                        );
                        return Err(RelayError::PublishExhausted {
                            attempts: attempt,
                            source: e,
                        });
                    }

                    self.stats.publish_retries += 1;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    delay = std::cmp::min(delay.saturating_mul(2), self.config.max_retry_delay);
                }
            }
        }
    }

    /// Releases held resources; best effort, logged rather than propagated
    /// so it is safe on every exit path.
    async fn shutdown(&mut self) {
        if let Err(e) = self.publisher.close().await {
            warn!(error = %e, "failed to close publisher");
        }
        if let Err(e) = self.store.close().await {
            warn!(error = %e, "failed to close checkpoint store");
        }
        self.state = RelayState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder_full() {
        let config = RelayConfig::builder()
            .mongodb_uri("mongodb://localhost:27017")
            .database("appdb")
            .collection("orders")
            .max_publish_attempts(5)
            .retry_delay(Duration::from_millis(10))
            .max_retry_delay(Duration::from_secs(1))
            .build()
            .unwrap();

        assert_eq!(config.mongodb_uri, "mongodb://localhost:27017");
        assert_eq!(config.database, "appdb");
        assert_eq!(config.collection, "orders");
        assert_eq!(config.max_publish_attempts, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(10));
        assert_eq!(config.collection_key(), "appdb.orders");
    }

    #[test]
    fn config_builder_defaults() {
        let config = RelayConfig::builder()
            .mongodb_uri("mongodb://localhost:27017")
            .database("appdb")
            .collection("orders")
            .build()
            .unwrap();

        assert_eq!(config.max_publish_attempts, DEFAULT_MAX_PUBLISH_ATTEMPTS);
        assert_eq!(config.retry_delay, Duration::from_millis(100));
        assert_eq!(config.max_retry_delay, Duration::from_secs(30));
    }

    #[test]
    fn config_builder_missing_fields() {
        assert_eq!(
            RelayConfig::builder().build().unwrap_err(),
            ConfigError::MissingMongoUri
        );
        assert_eq!(
            RelayConfig::builder()
                .mongodb_uri("mongodb://localhost:27017")
                .build()
                .unwrap_err(),
            ConfigError::MissingDatabase
        );
        assert_eq!(
            RelayConfig::builder()
                .mongodb_uri("mongodb://localhost:27017")
                .database("appdb")
                .build()
                .unwrap_err(),
            ConfigError::MissingCollection
        );
    }

    #[test]
    fn config_builder_rejects_zero_attempts() {
        let err = RelayConfig::builder()
            .mongodb_uri("mongodb://localhost:27017")
            .database("appdb")
            .collection("orders")
            .max_publish_attempts(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroPublishAttempts);
    }
}
