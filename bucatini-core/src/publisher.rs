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

//! Publisher trait and error types.
//!
//! A [`Publisher`] delivers one serialized change event to an ordered
//! ingestion stream and reports a [`PublishReceipt`] on acknowledgment. One
//! call is exactly one delivery attempt — the bounded retry ceiling around
//! attempts lives in the relay, which resubmits the same event verbatim.
//!
//! The receipt's sequence number exists for logging only; the relay never
//! bases a correctness decision on it.

use crate::event::ChangeEvent;
use async_trait::async_trait;
use thiserror::Error;

/// Acknowledgment returned by a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Stream-assigned sequence number / offset of the record
    pub sequence_number: String,

    /// Shard the record landed on, when the stream reports one
    pub shard_id: Option<String>,
}

/// Errors from a single publish attempt.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The stream endpoint could not be reached (retryable).
    #[error("stream connection error: {message}")]
    Connection {
        /// Human-readable error message
        message: String,
        /// Underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The event could not be serialized (never retryable — the payload
    /// would fail identically on resubmission).
    #[error("payload serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
        /// Underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The stream rejected the record.
    #[error("delivery failed: {message}")]
    Delivery {
        /// Human-readable error message
        message: String,
        /// Whether resubmitting the same record may succeed
        retryable: bool,
        /// Underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid publisher configuration.
    #[error("publisher configuration error: {message}")]
    Configuration {
        /// Human-readable error message
        message: String,
    },
}

impl PublishError {
    /// Creates a connection error from any error type.
    #[must_use]
    pub fn connection(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Connection {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Serialization {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a delivery error from any error type.
    #[must_use]
    pub fn delivery(
        source: impl std::error::Error + Send + Sync + 'static,
        retryable: bool,
    ) -> Self {
        Self::Delivery {
            message: source.to_string(),
            retryable,
            source: Some(Box::new(source)),
        }
    }

    /// Creates a delivery error with a custom message.
    #[must_use]
    pub fn delivery_msg(message: impl Into<String>, retryable: bool) -> Self {
        Self::Delivery {
            message: message.into(),
            retryable,
            source: None,
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether resubmitting the same record may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::Serialization { .. } | Self::Configuration { .. } => false,
            Self::Delivery { retryable, .. } => *retryable,
        }
    }
}

/// Delivers change events to an ordered ingestion stream.
///
/// One `publish` call is one delivery attempt of one event. Implementations
/// serialize the event deterministically, so a retried attempt submits the
/// identical payload.
#[async_trait]
pub trait Publisher: Send {
    /// Delivers one event; returns the stream's acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns a [`PublishError`] describing why this attempt failed. The
    /// caller decides whether to retry based on its own attempt budget.
    async fn publish(&mut self, event: &ChangeEvent) -> Result<PublishReceipt, PublishError>;

    /// Name of the destination stream, for logging.
    fn stream_name(&self) -> &str;

    /// Releases any resources held by the publisher.
    ///
    /// # Errors
    ///
    /// Returns an error if shutdown fails.
    async fn close(&mut self) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Scripted in-memory publisher for tests.
///
/// Records every event it accepts and can be told to fail specific attempts
/// (counted globally, 1-based) or to fail every attempt.
#[derive(Debug, Default)]
pub struct MockPublisher {
    published: Vec<ChangeEvent>,
    attempts: usize,
    failing_attempts: Vec<usize>,
    fail_always: bool,
}

impl MockPublisher {
    /// Creates a publisher that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a publisher that fails the given attempt numbers (1-based,
    /// counted across all events) and succeeds otherwise.
    #[must_use]
    pub fn failing_attempts(attempts: impl Into<Vec<usize>>) -> Self {
        Self {
            failing_attempts: attempts.into(),
            ..Self::default()
        }
    }

    /// Creates a publisher that fails every attempt.
    #[must_use]
    pub fn always_failing() -> Self {
        Self {
            fail_always: true,
            ..Self::default()
        }
    }

    /// Events acknowledged so far, in delivery order.
    #[must_use]
    pub fn published(&self) -> &[ChangeEvent] {
        &self.published
    }

    /// Total number of publish attempts observed.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.attempts
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&mut self, event: &ChangeEvent) -> Result<PublishReceipt, PublishError> {
        self.attempts += 1;

        if self.fail_always || self.failing_attempts.contains(&self.attempts) {
            return Err(PublishError::delivery_msg("scripted failure", true));
        }

        self.published.push(event.clone());
        Ok(PublishReceipt {
            sequence_number: format!("seq-{}", self.published.len()),
            shard_id: Some("shard-0".to_string()),
        })
    }

    fn stream_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Namespace, OperationType};
    use bson::doc;
    use chrono::Utc;

    fn sample_event(id: i32) -> ChangeEvent {
        ChangeEvent {
            operation: OperationType::Insert,
            namespace: Namespace::new("db", "coll"),
            document_key: Some(doc! { "_id": id }),
            full_document: Some(doc! { "_id": id }),
            update_description: None,
            cluster_time: Utc::now(),
            resume_token: doc! { "_data": format!("token-{id}") },
        }
    }

    #[tokio::test]
    async fn mock_acknowledges_in_order() {
        let mut publisher = MockPublisher::new();

        let first = publisher.publish(&sample_event(1)).await.unwrap();
        let second = publisher.publish(&sample_event(2)).await.unwrap();

        assert_eq!(first.sequence_number, "seq-1");
        assert_eq!(second.sequence_number, "seq-2");
        assert_eq!(publisher.published().len(), 2);
        assert_eq!(publisher.attempts(), 2);
    }

    #[tokio::test]
    async fn mock_fails_scripted_attempts() {
        let mut publisher = MockPublisher::failing_attempts(vec![1]);

        assert!(publisher.publish(&sample_event(1)).await.is_err());
        assert!(publisher.publish(&sample_event(1)).await.is_ok());
        assert_eq!(publisher.attempts(), 2);
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn mock_always_failing_never_accepts() {
        let mut publisher = MockPublisher::always_failing();
        for _ in 0..5 {
            assert!(publisher.publish(&sample_event(1)).await.is_err());
        }
        assert_eq!(publisher.attempts(), 5);
        assert!(publisher.published().is_empty());
    }

    #[test]
    fn error_retryability() {
        assert!(PublishError::connection(std::io::Error::other("net")).is_retryable());
        assert!(PublishError::delivery_msg("throttled", true).is_retryable());
        assert!(!PublishError::delivery_msg("denied", false).is_retryable());
        assert!(!PublishError::serialization(std::io::Error::other("bad")).is_retryable());
        assert!(!PublishError::configuration("missing stream").is_retryable());
    }
}
