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

//! Kinesis publisher configuration.

/// Partition key used for every record unless overridden.
///
/// A constant key routes the entire relay through one shard, which is what
/// preserves event order on the stream.
pub const DEFAULT_PARTITION_KEY: &str = "1";

/// Configuration for the Kinesis publisher.
///
/// # Example
///
/// ```rust
/// use bucatini_destinations::kinesis::KinesisConfig;
///
/// let config = KinesisConfig::builder()
///     .stream_name("change-events")
///     .region("eu-west-1")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.partition_key, "1");
/// ```
#[derive(Debug, Clone)]
pub struct KinesisConfig {
    /// Name of the destination stream
    pub stream_name: String,

    /// Partition key applied to every record (default `"1"`)
    pub partition_key: String,

    /// AWS region override; the ambient provider chain is used when unset
    pub region: Option<String>,

    /// Endpoint override, for LocalStack-style local streams in tests
    pub endpoint_url: Option<String>,
}

impl KinesisConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> KinesisConfigBuilder {
        KinesisConfigBuilder::default()
    }
}

/// Builder for [`KinesisConfig`].
#[derive(Debug, Default)]
pub struct KinesisConfigBuilder {
    stream_name: Option<String>,
    partition_key: Option<String>,
    region: Option<String>,
    endpoint_url: Option<String>,
}

impl KinesisConfigBuilder {
    /// Sets the destination stream name.
    #[must_use]
    pub fn stream_name(mut self, stream_name: impl Into<String>) -> Self {
        self.stream_name = Some(stream_name.into());
        self
    }

    /// Overrides the fixed partition key.
    ///
    /// Only do this if downstream ordering requirements allow records to
    /// spread over multiple shards.
    #[must_use]
    pub fn partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    /// Sets the AWS region.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets an endpoint override.
    #[must_use]
    pub fn endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KinesisConfigError`] when the stream name is missing or
    /// empty, or when an explicit partition key is empty.
    pub fn build(self) -> Result<KinesisConfig, KinesisConfigError> {
        let stream_name = self
            .stream_name
            .ok_or(KinesisConfigError::MissingStreamName)?;
        if stream_name.trim().is_empty() {
            return Err(KinesisConfigError::EmptyStreamName);
        }

        let partition_key = self
            .partition_key
            .unwrap_or_else(|| DEFAULT_PARTITION_KEY.to_string());
        if partition_key.is_empty() {
            return Err(KinesisConfigError::EmptyPartitionKey);
        }

        Ok(KinesisConfig {
            stream_name,
            partition_key,
            region: self.region,
            endpoint_url: self.endpoint_url,
        })
    }
}

/// Kinesis publisher configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KinesisConfigError {
    /// `stream_name` was not provided
    #[error("stream_name is required")]
    MissingStreamName,

    /// `stream_name` was empty
    #[error("stream_name must not be empty")]
    EmptyStreamName,

    /// An explicit partition key was empty
    #[error("partition_key must not be empty")]
    EmptyPartitionKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_stream_name() {
        assert_eq!(
            KinesisConfig::builder().build().unwrap_err(),
            KinesisConfigError::MissingStreamName
        );
        assert_eq!(
            KinesisConfig::builder().stream_name("  ").build().unwrap_err(),
            KinesisConfigError::EmptyStreamName
        );
    }

    #[test]
    fn builder_defaults_partition_key() {
        let config = KinesisConfig::builder()
            .stream_name("change-events")
            .build()
            .unwrap();
        assert_eq!(config.partition_key, DEFAULT_PARTITION_KEY);
        assert!(config.region.is_none());
        assert!(config.endpoint_url.is_none());
    }

    #[test]
    fn builder_rejects_empty_partition_key() {
        let err = KinesisConfig::builder()
            .stream_name("change-events")
            .partition_key("")
            .build()
            .unwrap_err();
        assert_eq!(err, KinesisConfigError::EmptyPartitionKey);
    }

    #[test]
    fn builder_full() {
        let config = KinesisConfig::builder()
            .stream_name("change-events")
            .partition_key("orders")
            .region("eu-west-1")
            .endpoint_url("http://localhost:4566")
            .build()
            .unwrap();

        assert_eq!(config.stream_name, "change-events");
        assert_eq!(config.partition_key, "orders");
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:4566"));
    }
}
