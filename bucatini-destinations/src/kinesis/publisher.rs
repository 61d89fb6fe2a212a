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

//! Kinesis `PutRecord` publisher.

use crate::kinesis::config::KinesisConfig;
use async_trait::async_trait;
use aws_sdk_kinesis::config::http::HttpResponse;
use aws_sdk_kinesis::config::retry::RetryConfig;
use aws_sdk_kinesis::error::{DisplayErrorContext, SdkError};
use aws_sdk_kinesis::operation::put_record::PutRecordError;
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::Client;
use bucatini_core::event::ChangeEvent;
use bucatini_core::publisher::{PublishError, PublishReceipt, Publisher};
use tracing::{debug, info, trace};

/// Publisher that delivers change events to a Kinesis data stream, one
/// `PutRecord` call per event.
///
/// The record payload is the event's canonical Extended JSON rendering, and
/// every record carries the configured fixed partition key. One publish call
/// is exactly one `PutRecord` request; the SDK's own retry machinery is
/// disabled so the relay's attempt ceiling is authoritative.
pub struct KinesisPublisher {
    client: Client,
    config: KinesisConfig,
}

impl KinesisPublisher {
    /// Creates a publisher from the ambient AWS credential/region chain.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Configuration`] when the configured stream
    /// does not exist or is not active.
    pub async fn new(config: KinesisConfig) -> Result<Self, PublishError> {
        info!(
            stream = %config.stream_name,
            partition_key = %config.partition_key,
            "initializing Kinesis publisher"
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = config.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        if let Some(endpoint_url) = &config.endpoint_url {
            debug!(endpoint_url, "using custom Kinesis endpoint");
            loader = loader.endpoint_url(endpoint_url);
        }
        let aws_config = loader.load().await;

        // The relay counts publish attempts against its own ceiling; retries
        // hidden inside the SDK would inflate that count.
        let kinesis_config = aws_sdk_kinesis::config::Builder::from(&aws_config)
            .retry_config(RetryConfig::disabled())
            .build();

        let publisher = Self::from_client(Client::from_conf(kinesis_config), config);

        publisher
            .client
            .describe_stream_summary()
            .stream_name(&publisher.config.stream_name)
            .send()
            .await
            .map_err(|e| PublishError::Configuration {
                message: format!(
                    "stream {} is not available: {}",
                    publisher.config.stream_name,
                    DisplayErrorContext(&e)
                ),
            })?;

        info!(stream = %publisher.config.stream_name, "Kinesis stream verified");
        Ok(publisher)
    }

    /// Creates a publisher from an existing client, skipping the stream
    /// probe.
    #[must_use]
    pub fn from_client(client: Client, config: KinesisConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Publisher for KinesisPublisher {
    async fn publish(&mut self, event: &ChangeEvent) -> Result<PublishReceipt, PublishError> {
        let payload = event.to_payload().map_err(PublishError::serialization)?;

        trace!(
            stream = %self.config.stream_name,
            bytes = payload.len(),
            "putting record"
        );

        let output = self
            .client
            .put_record()
            .stream_name(&self.config.stream_name)
            .partition_key(&self.config.partition_key)
            .data(Blob::new(payload.into_bytes()))
            .send()
            .await
            .map_err(classify_put_record_error)?;

        Ok(PublishReceipt {
            sequence_number: output.sequence_number().to_string(),
            shard_id: Some(output.shard_id().to_string()),
        })
    }

    fn stream_name(&self) -> &str {
        &self.config.stream_name
    }
}

/// Maps a `PutRecord` failure onto [`PublishError`], deciding whether a
/// resubmission of the same record may succeed.
///
/// Transport failures and throughput throttling are retryable; a missing
/// stream, a rejected argument or a denied KMS key will fail identically on
/// every attempt.
fn classify_put_record_error(err: SdkError<PutRecordError, HttpResponse>) -> PublishError {
    let message = format!("{}", DisplayErrorContext(&err));

    let retryable = match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            return PublishError::Connection {
                message,
                source: Some(Box::new(err)),
            };
        }
        SdkError::ServiceError(ctx) => is_retryable_service_error(ctx.err()),
        _ => false,
    };

    PublishError::Delivery {
        message,
        retryable,
        source: Some(Box::new(err)),
    }
}

/// Service errors where the same record may succeed on a later attempt.
fn is_retryable_service_error(err: &PutRecordError) -> bool {
    err.is_provisioned_throughput_exceeded_exception() || err.is_kms_throttling_exception()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_kinesis::types::error::{
        InvalidArgumentException, KmsThrottlingException,
        ProvisionedThroughputExceededException, ResourceNotFoundException,
    };

    #[test]
    fn throttling_is_retryable() {
        let err = PutRecordError::ProvisionedThroughputExceededException(
            ProvisionedThroughputExceededException::builder().build(),
        );
        assert!(is_retryable_service_error(&err));

        let err = PutRecordError::KmsThrottlingException(
            KmsThrottlingException::builder().build(),
        );
        assert!(is_retryable_service_error(&err));
    }

    #[test]
    fn missing_stream_is_not_retryable() {
        let err = PutRecordError::ResourceNotFoundException(
            ResourceNotFoundException::builder().build(),
        );
        assert!(!is_retryable_service_error(&err));
    }

    #[test]
    fn invalid_argument_is_not_retryable() {
        let err = PutRecordError::InvalidArgumentException(
            InvalidArgumentException::builder().build(),
        );
        assert!(!is_retryable_service_error(&err));
    }
}
