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

//! Unit tests for Kinesis publisher configuration.

#![cfg(feature = "kinesis")]

use bucatini_destinations::kinesis::{KinesisConfig, KinesisConfigError};

#[test]
fn test_config_builder_minimal() {
    let config = KinesisConfig::builder()
        .stream_name("change-events")
        .build()
        .unwrap();

    assert_eq!(config.stream_name, "change-events");
    assert_eq!(config.partition_key, "1");
    assert_eq!(config.region, None);
    assert_eq!(config.endpoint_url, None);
}

#[test]
fn test_config_builder_full() {
    let config = KinesisConfig::builder()
        .stream_name("change-events")
        .partition_key("tenant-7")
        .region("eu-west-1")
        .endpoint_url("http://localhost:4566")
        .build()
        .unwrap();

    assert_eq!(config.stream_name, "change-events");
    assert_eq!(config.partition_key, "tenant-7");
    assert_eq!(config.region, Some("eu-west-1".to_string()));
    assert_eq!(config.endpoint_url, Some("http://localhost:4566".to_string()));
}

#[test]
fn test_config_builder_missing_stream_name() {
    let result = KinesisConfig::builder().region("eu-west-1").build();
    assert_eq!(result.unwrap_err(), KinesisConfigError::MissingStreamName);
}

#[test]
fn test_config_builder_empty_stream_name() {
    let result = KinesisConfig::builder().stream_name("").build();
    assert_eq!(result.unwrap_err(), KinesisConfigError::EmptyStreamName);
}

#[test]
fn test_config_builder_empty_partition_key() {
    let result = KinesisConfig::builder()
        .stream_name("change-events")
        .partition_key("")
        .build();
    assert_eq!(result.unwrap_err(), KinesisConfigError::EmptyPartitionKey);
}

#[test]
fn test_config_is_cloneable() {
    let config = KinesisConfig::builder()
        .stream_name("change-events")
        .build()
        .unwrap();

    let cloned = config.clone();
    assert_eq!(cloned.stream_name, config.stream_name);
    assert_eq!(cloned.partition_key, config.partition_key);
}
