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

#![cfg(feature = "kinesis")]

use aws_config::{BehaviorVersion, Region};
use aws_sdk_kinesis::config::Credentials;
use aws_sdk_kinesis::types::{ShardIteratorType, StreamStatus};
use aws_sdk_kinesis::Client;
use bson::doc;
use bucatini_core::event::{ChangeEvent, Namespace, OperationType};
use bucatini_core::Publisher;
use bucatini_destinations::kinesis::{KinesisConfig, KinesisPublisher};
use chrono::Utc;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::localstack::LocalStack;

const STREAM_NAME: &str = "change-events";

fn sample_event(id: i32) -> ChangeEvent {
    ChangeEvent {
        operation: OperationType::Insert,
        namespace: Namespace::new("appdb", "orders"),
        document_key: Some(doc! { "_id": id }),
        full_document: Some(doc! { "_id": id, "value": format!("v{id}") }),
        update_description: None,
        cluster_time: Utc::now(),
        resume_token: doc! { "_data": format!("token-{id}") },
    }
}

/// Starts LocalStack, creates a single-shard stream and waits until it is
/// active. The container must stay alive for the duration of the test.
async fn create_test_publisher() -> (KinesisPublisher, Client, ContainerAsync<LocalStack>) {
    let container = LocalStack::default()
        .with_env_var("SERVICES", "kinesis")
        .start()
        .await
        .expect("failed to start LocalStack container");

    let port = container
        .get_host_port_ipv4(4566)
        .await
        .expect("failed to get port");

    let sdk_config = aws_sdk_kinesis::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .endpoint_url(format!("http://127.0.0.1:{port}"))
        .credentials_provider(Credentials::new("test", "test", None, None, "test"))
        .build();
    let client = Client::from_conf(sdk_config);

    client
        .create_stream()
        .stream_name(STREAM_NAME)
        .shard_count(1)
        .send()
        .await
        .expect("failed to create stream");

    for _ in 0..60 {
        let summary = client
            .describe_stream_summary()
            .stream_name(STREAM_NAME)
            .send()
            .await
            .expect("failed to describe stream");
        if summary
            .stream_description_summary()
            .map(|s| s.stream_status() == &StreamStatus::Active)
            .unwrap_or(false)
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let config = KinesisConfig::builder()
        .stream_name(STREAM_NAME)
        .build()
        .unwrap();

    (
        KinesisPublisher::from_client(client.clone(), config),
        client,
        container,
    )
}

/// Reads every record currently on the stream's single shard, as UTF-8
/// payload strings in sequence order.
async fn read_all_records(client: &Client) -> Vec<String> {
    let shards = client
        .list_shards()
        .stream_name(STREAM_NAME)
        .send()
        .await
        .expect("failed to list shards");
    let shard_id = shards.shards()[0].shard_id().to_string();

    let iterator = client
        .get_shard_iterator()
        .stream_name(STREAM_NAME)
        .shard_id(shard_id)
        .shard_iterator_type(ShardIteratorType::TrimHorizon)
        .send()
        .await
        .expect("failed to get shard iterator")
        .shard_iterator()
        .expect("missing shard iterator")
        .to_string();

    let records = client
        .get_records()
        .shard_iterator(iterator)
        .send()
        .await
        .expect("failed to get records");

    records
        .records()
        .iter()
        .map(|r| String::from_utf8(r.data().as_ref().to_vec()).expect("non-utf8 payload"))
        .collect()
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_publish_acknowledges_with_sequence_number() {
    let (mut publisher, _client, _container) = create_test_publisher().await;

    let receipt = publisher
        .publish(&sample_event(1))
        .await
        .expect("publish failed");

    assert!(!receipt.sequence_number.is_empty());
    assert!(receipt.shard_id.is_some());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_records_arrive_in_publish_order_on_one_shard() {
    let (mut publisher, client, _container) = create_test_publisher().await;

    for id in 1..=3 {
        publisher
            .publish(&sample_event(id))
            .await
            .expect("publish failed");
    }

    let payloads = read_all_records(&client).await;
    assert_eq!(payloads.len(), 3);
    for (i, payload) in payloads.iter().enumerate() {
        // Canonical Extended JSON of the event, in the order published.
        assert!(payload.contains(&format!("token-{}", i + 1)));
        assert!(payload.contains("\"operationType\":\"insert\""));
    }
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_payloads_are_resubmitted_verbatim() {
    let (mut publisher, client, _container) = create_test_publisher().await;

    let event = sample_event(7);
    publisher.publish(&event).await.expect("publish failed");
    publisher.publish(&event).await.expect("publish failed");

    let payloads = read_all_records(&client).await;
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0], payloads[1]);
    assert_eq!(payloads[0], event.to_payload().unwrap());
}
