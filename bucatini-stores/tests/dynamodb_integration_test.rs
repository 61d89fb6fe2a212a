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

#![cfg(feature = "dynamodb")]

use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use bson::doc;
use bucatini_core::CheckpointStore;
use bucatini_stores::dynamodb::DynamoStore;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::dynamodb_local::DynamoDb;

const TABLE_NAME: &str = "relay-checkpoints";

/// Starts a DynamoDB Local container, creates the checkpoint table, and
/// returns a store connected to it. The container must stay alive for the
/// duration of the test.
async fn create_test_store() -> (DynamoStore, ContainerAsync<DynamoDb>) {
    let container = DynamoDb::default()
        .start()
        .await
        .expect("failed to start DynamoDB Local container");

    let port = container
        .get_host_port_ipv4(8000)
        .await
        .expect("failed to get port");

    let config = aws_sdk_dynamodb::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .endpoint_url(format!("http://127.0.0.1:{port}"))
        .credentials_provider(Credentials::new("test", "test", None, None, "test"))
        .build();
    let client = Client::from_conf(config);

    client
        .create_table()
        .table_name(TABLE_NAME)
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name("collectionName")
                .attribute_type(ScalarAttributeType::S)
                .build()
                .expect("valid attribute definition"),
        )
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name("collectionName")
                .key_type(KeyType::Hash)
                .build()
                .expect("valid key schema"),
        )
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await
        .expect("failed to create checkpoint table");

    (DynamoStore::from_client(client, TABLE_NAME), container)
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_save_and_get_round_trips_unchanged() {
    let (store, _container) = create_test_store().await;

    // Tokens can carry arbitrary BSON; the stored form must come back
    // identical.
    let token = doc! {
        "_data": "8264ABCD0000FF17",
        "ts": bson::Timestamp { time: 1_700_000_000, increment: 7 },
    };

    store
        .save_resume_token("appdb.orders", &token)
        .await
        .expect("failed to save token");

    let retrieved = store
        .get_resume_token("appdb.orders")
        .await
        .expect("failed to get token");

    assert_eq!(retrieved, Some(token));
    store.close().await.expect("failed to close store");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_get_nonexistent_token_returns_none() {
    let (store, _container) = create_test_store().await;

    let retrieved = store
        .get_resume_token("appdb.missing")
        .await
        .expect("failed to get token");

    assert!(retrieved.is_none());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_save_is_idempotent_and_last_write_wins() {
    let (store, _container) = create_test_store().await;

    let token_v1 = doc! { "_data": "token_v1" };
    store
        .save_resume_token("appdb.orders", &token_v1)
        .await
        .expect("failed to save token");
    store
        .save_resume_token("appdb.orders", &token_v1)
        .await
        .expect("failed to re-save token");

    assert_eq!(
        store.get_resume_token("appdb.orders").await.unwrap(),
        Some(token_v1)
    );

    let token_v2 = doc! { "_data": "token_v2" };
    store
        .save_resume_token("appdb.orders", &token_v2)
        .await
        .expect("failed to update token");

    assert_eq!(
        store.get_resume_token("appdb.orders").await.unwrap(),
        Some(token_v2)
    );
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_delete_removes_the_token() {
    let (store, _container) = create_test_store().await;

    store
        .save_resume_token("appdb.orders", &doc! { "_data": "token" })
        .await
        .expect("failed to save token");

    store
        .delete_resume_token("appdb.orders")
        .await
        .expect("failed to delete token");

    assert!(store
        .get_resume_token("appdb.orders")
        .await
        .unwrap()
        .is_none());

    // Deleting again is not an error.
    store
        .delete_resume_token("appdb.orders")
        .await
        .expect("failed to delete missing token");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_keys_are_isolated_per_collection() {
    let (store, _container) = create_test_store().await;

    store
        .save_resume_token("appdb.orders", &doc! { "_data": "orders" })
        .await
        .unwrap();
    store
        .save_resume_token("appdb.users", &doc! { "_data": "users" })
        .await
        .unwrap();

    assert_eq!(
        store.get_resume_token("appdb.orders").await.unwrap(),
        Some(doc! { "_data": "orders" })
    );
    assert_eq!(
        store.get_resume_token("appdb.users").await.unwrap(),
        Some(doc! { "_data": "users" })
    );
}
