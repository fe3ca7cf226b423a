// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! KV v2 wire protocol against a mock store.

use std::collections::HashMap;

use keyward_vault::{KvStore, SecretData, SecretStore, VaultClient, VaultError};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer) -> KvStore {
	let client = VaultClient::builder()
		.address(server.uri())
		.token("hvs.test")
		.renew_token(false)
		.build()
		.unwrap();
	KvStore::new(client)
}

fn data(pairs: &[(&str, &str)]) -> SecretData {
	pairs
		.iter()
		.map(|(k, v)| (k.to_string(), json!(v)))
		.collect()
}

#[tokio::test]
async fn put_wraps_data_and_returns_version() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/secret/data/apps/db"))
		.and(body_json(json!({"data": {"password": "hunter2"}})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"data": {"version": 3, "created_time": "2025-01-01T00:00:00Z", "deletion_time": "", "destroyed": false}
		})))
		.expect(1)
		.mount(&server)
		.await;

	let version = store(&server)
		.put("apps/db", data(&[("password", "hunter2")]))
		.await
		.unwrap();
	assert_eq!(version, 3);
}

#[tokio::test]
async fn put_with_metadata_sends_custom_metadata_option() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/secret/data/apikeys/org-1/abc"))
		.and(body_json(json!({
			"data": {"name": "svc"},
			"options": {"custom_metadata": {"organization_id": "org-1"}}
		})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"version": 1}})))
		.expect(1)
		.mount(&server)
		.await;

	let mut custom = HashMap::new();
	custom.insert("organization_id".to_string(), "org-1".to_string());
	let version = store(&server)
		.put_with_metadata("apikeys/org-1/abc", data(&[("name", "svc")]), custom)
		.await
		.unwrap();
	assert_eq!(version, 1);
}

#[tokio::test]
async fn put_cas_sends_expected_version() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/secret/data/apikeys/org-1/abc"))
		.and(body_json(json!({
			"data": {"name": "svc"},
			"options": {"cas": 4}
		})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"version": 5}})))
		.expect(1)
		.mount(&server)
		.await;

	let version = store(&server)
		.put_cas("apikeys/org-1/abc", data(&[("name", "svc")]), HashMap::new(), 4)
		.await
		.unwrap();
	assert_eq!(version, 5);
}

#[tokio::test]
async fn put_cas_conflict_is_cas_mismatch() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/secret/data/apikeys/org-1/abc"))
		.respond_with(ResponseTemplate::new(400).set_body_json(json!({
			"errors": ["check-and-set parameter did not match the current version"]
		})))
		.expect(1)
		.mount(&server)
		.await;

	let err = store(&server)
		.put_cas("apikeys/org-1/abc", data(&[("name", "svc")]), HashMap::new(), 4)
		.await
		.unwrap_err();
	assert!(err.is_cas_mismatch(), "{err:?}");
	assert!(matches!(err, VaultError::CasMismatch { expected: 4, .. }));
}

#[tokio::test]
async fn custom_mount_is_used_in_paths() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/kv-apps/data/x"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"version": 1}})))
		.expect(1)
		.mount(&server)
		.await;

	let client = VaultClient::builder()
		.address(server.uri())
		.token("hvs.test")
		.mount("kv-apps")
		.renew_token(false)
		.build()
		.unwrap();
	KvStore::new(client).put("x", SecretData::new()).await.unwrap();
}

#[tokio::test]
async fn get_returns_data_and_metadata() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/v1/secret/data/apps/db"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"data": {
				"data": {"password": "hunter2"},
				"metadata": {
					"version": 2,
					"created_time": "2025-01-01T00:00:00.000000Z",
					"deletion_time": "",
					"destroyed": false,
					"custom_metadata": null
				}
			}
		})))
		.mount(&server)
		.await;

	let secret = store(&server).get("apps/db").await.unwrap();
	assert_eq!(secret.get_str("password"), Some("hunter2"));
	assert_eq!(secret.version(), Some(2));
}

#[tokio::test]
async fn get_version_sends_query_parameter() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/v1/secret/data/apps/db"))
		.and(query_param("version", "1"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"data": {
				"data": {"password": "old"},
				"metadata": {"version": 1, "created_time": "2025-01-01T00:00:00Z", "deletion_time": "", "destroyed": false}
			}
		})))
		.expect(1)
		.mount(&server)
		.await;

	let secret = store(&server).get_version("apps/db", 1).await.unwrap();
	assert_eq!(secret.get_str("password"), Some("old"));
}

#[tokio::test]
async fn deleted_version_is_not_found() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/v1/secret/data/apps/db"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"data": {
				"data": null,
				"metadata": {"version": 2, "created_time": "2025-01-01T00:00:00Z", "deletion_time": "2025-01-02T00:00:00Z", "destroyed": false}
			}
		})))
		.mount(&server)
		.await;

	let err = store(&server).get("apps/db").await.unwrap_err();
	assert!(err.is_not_found());
}

#[tokio::test]
async fn missing_secret_is_not_found() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
		.mount(&server)
		.await;

	let err = store(&server).get("apps/missing").await.unwrap_err();
	assert!(err.is_not_found());
}

#[tokio::test]
async fn delete_latest_uses_data_endpoint() {
	let server = MockServer::start().await;
	Mock::given(method("DELETE"))
		.and(path("/v1/secret/data/apps/db"))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;

	store(&server).delete("apps/db").await.unwrap();
}

#[tokio::test]
async fn delete_versions_posts_version_list() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/secret/delete/apps/db"))
		.and(body_json(json!({"versions": [1, 2]})))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;

	store(&server).delete_versions("apps/db", &[1, 2]).await.unwrap();
}

#[tokio::test]
async fn undelete_posts_version_list() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/secret/undelete/apps/db"))
		.and(body_json(json!({"versions": [2]})))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;

	store(&server).undelete("apps/db", &[2]).await.unwrap();
}

#[tokio::test]
async fn destroy_posts_version_list() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/secret/destroy/apps/db"))
		.and(body_json(json!({"versions": [1]})))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;

	store(&server).destroy("apps/db", &[1]).await.unwrap();
}

#[tokio::test]
async fn destroy_without_versions_makes_no_request() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(204))
		.expect(0)
		.mount(&server)
		.await;

	let err = store(&server).destroy("apps/db", &[]).await.unwrap_err();
	assert!(matches!(err, VaultError::InvalidRequest(_)));
}

#[tokio::test]
async fn removals_are_idempotent_when_target_is_gone() {
	let server = MockServer::start().await;
	Mock::given(wiremock::matchers::any())
		.respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
		.mount(&server)
		.await;

	let store = store(&server);
	store.delete("apps/gone").await.unwrap();
	store.delete_versions("apps/gone", &[4]).await.unwrap();
	store.destroy("apps/gone", &[4]).await.unwrap();
	store.delete_all("apps/gone").await.unwrap();
}

#[tokio::test]
async fn delete_all_uses_metadata_endpoint() {
	let server = MockServer::start().await;
	Mock::given(method("DELETE"))
		.and(path("/v1/secret/metadata/apikeys/org-1/abc"))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;

	store(&server).delete_all("apikeys/org-1/abc").await.unwrap();
}

#[tokio::test]
async fn list_uses_list_verb() {
	let server = MockServer::start().await;
	Mock::given(method("LIST"))
		.and(path("/v1/secret/metadata/apikeys"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"data": {"keys": ["org-1/", "org-2/"]}
		})))
		.expect(1)
		.mount(&server)
		.await;

	let keys = store(&server).list("apikeys/").await.unwrap();
	assert_eq!(keys, vec!["org-1/", "org-2/"]);
}

#[tokio::test]
async fn list_of_missing_path_is_empty() {
	let server = MockServer::start().await;
	Mock::given(method("LIST"))
		.respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
		.mount(&server)
		.await;

	let keys = store(&server).list("apikeys/org-9").await.unwrap();
	assert!(keys.is_empty());
}

#[tokio::test]
async fn get_metadata_parses_versions() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/v1/secret/metadata/apps/db"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"data": {
				"current_version": 2,
				"oldest_version": 1,
				"created_time": "2025-01-01T00:00:00Z",
				"updated_time": "2025-01-02T00:00:00Z",
				"custom_metadata": {"owner": "platform"},
				"max_versions": 0,
				"versions": {
					"1": {"created_time": "2025-01-01T00:00:00Z", "deletion_time": "", "destroyed": true},
					"2": {"created_time": "2025-01-02T00:00:00Z", "deletion_time": "", "destroyed": false}
				}
			}
		})))
		.mount(&server)
		.await;

	let meta = store(&server).get_metadata("apps/db").await.unwrap();
	assert_eq!(meta.current_version, 2);
	assert!(meta.versions[&1].destroyed);
	assert!(meta.versions[&2].is_live());
	assert_eq!(meta.custom_metadata.get("owner").map(String::as_str), Some("platform"));
}

#[tokio::test]
async fn store_rejects_calls_after_client_close() {
	let server = MockServer::start().await;
	let store = store(&server);
	store.client().close().await;

	let err = store.get("apps/db").await.unwrap_err();
	assert!(matches!(err, VaultError::Closed));
}
