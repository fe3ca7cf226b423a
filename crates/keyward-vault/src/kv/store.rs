// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! KV v2 wire protocol over [`VaultClient`].

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::types::{CustomMetadata, SecretData, SecretMetadata, VersionMetadata, VersionedSecret};
use super::SecretStore;
use crate::client::VaultClient;
use crate::error::{Result, VaultError};

/// [`SecretStore`] backed by a KV v2 mount.
#[derive(Debug, Clone)]
pub struct KvStore {
	client: VaultClient,
}

#[derive(Deserialize)]
struct Envelope<T> {
	data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
	version: u64,
}

#[derive(Deserialize)]
struct ReadResponse {
	data: Option<SecretData>,
	metadata: Option<VersionMetadata>,
}

#[derive(Deserialize)]
struct ListResponse {
	#[serde(default)]
	keys: Vec<String>,
}

impl KvStore {
	pub fn new(client: VaultClient) -> Self {
		Self { client }
	}

	pub fn client(&self) -> &VaultClient {
		&self.client
	}

	fn endpoint(&self, kind: &str, path: &str) -> String {
		format!("{}/{}/{}", self.client.mount(), kind, path)
	}

	async fn read(&self, path: &str, version: Option<u64>) -> Result<VersionedSecret> {
		let path = normalize(path)?;
		let mut endpoint = self.endpoint("data", path);
		if let Some(version) = version {
			endpoint.push_str(&format!("?version={version}"));
		}

		let response = self.client.send("read", Method::GET, &endpoint, None).await?;
		let read: ReadResponse = unwrap_data("read", &endpoint, response)?;

		let metadata = read.metadata;
		let gone = metadata
			.as_ref()
			.is_some_and(|m| m.deletion_time.is_some() || m.destroyed);
		match read.data {
			Some(data) if !gone => Ok(VersionedSecret { data, metadata }),
			_ => Err(VaultError::not_found(path)),
		}
	}

	async fn write(
		&self,
		path: &str,
		data: SecretData,
		custom_metadata: CustomMetadata,
		cas: Option<u64>,
	) -> Result<u64> {
		let path = normalize(path)?;
		let endpoint = self.endpoint("data", path);

		let mut options = serde_json::Map::new();
		if !custom_metadata.is_empty() {
			options.insert("custom_metadata".to_string(), json!(custom_metadata));
		}
		if let Some(cas) = cas {
			options.insert("cas".to_string(), json!(cas));
		}
		let mut body = json!({ "data": data });
		if !options.is_empty() {
			body["options"] = Value::Object(options);
		}

		let response = match self
			.client
			.send("write", Method::POST, &endpoint, Some(&body))
			.await
		{
			Ok(response) => response,
			Err(e) => {
				return Err(match cas {
					Some(expected) if is_cas_rejection(&e) => VaultError::CasMismatch {
						path: path.to_string(),
						expected,
					},
					_ => e,
				})
			}
		};
		let written: WriteResponse = unwrap_data("write", &endpoint, response)?;

		debug!(path, version = written.version, "secret written");
		Ok(written.version)
	}

	async fn versions_call(&self, operation: &'static str, kind: &str, path: &str, versions: &[u64]) -> Result<()> {
		let endpoint = self.endpoint(kind, path);
		let body = json!({ "versions": versions });
		self.client
			.send(operation, Method::POST, &endpoint, Some(&body))
			.await?;
		Ok(())
	}
}

#[async_trait]
impl SecretStore for KvStore {
	#[instrument(skip(self, data, custom_metadata), fields(mount = %self.client.mount()))]
	async fn put_with_metadata(
		&self,
		path: &str,
		data: SecretData,
		custom_metadata: CustomMetadata,
	) -> Result<u64> {
		self.write(path, data, custom_metadata, None).await
	}

	#[instrument(skip(self, data, custom_metadata), fields(mount = %self.client.mount()))]
	async fn put_cas(
		&self,
		path: &str,
		data: SecretData,
		custom_metadata: CustomMetadata,
		cas: u64,
	) -> Result<u64> {
		self.write(path, data, custom_metadata, Some(cas)).await
	}

	#[instrument(skip(self), fields(mount = %self.client.mount()))]
	async fn get(&self, path: &str) -> Result<VersionedSecret> {
		self.read(path, None).await
	}

	#[instrument(skip(self), fields(mount = %self.client.mount()))]
	async fn get_version(&self, path: &str, version: u64) -> Result<VersionedSecret> {
		self.read(path, Some(version)).await
	}

	#[instrument(skip(self), fields(mount = %self.client.mount()))]
	async fn delete_versions(&self, path: &str, versions: &[u64]) -> Result<()> {
		let path = normalize(path)?;
		let result = if versions.is_empty() {
			let endpoint = self.endpoint("data", path);
			self.client
				.send("delete", Method::DELETE, &endpoint, None)
				.await
				.map(|_| ())
		} else {
			self.versions_call("delete", "delete", path, versions).await
		};
		ignore_not_found(result)?;
		debug!(path, ?versions, "secret versions soft-deleted");
		Ok(())
	}

	#[instrument(skip(self), fields(mount = %self.client.mount()))]
	async fn undelete(&self, path: &str, versions: &[u64]) -> Result<()> {
		let path = normalize(path)?;
		if versions.is_empty() {
			return Err(VaultError::InvalidRequest(
				"undelete requires at least one version".to_string(),
			));
		}
		self.versions_call("undelete", "undelete", path, versions).await?;
		debug!(path, ?versions, "secret versions restored");
		Ok(())
	}

	#[instrument(skip(self), fields(mount = %self.client.mount()))]
	async fn destroy(&self, path: &str, versions: &[u64]) -> Result<()> {
		let path = normalize(path)?;
		if versions.is_empty() {
			return Err(VaultError::InvalidRequest(
				"destroy requires at least one version".to_string(),
			));
		}
		ignore_not_found(self.versions_call("destroy", "destroy", path, versions).await)?;
		debug!(path, ?versions, "secret versions destroyed");
		Ok(())
	}

	#[instrument(skip(self), fields(mount = %self.client.mount()))]
	async fn delete_all(&self, path: &str) -> Result<()> {
		let path = normalize(path)?;
		let endpoint = self.endpoint("metadata", path);
		ignore_not_found(
			self.client
				.send("delete_all", Method::DELETE, &endpoint, None)
				.await
				.map(|_| ()),
		)?;
		debug!(path, "secret and all versions removed");
		Ok(())
	}

	#[instrument(skip(self), fields(mount = %self.client.mount()))]
	async fn list(&self, path: &str) -> Result<Vec<String>> {
		let path = path.trim_matches('/');
		let endpoint = self.endpoint("metadata", path);
		let list = Method::from_bytes(b"LIST")
			.map_err(|e| VaultError::InvalidRequest(e.to_string()))?;

		match self.client.send("list", list, &endpoint, None).await {
			Ok(response) => {
				let listed: ListResponse = unwrap_data("list", &endpoint, response)?;
				Ok(listed.keys)
			}
			Err(e) if e.is_not_found() => Ok(Vec::new()),
			Err(e) => Err(e),
		}
	}

	#[instrument(skip(self), fields(mount = %self.client.mount()))]
	async fn get_metadata(&self, path: &str) -> Result<SecretMetadata> {
		let path = normalize(path)?;
		let endpoint = self.endpoint("metadata", path);
		let response = self
			.client
			.send("metadata", Method::GET, &endpoint, None)
			.await?;
		unwrap_data("metadata", &endpoint, response)
	}
}

fn normalize(path: &str) -> Result<&str> {
	let trimmed = path.trim_matches('/');
	if trimmed.is_empty() {
		return Err(VaultError::InvalidRequest("secret path must not be empty".to_string()));
	}
	Ok(trimmed)
}

/// Every KV v2 response wraps its payload in a top-level `data` object.
fn unwrap_data<T: DeserializeOwned>(
	operation: &'static str,
	endpoint: &str,
	response: Option<Value>,
) -> Result<T> {
	let decode_error = |message: String| VaultError::Decode {
		operation,
		path: endpoint.to_string(),
		message,
	};

	let body = response.ok_or_else(|| decode_error("empty response body".to_string()))?;
	let envelope: Envelope<T> =
		serde_json::from_value(body).map_err(|e| decode_error(e.to_string()))?;
	envelope
		.data
		.ok_or_else(|| decode_error("response has no data".to_string()))
}

/// KV v2 answers a failed check-and-set with a 400 naming the parameter.
fn is_cas_rejection(error: &VaultError) -> bool {
	matches!(
		error,
		VaultError::Status { status: 400, message, .. } if message.contains("check-and-set")
	)
}

fn ignore_not_found(result: Result<()>) -> Result<()> {
	match result {
		Err(e) if e.is_not_found() => Ok(()),
		other => other,
	}
}
