// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process [`SecretStore`] with KV v2 version semantics.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::types::{
	CustomMetadata, SecretData, SecretMetadata, VersionInfo, VersionMetadata, VersionedSecret,
};
use super::SecretStore;
use crate::error::{Result, VaultError};

struct StoredVersion {
	data: Option<SecretData>,
	created_time: DateTime<Utc>,
	deletion_time: Option<DateTime<Utc>>,
	destroyed: bool,
}

impl StoredVersion {
	fn is_live(&self) -> bool {
		self.deletion_time.is_none() && !self.destroyed
	}
}

struct Entry {
	current_version: u64,
	created_time: DateTime<Utc>,
	updated_time: DateTime<Utc>,
	custom_metadata: CustomMetadata,
	versions: BTreeMap<u64, StoredVersion>,
}

impl Entry {
	fn resolve(&self, version: u64) -> u64 {
		if version == 0 {
			self.current_version
		} else {
			version
		}
	}

	fn version_metadata(&self, version: u64, stored: &StoredVersion) -> VersionMetadata {
		VersionMetadata {
			version,
			created_time: stored.created_time,
			deletion_time: stored.deletion_time,
			destroyed: stored.destroyed,
			custom_metadata: self.custom_metadata.clone(),
		}
	}
}

/// Secret store held in memory. Used for tests and local development.
#[derive(Default)]
pub struct MemorySecretStore {
	entries: RwLock<BTreeMap<String, Entry>>,
}

impl MemorySecretStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of paths, including ones whose versions are all deleted.
	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}

	async fn write(
		&self,
		path: &str,
		data: SecretData,
		custom_metadata: CustomMetadata,
		cas: Option<u64>,
	) -> Result<u64> {
		let path = normalize(path)?;
		let now = Utc::now();
		let mut entries = self.entries.write().await;

		if let Some(expected) = cas {
			let current = entries.get(path).map_or(0, |entry| entry.current_version);
			if current != expected {
				return Err(VaultError::CasMismatch {
					path: path.to_string(),
					expected,
				});
			}
		}

		let entry = entries.entry(path.to_string()).or_insert_with(|| Entry {
			current_version: 0,
			created_time: now,
			updated_time: now,
			custom_metadata: CustomMetadata::new(),
			versions: BTreeMap::new(),
		});

		entry.current_version += 1;
		entry.updated_time = now;
		if !custom_metadata.is_empty() {
			entry.custom_metadata = custom_metadata;
		}
		entry.versions.insert(
			entry.current_version,
			StoredVersion {
				data: Some(data),
				created_time: now,
				deletion_time: None,
				destroyed: false,
			},
		);
		Ok(entry.current_version)
	}
}

impl std::fmt::Debug for MemorySecretStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemorySecretStore").finish_non_exhaustive()
	}
}

fn normalize(path: &str) -> Result<&str> {
	let trimmed = path.trim_matches('/');
	if trimmed.is_empty() {
		return Err(VaultError::InvalidRequest("secret path must not be empty".to_string()));
	}
	Ok(trimmed)
}

#[async_trait]
impl SecretStore for MemorySecretStore {
	async fn put_with_metadata(
		&self,
		path: &str,
		data: SecretData,
		custom_metadata: CustomMetadata,
	) -> Result<u64> {
		self.write(path, data, custom_metadata, None).await
	}

	async fn put_cas(
		&self,
		path: &str,
		data: SecretData,
		custom_metadata: CustomMetadata,
		cas: u64,
	) -> Result<u64> {
		self.write(path, data, custom_metadata, Some(cas)).await
	}

	async fn get(&self, path: &str) -> Result<VersionedSecret> {
		self.get_version(path, 0).await
	}

	async fn get_version(&self, path: &str, version: u64) -> Result<VersionedSecret> {
		let path = normalize(path)?;
		let entries = self.entries.read().await;
		let entry = entries.get(path).ok_or_else(|| VaultError::not_found(path))?;

		let version = entry.resolve(version);
		let stored = entry
			.versions
			.get(&version)
			.filter(|v| v.is_live())
			.ok_or_else(|| VaultError::not_found(path))?;
		let data = stored.data.clone().ok_or_else(|| VaultError::not_found(path))?;

		Ok(VersionedSecret {
			data,
			metadata: Some(entry.version_metadata(version, stored)),
		})
	}

	async fn delete_versions(&self, path: &str, versions: &[u64]) -> Result<()> {
		let path = normalize(path)?;
		let now = Utc::now();
		let mut entries = self.entries.write().await;
		let Some(entry) = entries.get_mut(path) else {
			return Ok(());
		};

		let targets = if versions.is_empty() {
			vec![entry.current_version]
		} else {
			versions.to_vec()
		};
		for version in targets {
			if let Some(stored) = entry.versions.get_mut(&version) {
				if stored.deletion_time.is_none() && !stored.destroyed {
					stored.deletion_time = Some(now);
				}
			}
		}
		entry.updated_time = now;
		Ok(())
	}

	async fn undelete(&self, path: &str, versions: &[u64]) -> Result<()> {
		let path = normalize(path)?;
		if versions.is_empty() {
			return Err(VaultError::InvalidRequest(
				"undelete requires at least one version".to_string(),
			));
		}
		let mut entries = self.entries.write().await;
		let entry = entries
			.get_mut(path)
			.ok_or_else(|| VaultError::not_found(path))?;

		for version in versions {
			if let Some(stored) = entry.versions.get_mut(version) {
				if !stored.destroyed {
					stored.deletion_time = None;
				}
			}
		}
		entry.updated_time = Utc::now();
		Ok(())
	}

	async fn destroy(&self, path: &str, versions: &[u64]) -> Result<()> {
		let path = normalize(path)?;
		if versions.is_empty() {
			return Err(VaultError::InvalidRequest(
				"destroy requires at least one version".to_string(),
			));
		}
		let mut entries = self.entries.write().await;
		let Some(entry) = entries.get_mut(path) else {
			return Ok(());
		};

		for version in versions {
			if let Some(stored) = entry.versions.get_mut(version) {
				stored.destroyed = true;
				stored.data = None;
			}
		}
		entry.updated_time = Utc::now();
		Ok(())
	}

	async fn delete_all(&self, path: &str) -> Result<()> {
		let path = normalize(path)?;
		self.entries.write().await.remove(path);
		Ok(())
	}

	async fn list(&self, path: &str) -> Result<Vec<String>> {
		let trimmed = path.trim_matches('/');
		let prefix = if trimmed.is_empty() {
			String::new()
		} else {
			format!("{trimmed}/")
		};

		let entries = self.entries.read().await;
		let names: BTreeSet<String> = entries
			.keys()
			.filter_map(|key| key.strip_prefix(prefix.as_str()))
			.filter(|rest| !rest.is_empty())
			.map(|rest| match rest.split_once('/') {
				Some((dir, _)) => format!("{dir}/"),
				None => rest.to_string(),
			})
			.collect();
		Ok(names.into_iter().collect())
	}

	async fn get_metadata(&self, path: &str) -> Result<SecretMetadata> {
		let path = normalize(path)?;
		let entries = self.entries.read().await;
		let entry = entries.get(path).ok_or_else(|| VaultError::not_found(path))?;

		Ok(SecretMetadata {
			current_version: entry.current_version,
			oldest_version: entry.versions.keys().next().copied().unwrap_or(0),
			created_time: entry.created_time,
			updated_time: entry.updated_time,
			custom_metadata: entry.custom_metadata.clone(),
			versions: entry
				.versions
				.iter()
				.map(|(version, stored)| {
					(
						*version,
						VersionInfo {
							created_time: stored.created_time,
							deletion_time: stored.deletion_time,
							destroyed: stored.destroyed,
						},
					)
				})
				.collect(),
		})
	}
}
