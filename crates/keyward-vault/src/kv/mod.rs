// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Versioned key-value secrets.
//!
//! Every write creates a new version; nothing is mutated in place. Reads return
//! the latest version unless one is requested. Soft delete hides a version and
//! can be undone, destroy removes version data permanently, and `delete_all`
//! drops the path with its whole history.

mod memory;
mod store;
mod types;

pub use memory::MemorySecretStore;
pub use store::KvStore;
pub use types::{
	CustomMetadata, SecretData, SecretMetadata, VersionInfo, VersionMetadata, VersionedSecret,
};

use async_trait::async_trait;

use crate::error::Result;

/// Storage seam shared by the credential manager, the rotation scheduler and
/// the audit signer.
///
/// Paths are relative to the engine mount, e.g. `apikeys/org-1/abc`.
#[async_trait]
pub trait SecretStore: Send + Sync {
	/// Write a new version and return its number.
	async fn put(&self, path: &str, data: SecretData) -> Result<u64> {
		self.put_with_metadata(path, data, CustomMetadata::new()).await
	}

	/// Write a new version and replace the path's custom metadata.
	/// An empty map leaves existing custom metadata untouched.
	async fn put_with_metadata(
		&self,
		path: &str,
		data: SecretData,
		custom_metadata: CustomMetadata,
	) -> Result<u64>;

	/// Write a new version only if the path's current version is `cas`; 0
	/// means the path must not exist yet. Otherwise fails with
	/// [`VaultError::CasMismatch`](crate::VaultError::CasMismatch).
	async fn put_cas(
		&self,
		path: &str,
		data: SecretData,
		custom_metadata: CustomMetadata,
		cas: u64,
	) -> Result<u64>;

	/// Latest version. Deleted or destroyed latest versions are not found.
	async fn get(&self, path: &str) -> Result<VersionedSecret>;

	async fn get_version(&self, path: &str, version: u64) -> Result<VersionedSecret>;

	/// Soft-delete the latest version.
	async fn delete(&self, path: &str) -> Result<()> {
		self.delete_versions(path, &[]).await
	}

	/// Soft-delete `versions`; an empty slice means the latest version.
	async fn delete_versions(&self, path: &str, versions: &[u64]) -> Result<()>;

	/// Restore soft-deleted versions.
	async fn undelete(&self, path: &str, versions: &[u64]) -> Result<()>;

	/// Permanently remove the data of `versions`. An empty slice is rejected.
	async fn destroy(&self, path: &str, versions: &[u64]) -> Result<()>;

	/// Remove the path, every version, and its metadata.
	async fn delete_all(&self, path: &str) -> Result<()>;

	/// Names directly beneath `path`. Sub-directories end in `/`.
	/// A missing path lists as empty.
	async fn list(&self, path: &str) -> Result<Vec<String>>;

	async fn get_metadata(&self, path: &str) -> Result<SecretMetadata>;
}
