// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key issuance, lookup, rotation and revocation.
//!
//! Records live at `{path_prefix}/{organization_id}/{id}` in a [`SecretStore`].
//! Lookup by secret is a linear scan of the organization; there is no index.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use keyward_common_secret::constant_time_eq;
use keyward_vault::SecretStore;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::error::{ApiKeyError, Result};
use crate::types::{ApiKey, ApiKeyStatus, StoredApiKey};

const ID_BYTES: usize = 16;
const SECRET_BYTES: usize = 32;

pub const DEFAULT_PREFIX: &str = "sk";
pub const DEFAULT_TTL: Duration = Duration::from_secs(90 * 24 * 60 * 60);
pub const DEFAULT_PATH_PREFIX: &str = "apikeys";

/// Issuance settings.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
	/// Prepended to every secret as `{prefix}_`.
	pub prefix: String,
	/// Lifetime of a key from creation or rotation. Zero means no expiry.
	pub ttl: Duration,
	/// Store path under which organizations are kept.
	pub path_prefix: String,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			prefix: DEFAULT_PREFIX.to_string(),
			ttl: DEFAULT_TTL,
			path_prefix: DEFAULT_PATH_PREFIX.to_string(),
		}
	}
}

impl From<&keyward_config::ApiKeysConfig> for ManagerConfig {
	fn from(config: &keyward_config::ApiKeysConfig) -> Self {
		Self {
			prefix: config.prefix.clone(),
			ttl: config.ttl(),
			path_prefix: config.path_prefix.clone(),
		}
	}
}

/// Manages API keys on a [`SecretStore`]. Cheap to clone.
#[derive(Clone)]
pub struct ApiKeyManager {
	store: Arc<dyn SecretStore>,
	config: Arc<ManagerConfig>,
}

impl ApiKeyManager {
	pub fn new(store: Arc<dyn SecretStore>, config: ManagerConfig) -> Result<Self> {
		if config.prefix.is_empty() || config.prefix.contains('/') {
			return Err(ApiKeyError::InvalidArgument(format!(
				"key prefix '{}' must be non-empty and contain no '/'",
				config.prefix
			)));
		}
		let path_prefix = config.path_prefix.trim_matches('/').to_string();
		if path_prefix.is_empty() {
			return Err(ApiKeyError::InvalidArgument(
				"key path prefix must not be empty".to_string(),
			));
		}

		Ok(Self {
			store,
			config: Arc::new(ManagerConfig {
				path_prefix,
				..config
			}),
		})
	}

	pub fn config(&self) -> &ManagerConfig {
		&self.config
	}

	/// Create an active key and return it with its one-time plaintext secret.
	#[instrument(skip(self, scopes), fields(organization_id = %organization_id))]
	pub async fn create_key<I, S>(
		&self,
		organization_id: &str,
		user_id: &str,
		name: &str,
		scopes: I,
	) -> Result<ApiKey>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		validate_segment("organization_id", organization_id)?;
		if name.trim().is_empty() {
			return Err(ApiKeyError::InvalidArgument("name must not be empty".to_string()));
		}

		let now = Utc::now();
		let record = StoredApiKey {
			id: random_token(ID_BYTES),
			secret: self.generate_secret(),
			organization_id: organization_id.to_string(),
			user_id: user_id.to_string(),
			name: name.to_string(),
			prefix: self.config.prefix.clone(),
			scopes: scopes.into_iter().map(Into::into).collect(),
			status: ApiKeyStatus::Active,
			created_at: now,
			last_used_at: None,
			expires_at: expiry_from(now, self.config.ttl)?,
			rotated_at: None,
			revoked_at: None,
			previous_secret_hash: None,
			previous_secret_expires_at: None,
		};

		self.write(&record).await?;
		info!(key_id = %record.id, name = %record.name, "api key created");
		Ok(record.to_api_key(true))
	}

	/// Read a key. The secret is always cleared.
	#[instrument(skip(self))]
	pub async fn get_key(&self, organization_id: &str, id: &str) -> Result<ApiKey> {
		Ok(self.read(organization_id, id).await?.to_api_key(false))
	}

	/// Find the key whose current secret (or previous secret, during its grace
	/// period) matches `secret`.
	///
	/// Malformed, unknown and revoked secrets all return the same
	/// [`ApiKeyError::NotFound`]. A match refreshes `last_used_at` in the background.
	#[instrument(skip(self, secret))]
	pub async fn get_key_by_secret(&self, organization_id: &str, secret: &str) -> Result<ApiKey> {
		let not_found = || ApiKeyError::NotFound(format!("{organization_id}/<secret>"));

		validate_segment("organization_id", organization_id)?;
		if !self.is_well_formed(secret) {
			return Err(not_found());
		}

		let now = Utc::now();
		let presented_hash = hash_secret(secret);

		for id in self.list_key_ids(organization_id).await? {
			let record = match self.read(organization_id, &id).await {
				Ok(record) => record,
				Err(e) => {
					warn!(key_id = %id, error = %e, "skipping unreadable api key during lookup");
					continue;
				}
			};
			if record.status == ApiKeyStatus::Revoked {
				continue;
			}

			if matches_secret(&record, secret, &presented_hash, now) {
				self.touch_in_background(organization_id, &record.id);
				return Ok(record.to_api_key(false));
			}
		}

		Err(not_found())
	}

	/// Resolve `secret` to a usable key.
	///
	/// Every failure, including store errors, becomes [`ApiKeyError::InvalidCredentials`].
	#[instrument(skip(self, secret))]
	pub async fn authenticate(&self, organization_id: &str, secret: &str) -> Result<ApiKey> {
		let key = match self.get_key_by_secret(organization_id, secret).await {
			Ok(key) => key,
			Err(e) if e.is_not_found() => {
				debug!("api key authentication failed: no matching key");
				return Err(ApiKeyError::InvalidCredentials);
			}
			Err(e) => {
				warn!(error = %e, "api key authentication failed");
				return Err(ApiKeyError::InvalidCredentials);
			}
		};

		if !key.is_usable(Utc::now()) {
			debug!(key_id = %key.id, status = %key.status, "api key authentication failed: key not usable");
			return Err(ApiKeyError::InvalidCredentials);
		}
		Ok(key)
	}

	/// All keys of an organization, secrets cleared. Unreadable records are skipped.
	#[instrument(skip(self))]
	pub async fn list_keys(&self, organization_id: &str) -> Result<Vec<ApiKey>> {
		let mut keys = Vec::new();
		for id in self.list_key_ids(organization_id).await? {
			match self.read(organization_id, &id).await {
				Ok(record) => keys.push(record.to_api_key(false)),
				Err(e) => warn!(key_id = %id, error = %e, "skipping unreadable api key"),
			}
		}
		Ok(keys)
	}

	/// Organizations that have at least one key path in the store.
	pub async fn list_organizations(&self) -> Result<Vec<String>> {
		let names = self.store.list(&self.config.path_prefix).await?;
		Ok(names
			.into_iter()
			.filter_map(|name| name.strip_suffix('/').map(str::to_string))
			.filter(|name| !name.is_empty())
			.collect())
	}

	/// Issue a new secret for an active key, keeping its id.
	///
	/// With a non-zero `grace_period` the replaced secret keeps authenticating
	/// until `now + grace_period`, but never past its own expiry. An already
	/// expired secret gets no grace.
	#[instrument(skip(self))]
	pub async fn rotate_key(
		&self,
		organization_id: &str,
		id: &str,
		grace_period: Duration,
	) -> Result<ApiKey> {
		let mut record = self.read(organization_id, id).await?;
		if record.status != ApiKeyStatus::Active {
			return Err(ApiKeyError::InvalidState {
				id: id.to_string(),
				status: record.status,
			});
		}

		let now = Utc::now();
		let old_secret_live = !record.secret.is_empty() && record.expires_at.map_or(true, |expires| now < expires);
		let grace_until = expiry_from(now, grace_period)?
			.filter(|_| old_secret_live)
			.map(|until| record.expires_at.map_or(until, |expires| until.min(expires)));
		match grace_until {
			Some(until) => {
				record.previous_secret_hash = Some(hash_secret(&record.secret));
				record.previous_secret_expires_at = Some(until);
			}
			_ => {
				record.previous_secret_hash = None;
				record.previous_secret_expires_at = None;
			}
		}

		record.secret = self.generate_secret();
		record.expires_at = expiry_from(now, self.config.ttl)?;
		record.rotated_at = Some(now);

		self.write(&record).await?;
		info!(
			key_id = %record.id,
			grace_secs = grace_period.as_secs(),
			"api key rotated"
		);
		Ok(record.to_api_key(true))
	}

	/// Revoke a key. Revoking an already revoked key is a no-op.
	#[instrument(skip(self))]
	pub async fn revoke_key(&self, organization_id: &str, id: &str) -> Result<()> {
		let mut record = self.read(organization_id, id).await?;
		if record.status == ApiKeyStatus::Revoked {
			debug!(key_id = %id, "api key already revoked");
			return Ok(());
		}

		record.status = ApiKeyStatus::Revoked;
		record.revoked_at = Some(Utc::now());
		record.secret.clear();
		record.previous_secret_hash = None;
		record.previous_secret_expires_at = None;

		self.write(&record).await?;
		info!(key_id = %id, "api key revoked");
		Ok(())
	}

	/// Remove a key and its whole version history.
	#[instrument(skip(self))]
	pub async fn delete_key(&self, organization_id: &str, id: &str) -> Result<()> {
		let path = self.key_path(organization_id, id)?;
		self.store.delete_all(&path).await?;
		info!(key_id = %id, "api key deleted");
		Ok(())
	}

	/// Set `last_used_at` to now.
	///
	/// The write is conditional on the version that was read, so a concurrent
	/// revoke or rotate always wins and the touch is dropped.
	#[instrument(skip(self))]
	pub async fn update_last_used(&self, organization_id: &str, id: &str) -> Result<()> {
		let (mut record, version) = self.read_versioned(organization_id, id).await?;
		let Some(version) = version else {
			debug!(key_id = %id, "record has no version, skipping last_used_at update");
			return Ok(());
		};
		record.last_used_at = Some(Utc::now());

		let path = self.key_path(organization_id, id)?;
		match self
			.store
			.put_cas(&path, record.to_data()?, record.custom_metadata(), version)
			.await
		{
			Ok(_) => Ok(()),
			Err(e) if e.is_cas_mismatch() => {
				debug!(key_id = %id, "api key changed concurrently, dropping last_used_at update");
				Ok(())
			}
			Err(e) => Err(e.into()),
		}
	}

	fn touch_in_background(&self, organization_id: &str, id: &str) {
		let manager = self.clone();
		let organization_id = organization_id.to_string();
		let id = id.to_string();
		tokio::spawn(async move {
			if let Err(e) = manager.update_last_used(&organization_id, &id).await {
				warn!(key_id = %id, error = %e, "failed to update api key last_used_at");
			}
		});
	}

	fn generate_secret(&self) -> String {
		format!("{}_{}", self.config.prefix, random_token(SECRET_BYTES))
	}

	fn is_well_formed(&self, secret: &str) -> bool {
		secret
			.strip_prefix(self.config.prefix.as_str())
			.and_then(|rest| rest.strip_prefix('_'))
			.is_some_and(|body| !body.is_empty())
	}

	fn org_path(&self, organization_id: &str) -> Result<String> {
		validate_segment("organization_id", organization_id)?;
		Ok(format!("{}/{}", self.config.path_prefix, organization_id))
	}

	fn key_path(&self, organization_id: &str, id: &str) -> Result<String> {
		validate_segment("id", id)?;
		Ok(format!("{}/{}", self.org_path(organization_id)?, id))
	}

	async fn list_key_ids(&self, organization_id: &str) -> Result<Vec<String>> {
		let names = self.store.list(&self.org_path(organization_id)?).await?;
		Ok(names.into_iter().filter(|name| !name.ends_with('/')).collect())
	}

	async fn read(&self, organization_id: &str, id: &str) -> Result<StoredApiKey> {
		Ok(self.read_versioned(organization_id, id).await?.0)
	}

	async fn read_versioned(&self, organization_id: &str, id: &str) -> Result<(StoredApiKey, Option<u64>)> {
		let path = self.key_path(organization_id, id)?;
		let secret = self.store.get(&path).await.map_err(|e| {
			if e.is_not_found() {
				ApiKeyError::NotFound(format!("{organization_id}/{id}"))
			} else {
				ApiKeyError::Store(e)
			}
		})?;
		let version = secret.version();
		Ok((StoredApiKey::from_data(secret.data)?, version))
	}

	async fn write(&self, record: &StoredApiKey) -> Result<()> {
		let path = self.key_path(&record.organization_id, &record.id)?;
		let version = self
			.store
			.put_with_metadata(&path, record.to_data()?, record.custom_metadata())
			.await?;
		debug!(path = %path, version, "api key record written");
		Ok(())
	}
}

impl std::fmt::Debug for ApiKeyManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ApiKeyManager")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

fn validate_segment(field: &str, value: &str) -> Result<()> {
	if value.is_empty() {
		return Err(ApiKeyError::InvalidArgument(format!("{field} must not be empty")));
	}
	if value.contains('/') {
		return Err(ApiKeyError::InvalidArgument(format!("{field} must not contain '/'")));
	}
	Ok(())
}

fn random_token(len: usize) -> String {
	let mut bytes = vec![0u8; len];
	OsRng.fill_bytes(&mut bytes);
	URL_SAFE_NO_PAD.encode(&bytes)
}

pub(crate) fn hash_secret(secret: &str) -> String {
	hex::encode(Sha256::digest(secret.as_bytes()))
}

/// `now + ttl`, or `None` for a zero TTL.
pub(crate) fn expiry_from(now: DateTime<Utc>, ttl: Duration) -> Result<Option<DateTime<Utc>>> {
	if ttl.is_zero() {
		return Ok(None);
	}
	chrono::Duration::from_std(ttl)
		.ok()
		.and_then(|delta| now.checked_add_signed(delta))
		.map(Some)
		.ok_or_else(|| ApiKeyError::InvalidArgument(format!("duration {ttl:?} is out of range")))
}

fn matches_secret(record: &StoredApiKey, secret: &str, presented_hash: &str, now: DateTime<Utc>) -> bool {
	if !record.secret.is_empty() && constant_time_eq(record.secret.as_bytes(), secret.as_bytes()) {
		return true;
	}

	match (&record.previous_secret_hash, record.previous_secret_expires_at) {
		(Some(previous), Some(until)) if now < until => {
			constant_time_eq(previous.as_bytes(), presented_hash.as_bytes())
		}
		_ => false,
	}
}
