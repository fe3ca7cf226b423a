// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key records and derived rotation views.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use keyward_common_secret::SecretString;
use keyward_vault::{CustomMetadata, SecretData};
use serde::{Deserialize, Serialize};

use crate::error::{ApiKeyError, Result};

/// Lifecycle status of an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
	Active,
	Rotated,
	Revoked,
	Expired,
}

impl ApiKeyStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			ApiKeyStatus::Active => "active",
			ApiKeyStatus::Rotated => "rotated",
			ApiKeyStatus::Revoked => "revoked",
			ApiKeyStatus::Expired => "expired",
		}
	}
}

impl fmt::Display for ApiKeyStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// An API key as handed to callers.
///
/// `secret` is only populated by [`crate::ApiKeyManager::create_key`] and
/// [`crate::ApiKeyManager::rotate_key`]; every read path clears it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub secret: Option<SecretString>,
	pub organization_id: String,
	pub user_id: String,
	pub name: String,
	pub prefix: String,
	pub scopes: BTreeSet<String>,
	pub status: ApiKeyStatus,
	pub created_at: DateTime<Utc>,
	pub last_used_at: Option<DateTime<Utc>>,
	/// `None` for keys issued with a zero TTL.
	pub expires_at: Option<DateTime<Utc>>,
	pub rotated_at: Option<DateTime<Utc>>,
	pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.is_some_and(|expires| now >= expires)
	}

	/// Active and not past its expiry.
	pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
		self.status == ApiKeyStatus::Active && !self.is_expired(now)
	}

	/// Stored status, with Active keys past their expiry reported as Expired.
	pub fn effective_status(&self, now: DateTime<Utc>) -> ApiKeyStatus {
		if self.status == ApiKeyStatus::Active && self.is_expired(now) {
			ApiKeyStatus::Expired
		} else {
			self.status
		}
	}

	pub fn has_scope(&self, scope: &str) -> bool {
		self.scopes.contains(scope)
	}
}

/// Persisted form of an API key, carrying the plaintext secret and the
/// previous-secret fields used during a rotation grace period.
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct StoredApiKey {
	pub id: String,
	#[serde(default)]
	pub secret: String,
	pub organization_id: String,
	#[serde(default)]
	pub user_id: String,
	pub name: String,
	pub prefix: String,
	#[serde(default)]
	pub scopes: BTreeSet<String>,
	pub status: ApiKeyStatus,
	pub created_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_used_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rotated_at: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub revoked_at: Option<DateTime<Utc>>,
	/// Lowercase hex SHA-256 of the secret replaced by the last rotation.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub previous_secret_hash: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub previous_secret_expires_at: Option<DateTime<Utc>>,
}

impl StoredApiKey {
	pub fn from_data(data: SecretData) -> Result<Self> {
		Ok(serde_json::from_value(serde_json::Value::Object(data))?)
	}

	pub fn to_data(&self) -> Result<SecretData> {
		match serde_json::to_value(self)? {
			serde_json::Value::Object(map) => Ok(map),
			_ => Err(ApiKeyError::InvalidArgument(
				"api key record did not serialize to an object".to_string(),
			)),
		}
	}

	/// Path-level metadata kept alongside every write, for store-side browsing.
	pub fn custom_metadata(&self) -> CustomMetadata {
		let mut metadata = CustomMetadata::new();
		metadata.insert("organization_id".to_string(), self.organization_id.clone());
		metadata.insert("user_id".to_string(), self.user_id.clone());
		metadata.insert("name".to_string(), self.name.clone());
		metadata.insert("status".to_string(), self.status.as_str().to_string());
		metadata
	}

	/// Caller-facing view. The secret is included only when `with_secret` is set.
	pub fn to_api_key(&self, with_secret: bool) -> ApiKey {
		ApiKey {
			id: self.id.clone(),
			secret: (with_secret && !self.secret.is_empty())
				.then(|| SecretString::new(self.secret.clone())),
			organization_id: self.organization_id.clone(),
			user_id: self.user_id.clone(),
			name: self.name.clone(),
			prefix: self.prefix.clone(),
			scopes: self.scopes.clone(),
			status: self.status,
			created_at: self.created_at,
			last_used_at: self.last_used_at,
			expires_at: self.expires_at,
			rotated_at: self.rotated_at,
			revoked_at: self.revoked_at,
		}
	}
}

/// Per-key rotation outlook inside a [`RotationStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRotationInfo {
	pub id: String,
	pub name: String,
	pub expires_at: DateTime<Utc>,
	/// Whole days until the rotation window opens; negative once inside it.
	pub days_until_rotation: i64,
}

/// Key counts for one organization, by effective status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationStatus {
	pub organization_id: String,
	pub total: usize,
	pub active: usize,
	pub rotated: usize,
	pub revoked: usize,
	pub expired: usize,
	pub keys: Vec<KeyRotationInfo>,
}

/// Outcome of one scheduler cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
	pub organizations: usize,
	pub rotated: usize,
	pub deleted: usize,
	pub failures: usize,
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;

	fn stored(status: ApiKeyStatus, expires_at: Option<DateTime<Utc>>) -> StoredApiKey {
		StoredApiKey {
			id: "abc".to_string(),
			secret: "sk_plain".to_string(),
			organization_id: "org-1".to_string(),
			user_id: "user-1".to_string(),
			name: "svc".to_string(),
			prefix: "sk".to_string(),
			scopes: ["read".to_string()].into_iter().collect(),
			status,
			created_at: Utc::now(),
			last_used_at: None,
			expires_at,
			rotated_at: None,
			revoked_at: None,
			previous_secret_hash: None,
			previous_secret_expires_at: None,
		}
	}

	#[test]
	fn status_serializes_lowercase() {
		assert_eq!(
			serde_json::to_value(ApiKeyStatus::Revoked).unwrap(),
			serde_json::json!("revoked")
		);
	}

	#[test]
	fn effective_status_reports_lazy_expiry() {
		let now = Utc::now();
		let expired = stored(ApiKeyStatus::Active, Some(now - Duration::seconds(1))).to_api_key(false);
		assert_eq!(expired.effective_status(now), ApiKeyStatus::Expired);
		assert!(!expired.is_usable(now));

		let live = stored(ApiKeyStatus::Active, Some(now + Duration::days(1))).to_api_key(false);
		assert_eq!(live.effective_status(now), ApiKeyStatus::Active);
		assert!(live.is_usable(now));

		let revoked = stored(ApiKeyStatus::Revoked, Some(now - Duration::days(1))).to_api_key(false);
		assert_eq!(revoked.effective_status(now), ApiKeyStatus::Revoked);
	}

	#[test]
	fn key_without_expiry_never_expires() {
		let key = stored(ApiKeyStatus::Active, None).to_api_key(false);
		assert!(key.is_usable(Utc::now() + Duration::days(10_000)));
	}

	#[test]
	fn secret_is_only_included_on_request() {
		let record = stored(ApiKeyStatus::Active, None);
		assert!(record.to_api_key(false).secret.is_none());
		assert_eq!(
			record.to_api_key(true).secret.unwrap().expose(),
			"sk_plain"
		);
	}

	#[test]
	fn api_key_debug_never_shows_secret() {
		let key = stored(ApiKeyStatus::Active, None).to_api_key(true);
		assert!(!format!("{key:?}").contains("sk_plain"));
	}

	#[test]
	fn stored_record_survives_store_data() {
		let record = stored(ApiKeyStatus::Active, None);
		let data = record.to_data().unwrap();
		assert_eq!(data.get("secret").and_then(|v| v.as_str()), Some("sk_plain"));
		assert!(!data.contains_key("previous_secret_hash"));

		let back = StoredApiKey::from_data(data).unwrap();
		assert_eq!(back.id, "abc");
		assert_eq!(back.secret, "sk_plain");
		assert!(back.scopes.contains("read"));
	}

	#[test]
	fn custom_metadata_has_lookup_fields() {
		let metadata = stored(ApiKeyStatus::Active, None).custom_metadata();
		assert_eq!(metadata.get("organization_id").map(String::as_str), Some("org-1"));
		assert_eq!(metadata.get("status").map(String::as_str), Some("active"));
	}
}
