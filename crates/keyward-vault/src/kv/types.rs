// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Versioned secret types.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Field name to arbitrary JSON value.
pub type SecretData = Map<String, Value>;

/// Path-level custom metadata.
pub type CustomMetadata = HashMap<String, String>;

/// One version of a secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedSecret {
	pub data: SecretData,
	#[serde(default)]
	pub metadata: Option<VersionMetadata>,
}

impl VersionedSecret {
	pub fn version(&self) -> Option<u64> {
		self.metadata.as_ref().map(|m| m.version)
	}

	/// String field accessor; `None` when missing or not a string.
	pub fn get_str(&self, field: &str) -> Option<&str> {
		self.data.get(field).and_then(Value::as_str)
	}
}

/// Metadata attached to a single version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
	pub version: u64,
	pub created_time: DateTime<Utc>,
	#[serde(default, deserialize_with = "empty_time_as_none")]
	pub deletion_time: Option<DateTime<Utc>>,
	#[serde(default)]
	pub destroyed: bool,
	#[serde(default, deserialize_with = "null_as_default")]
	pub custom_metadata: CustomMetadata,
}

/// Per-version entry in [`SecretMetadata::versions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
	pub created_time: DateTime<Utc>,
	#[serde(default, deserialize_with = "empty_time_as_none")]
	pub deletion_time: Option<DateTime<Utc>>,
	#[serde(default)]
	pub destroyed: bool,
}

impl VersionInfo {
	/// Readable: neither soft-deleted nor destroyed.
	pub fn is_live(&self) -> bool {
		self.deletion_time.is_none() && !self.destroyed
	}
}

/// Path-level metadata, without data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretMetadata {
	pub current_version: u64,
	#[serde(default)]
	pub oldest_version: u64,
	pub created_time: DateTime<Utc>,
	pub updated_time: DateTime<Utc>,
	#[serde(default, deserialize_with = "null_as_default")]
	pub custom_metadata: CustomMetadata,
	#[serde(default, deserialize_with = "version_map")]
	pub versions: BTreeMap<u64, VersionInfo>,
}

/// The server sends `""` for "never deleted".
fn empty_time_as_none<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw: Option<String> = Option::deserialize(deserializer)?;
	match raw.as_deref() {
		None | Some("") => Ok(None),
		Some(s) => DateTime::parse_from_rfc3339(s)
			.map(|t| Some(t.with_timezone(&Utc)))
			.map_err(serde::de::Error::custom),
	}
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Version numbers arrive as JSON object keys, i.e. strings.
fn version_map<'de, D>(deserializer: D) -> Result<BTreeMap<u64, VersionInfo>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw: Option<BTreeMap<String, VersionInfo>> = Option::deserialize(deserializer)?;
	raw.unwrap_or_default()
		.into_iter()
		.map(|(k, v)| {
			k.parse::<u64>()
				.map(|n| (n, v))
				.map_err(|_| serde::de::Error::custom(format!("invalid version key '{k}'")))
		})
		.collect()
}
