// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key issuance section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_KEY_PREFIX: &str = "sk";
pub const DEFAULT_KEY_TTL_SECS: u64 = 90 * 24 * 60 * 60;
pub const DEFAULT_PATH_PREFIX: &str = "apikeys";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiKeysConfigLayer {
	pub prefix: Option<String>,
	pub ttl_secs: Option<u64>,
	pub path_prefix: Option<String>,
}

impl ApiKeysConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.prefix.is_some() {
			self.prefix = other.prefix;
		}
		if other.ttl_secs.is_some() {
			self.ttl_secs = other.ttl_secs;
		}
		if other.path_prefix.is_some() {
			self.path_prefix = other.path_prefix;
		}
	}

	pub fn finalize(self) -> ApiKeysConfig {
		ApiKeysConfig {
			prefix: self.prefix.unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
			ttl_secs: self.ttl_secs.unwrap_or(DEFAULT_KEY_TTL_SECS),
			path_prefix: self
				.path_prefix
				.unwrap_or_else(|| DEFAULT_PATH_PREFIX.to_string()),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKeysConfig {
	pub prefix: String,
	/// Zero disables expiry.
	pub ttl_secs: u64,
	pub path_prefix: String,
}

impl ApiKeysConfig {
	pub fn ttl(&self) -> Duration {
		Duration::from_secs(self.ttl_secs)
	}
}

impl Default for ApiKeysConfig {
	fn default() -> Self {
		ApiKeysConfigLayer::default().finalize()
	}
}
