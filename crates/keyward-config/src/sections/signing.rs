// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit signing key section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_KEY_PATH: &str = "audit/signing-key";
pub const DEFAULT_IDENTITY: &str = "keyward";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SigningConfigLayer {
	pub key_path: Option<String>,
	pub identity: Option<String>,
	pub auto_generate: Option<bool>,
	pub cache_ttl_secs: Option<u64>,
}

impl SigningConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.key_path.is_some() {
			self.key_path = other.key_path;
		}
		if other.identity.is_some() {
			self.identity = other.identity;
		}
		if other.auto_generate.is_some() {
			self.auto_generate = other.auto_generate;
		}
		if other.cache_ttl_secs.is_some() {
			self.cache_ttl_secs = other.cache_ttl_secs;
		}
	}

	pub fn finalize(self) -> SigningConfig {
		SigningConfig {
			key_path: self.key_path.unwrap_or_else(|| DEFAULT_KEY_PATH.to_string()),
			identity: self.identity.unwrap_or_else(|| DEFAULT_IDENTITY.to_string()),
			auto_generate: self.auto_generate.unwrap_or(true),
			cache_ttl_secs: self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SigningConfig {
	pub key_path: String,
	pub identity: String,
	pub auto_generate: bool,
	pub cache_ttl_secs: u64,
}

impl SigningConfig {
	pub fn cache_ttl(&self) -> Duration {
		Duration::from_secs(self.cache_ttl_secs)
	}
}

impl Default for SigningConfig {
	fn default() -> Self {
		SigningConfigLayer::default().finalize()
	}
}
