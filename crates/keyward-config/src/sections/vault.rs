// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Remote secret store connection section.

use std::path::PathBuf;
use std::time::Duration;

use keyward_common_secret::SecretString;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MOUNT: &str = "secret";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VaultConfigLayer {
	pub address: Option<String>,
	pub token: Option<SecretString>,
	pub mount: Option<String>,
	pub namespace: Option<String>,
	pub ca_cert: Option<PathBuf>,
	pub ca_path: Option<PathBuf>,
	pub client_cert: Option<PathBuf>,
	pub client_key: Option<PathBuf>,
	pub tls_server_name: Option<String>,
	pub skip_verify: Option<bool>,
	pub token_ttl_secs: Option<u64>,
	pub renew_token: Option<bool>,
	pub request_timeout_secs: Option<u64>,
}

impl VaultConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.address.is_some() {
			self.address = other.address;
		}
		if other.token.is_some() {
			self.token = other.token;
		}
		if other.mount.is_some() {
			self.mount = other.mount;
		}
		if other.namespace.is_some() {
			self.namespace = other.namespace;
		}
		if other.ca_cert.is_some() {
			self.ca_cert = other.ca_cert;
		}
		if other.ca_path.is_some() {
			self.ca_path = other.ca_path;
		}
		if other.client_cert.is_some() {
			self.client_cert = other.client_cert;
		}
		if other.client_key.is_some() {
			self.client_key = other.client_key;
		}
		if other.tls_server_name.is_some() {
			self.tls_server_name = other.tls_server_name;
		}
		if other.skip_verify.is_some() {
			self.skip_verify = other.skip_verify;
		}
		if other.token_ttl_secs.is_some() {
			self.token_ttl_secs = other.token_ttl_secs;
		}
		if other.renew_token.is_some() {
			self.renew_token = other.renew_token;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
	}

	pub fn finalize(self) -> VaultConfig {
		VaultConfig {
			address: self.address.unwrap_or_default(),
			token: self.token,
			mount: self.mount.unwrap_or_else(|| DEFAULT_MOUNT.to_string()),
			namespace: self.namespace.filter(|ns| !ns.is_empty()),
			ca_cert: self.ca_cert,
			ca_path: self.ca_path,
			client_cert: self.client_cert,
			client_key: self.client_key,
			tls_server_name: self.tls_server_name,
			skip_verify: self.skip_verify.unwrap_or(false),
			token_ttl_secs: self.token_ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS),
			renew_token: self.renew_token.unwrap_or(true),
			request_timeout_secs: self
				.request_timeout_secs
				.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaultConfig {
	pub address: String,
	pub token: Option<SecretString>,
	pub mount: String,
	pub namespace: Option<String>,
	pub ca_cert: Option<PathBuf>,
	pub ca_path: Option<PathBuf>,
	pub client_cert: Option<PathBuf>,
	pub client_key: Option<PathBuf>,
	pub tls_server_name: Option<String>,
	pub skip_verify: bool,
	pub token_ttl_secs: u64,
	pub renew_token: bool,
	pub request_timeout_secs: u64,
}

impl VaultConfig {
	pub fn token_ttl(&self) -> Duration {
		Duration::from_secs(self.token_ttl_secs)
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}
}

impl Default for VaultConfig {
	fn default() -> Self {
		VaultConfigLayer::default().finalize()
	}
}
