// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime configuration for [`crate::VaultClient`].

use std::path::PathBuf;
use std::time::Duration;

use keyward_common_secret::SecretString;

pub const DEFAULT_MOUNT: &str = "secret";
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// TLS material and verification settings.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
	/// PEM file with one or more CA certificates to trust.
	pub ca_cert: Option<PathBuf>,
	/// Directory whose `.pem` / `.crt` files are all trusted.
	pub ca_path: Option<PathBuf>,
	/// Client certificate for mutual TLS. Requires `client_key`.
	pub client_cert: Option<PathBuf>,
	/// Client private key for mutual TLS. Requires `client_cert`.
	pub client_key: Option<PathBuf>,
	/// Name to present via SNI and verify against, instead of the address host.
	pub server_name: Option<String>,
	/// Accept any server certificate. Testing only.
	pub insecure: bool,
}

impl TlsConfig {
	pub fn is_mutual(&self) -> bool {
		self.client_cert.is_some() && self.client_key.is_some()
	}
}

/// Connection settings for the remote store.
#[derive(Debug, Clone)]
pub struct ClientConfig {
	pub address: String,
	/// Falls back to `VAULT_TOKEN` / `VAULT_TOKEN_FILE` when unset.
	pub token: Option<SecretString>,
	pub mount: String,
	pub namespace: Option<String>,
	pub tls: TlsConfig,
	pub token_ttl: Duration,
	pub renew_token: bool,
	pub request_timeout: Duration,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			address: String::new(),
			token: None,
			mount: DEFAULT_MOUNT.to_string(),
			namespace: None,
			tls: TlsConfig::default(),
			token_ttl: DEFAULT_TOKEN_TTL,
			renew_token: true,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
		}
	}
}

impl From<&keyward_config::VaultConfig> for ClientConfig {
	fn from(config: &keyward_config::VaultConfig) -> Self {
		Self {
			address: config.address.clone(),
			token: config.token.clone(),
			mount: config.mount.clone(),
			namespace: config.namespace.clone(),
			tls: TlsConfig {
				ca_cert: config.ca_cert.clone(),
				ca_path: config.ca_path.clone(),
				client_cert: config.client_cert.clone(),
				client_key: config.client_key.clone(),
				server_name: config.tls_server_name.clone(),
				insecure: config.skip_verify,
			},
			token_ttl: config.token_ttl(),
			renew_token: config.renew_token,
			request_timeout: config.request_timeout(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_resolved_section_defaults() {
		let from_section = ClientConfig::from(&keyward_config::VaultConfig::default());
		let default = ClientConfig::default();
		assert_eq!(from_section.mount, default.mount);
		assert_eq!(from_section.token_ttl, default.token_ttl);
		assert_eq!(from_section.request_timeout, default.request_timeout);
		assert_eq!(from_section.renew_token, default.renew_token);
	}

	#[test]
	fn tls_fields_are_carried_over() {
		let section = keyward_config::VaultConfig {
			client_cert: Some(PathBuf::from("/tls/client.pem")),
			client_key: Some(PathBuf::from("/tls/client.key")),
			tls_server_name: Some("vault.internal".to_string()),
			skip_verify: true,
			..Default::default()
		};
		let config = ClientConfig::from(&section);
		assert!(config.tls.is_mutual());
		assert!(config.tls.insecure);
		assert_eq!(config.tls.server_name.as_deref(), Some("vault.internal"));
	}
}
