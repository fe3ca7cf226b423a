// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration for the keyward credential engine.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`KEYWARD_*`)
//! - `VAR` / `VAR_FILE` secret loading for the store token
//!
//! # Usage
//!
//! ```ignore
//! use keyward_config::load_config;
//!
//! let config = load_config()?;
//! println!("store at {} (mount {})", config.vault.address, config.vault.mount);
//! ```

pub mod env;
pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use env::{load_first_secret_env, load_secret_env, SecretEnvError};
pub use error::ConfigError;
pub use layer::KeywardConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved engine configuration.
#[derive(Debug, Clone, Default)]
pub struct KeywardConfig {
	pub vault: VaultConfig,
	pub apikeys: ApiKeysConfig,
	pub rotation: RotationConfig,
	pub signer: SigningConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`KEYWARD_*`, then `VAULT_ADDR` / `VAULT_TOKEN`)
/// 2. Config file (`/etc/keyward/keyward.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<KeywardConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<KeywardConfig, ConfigError> {
	let mut merged = KeywardConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<KeywardConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<KeywardConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = KeywardConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: KeywardConfigLayer) -> Result<KeywardConfig, ConfigError> {
	let config = KeywardConfig {
		vault: layer.vault.unwrap_or_default().finalize(),
		apikeys: layer.apikeys.unwrap_or_default().finalize(),
		rotation: layer.rotation.unwrap_or_default().finalize(),
		signer: layer.signer.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		address = %config.vault.address,
		mount = %config.vault.mount,
		namespace = config.vault.namespace.as_deref().unwrap_or(""),
		token_configured = config.vault.token.is_some(),
		tls_client_auth = config.vault.client_cert.is_some(),
		key_prefix = %config.apikeys.prefix,
		rotation_enabled = config.rotation.enabled,
		rotation_interval_secs = config.rotation.interval_secs,
		signing_key_path = %config.signer.key_path,
		"Keyward configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &KeywardConfig) -> Result<(), ConfigError> {
	if config.vault.token_ttl_secs == 0 {
		return Err(ConfigError::Validation(
			"KEYWARD_VAULT_TOKEN_TTL_SECS must be greater than zero".to_string(),
		));
	}

	if config.vault.client_cert.is_some() != config.vault.client_key.is_some() {
		return Err(ConfigError::Validation(
			"KEYWARD_VAULT_CLIENT_CERT and KEYWARD_VAULT_CLIENT_KEY must be set together"
				.to_string(),
		));
	}

	if config.rotation.enabled && config.rotation.interval_secs == 0 {
		return Err(ConfigError::Validation(
			"KEYWARD_ROTATION_INTERVAL_SECS must be greater than zero when rotation is enabled"
				.to_string(),
		));
	}

	if config.apikeys.ttl_secs > 0 && config.rotation.window_secs >= config.apikeys.ttl_secs {
		return Err(ConfigError::Validation(format!(
			"rotation window ({}s) must be shorter than the key TTL ({}s), \
			 otherwise every key is rotated on every check",
			config.rotation.window_secs, config.apikeys.ttl_secs
		)));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	#[test]
	fn default_config_is_valid() {
		let config = finalize(KeywardConfigLayer::default()).unwrap();
		assert_eq!(config.vault.mount, "secret");
		assert_eq!(config.apikeys.prefix, "sk");
		assert!(config.rotation.enabled);
	}

	#[test]
	fn zero_token_ttl_is_rejected() {
		let layer = KeywardConfigLayer {
			vault: Some(VaultConfigLayer {
				token_ttl_secs: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		let err = finalize(layer).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn client_cert_without_key_is_rejected() {
		let layer = KeywardConfigLayer {
			vault: Some(VaultConfigLayer {
				client_cert: Some(PathBuf::from("/etc/keyward/client.pem")),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(finalize(layer).is_err());
	}

	#[test]
	fn zero_interval_is_rejected_only_when_enabled() {
		let enabled = KeywardConfigLayer {
			rotation: Some(RotationConfigLayer {
				interval_secs: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(finalize(enabled).is_err());

		let disabled = KeywardConfigLayer {
			rotation: Some(RotationConfigLayer {
				enabled: Some(false),
				interval_secs: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(finalize(disabled).is_ok());
	}

	#[test]
	fn window_must_be_shorter_than_ttl() {
		let layer = KeywardConfigLayer {
			apikeys: Some(ApiKeysConfigLayer {
				ttl_secs: Some(3600),
				..Default::default()
			}),
			rotation: Some(RotationConfigLayer {
				window_secs: Some(3600),
				..Default::default()
			}),
			..Default::default()
		};
		let err = finalize(layer).unwrap_err();
		assert!(err.to_string().contains("rotation window"));
	}

	#[test]
	fn window_is_ignored_for_non_expiring_keys() {
		let layer = KeywardConfigLayer {
			apikeys: Some(ApiKeysConfigLayer {
				ttl_secs: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(finalize(layer).is_ok());
	}

	#[test]
	fn config_file_layer_is_applied() {
		use std::io::Write;
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"[vault]\nmount = \"kv-apps\"\n\n[signer]\nidentity = \"audit-svc\""
		)
		.unwrap();

		let mut merged = KeywardConfigLayer::default();
		merged.merge(TomlSource::new(file.path()).load().unwrap());
		let config = finalize(merged).unwrap();
		assert_eq!(config.vault.mount, "kv-apps");
		assert_eq!(config.signer.identity, "audit-svc");
	}
}
