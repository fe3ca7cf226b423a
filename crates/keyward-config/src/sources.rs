// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::env::load_first_secret_env;
use crate::error::ConfigError;
use crate::layer::KeywardConfigLayer;
use crate::sections::{
	ApiKeysConfigLayer, RotationConfigLayer, SigningConfigLayer, VaultConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<KeywardConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<KeywardConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(KeywardConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/keyward/keyward.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<KeywardConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(KeywardConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: KeywardConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `KEYWARD_<SECTION>_<FIELD>`. The stock `VAULT_ADDR` and
/// `VAULT_TOKEN` variables are honoured when the `KEYWARD_` forms are unset.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<KeywardConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(KeywardConfigLayer {
			vault: Some(load_vault_from_env()?),
			apikeys: Some(load_apikeys_from_env()?),
			rotation: Some(load_rotation_from_env()?),
			signer: Some(load_signing_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|v| {
		v.split(',')
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(String::from)
			.collect()
	})
}

fn load_vault_from_env() -> Result<VaultConfigLayer, ConfigError> {
	Ok(VaultConfigLayer {
		address: env_var("KEYWARD_VAULT_ADDR").or_else(|| env_var("VAULT_ADDR")),
		token: load_first_secret_env(&["KEYWARD_VAULT_TOKEN", "VAULT_TOKEN"])?,
		mount: env_var("KEYWARD_VAULT_MOUNT"),
		namespace: env_var("KEYWARD_VAULT_NAMESPACE").or_else(|| env_var("VAULT_NAMESPACE")),
		ca_cert: env_var("KEYWARD_VAULT_CA_CERT").map(PathBuf::from),
		ca_path: env_var("KEYWARD_VAULT_CA_PATH").map(PathBuf::from),
		client_cert: env_var("KEYWARD_VAULT_CLIENT_CERT").map(PathBuf::from),
		client_key: env_var("KEYWARD_VAULT_CLIENT_KEY").map(PathBuf::from),
		tls_server_name: env_var("KEYWARD_VAULT_TLS_SERVER_NAME"),
		skip_verify: env_bool("KEYWARD_VAULT_SKIP_VERIFY"),
		token_ttl_secs: env_u64("KEYWARD_VAULT_TOKEN_TTL_SECS")?,
		renew_token: env_bool("KEYWARD_VAULT_RENEW_TOKEN"),
		request_timeout_secs: env_u64("KEYWARD_VAULT_REQUEST_TIMEOUT_SECS")?,
	})
}

fn load_apikeys_from_env() -> Result<ApiKeysConfigLayer, ConfigError> {
	Ok(ApiKeysConfigLayer {
		prefix: env_var("KEYWARD_APIKEYS_PREFIX"),
		ttl_secs: env_u64("KEYWARD_APIKEYS_TTL_SECS")?,
		path_prefix: env_var("KEYWARD_APIKEYS_PATH_PREFIX"),
	})
}

fn load_rotation_from_env() -> Result<RotationConfigLayer, ConfigError> {
	Ok(RotationConfigLayer {
		enabled: env_bool("KEYWARD_ROTATION_ENABLED"),
		interval_secs: env_u64("KEYWARD_ROTATION_INTERVAL_SECS")?,
		grace_period_secs: env_u64("KEYWARD_ROTATION_GRACE_PERIOD_SECS")?,
		window_secs: env_u64("KEYWARD_ROTATION_WINDOW_SECS")?,
		cleanup_threshold_secs: env_u64("KEYWARD_ROTATION_CLEANUP_THRESHOLD_SECS")?,
		organizations: env_list("KEYWARD_ROTATION_ORGANIZATIONS"),
	})
}

fn load_signing_from_env() -> Result<SigningConfigLayer, ConfigError> {
	Ok(SigningConfigLayer {
		key_path: env_var("KEYWARD_SIGNER_KEY_PATH"),
		identity: env_var("KEYWARD_SIGNER_IDENTITY"),
		auto_generate: env_bool("KEYWARD_SIGNER_AUTO_GENERATE"),
		cache_ttl_secs: env_u64("KEYWARD_SIGNER_CACHE_TTL_SECS")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	#[test]
	fn precedence_ordering() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn missing_toml_file_is_empty_layer() {
		let layer = TomlSource::new("/nonexistent/keyward.toml").load().unwrap();
		assert!(layer.vault.is_none());
	}

	#[test]
	fn toml_source_reads_file() {
		let mut file = NamedTempFile::new().unwrap();
		writeln!(
			file,
			"[vault]\naddress = \"https://vault.internal:8200\"\n\n[signer]\nauto_generate = false"
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(
			layer.vault.unwrap().address.as_deref(),
			Some("https://vault.internal:8200")
		);
		assert_eq!(layer.signer.unwrap().auto_generate, Some(false));
	}

	#[test]
	fn invalid_toml_is_parse_error() {
		let mut file = NamedTempFile::new().unwrap();
		writeln!(file, "[vault\naddress = ").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn env_u64_rejects_garbage() {
		let name = "KEYWARD_TEST_U64_GARBAGE_5521";
		std::env::set_var(name, "ten");
		let err = env_u64(name).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { .. }));
		std::env::remove_var(name);
	}

	#[test]
	fn env_bool_accepts_one_and_true() {
		let name = "KEYWARD_TEST_BOOL_5521";
		std::env::set_var(name, "1");
		assert_eq!(env_bool(name), Some(true));
		std::env::set_var(name, "TRUE");
		assert_eq!(env_bool(name), Some(true));
		std::env::set_var(name, "no");
		assert_eq!(env_bool(name), Some(false));
		std::env::remove_var(name);
		assert_eq!(env_bool(name), None);
	}

	#[test]
	fn env_list_splits_and_trims() {
		let name = "KEYWARD_TEST_LIST_5521";
		std::env::set_var(name, "org-a, org-b,,org-c ");
		assert_eq!(
			env_list(name),
			Some(vec![
				"org-a".to_string(),
				"org-b".to_string(),
				"org-c".to_string()
			])
		);
		std::env::remove_var(name);
	}
}
