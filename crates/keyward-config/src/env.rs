// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loading secrets from the environment.
//!
//! Supports the `VAR` / `VAR_FILE` convention: `VAR_FILE` names a file holding the
//! secret (Docker and Kubernetes secret mounts, Vault Agent sinks) and wins over
//! `VAR` when both are set. A single trailing newline in the file is stripped.

use std::path::PathBuf;
use std::{env, fs};

use keyward_common_secret::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("failed to read secret file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

/// Load `var` from the environment, preferring `{var}_FILE`.
///
/// Returns `Ok(None)` when neither is set or the direct value is empty.
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path_str) = env::var(&file_var) {
		if path_str.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}

		let path = PathBuf::from(&path_str);
		let content = fs::read_to_string(&path).map_err(|source| SecretEnvError::Io {
			path: path.clone(),
			source,
		})?;

		let secret = content.strip_suffix('\n').unwrap_or(&content).to_string();
		return Ok(Some(SecretString::new(secret)));
	}

	match env::var(var) {
		Ok(value) if !value.is_empty() => Ok(Some(SecretString::new(value))),
		_ => Ok(None),
	}
}

/// Try each variable in order and return the first secret found.
pub fn load_first_secret_env(vars: &[&str]) -> Result<Option<SecretString>, SecretEnvError> {
	for var in vars {
		if let Some(secret) = load_secret_env(var)? {
			return Ok(Some(secret));
		}
	}
	Ok(None)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	#[test]
	fn returns_none_when_unset() {
		let var = "KEYWARD_TEST_UNSET_TOKEN_9183";
		env::remove_var(var);
		env::remove_var(format!("{var}_FILE"));

		assert!(load_secret_env(var).unwrap().is_none());
	}

	#[test]
	fn empty_direct_value_is_treated_as_unset() {
		let var = "KEYWARD_TEST_EMPTY_TOKEN_9183";
		env::set_var(var, "");
		env::remove_var(format!("{var}_FILE"));

		assert!(load_secret_env(var).unwrap().is_none());

		env::remove_var(var);
	}

	#[test]
	fn reads_direct_value() {
		let var = "KEYWARD_TEST_DIRECT_TOKEN_9183";
		env::set_var(var, "hvs.direct");
		env::remove_var(format!("{var}_FILE"));

		let secret = load_secret_env(var).unwrap().unwrap();
		assert_eq!(secret.expose(), "hvs.direct");

		env::remove_var(var);
	}

	#[test]
	fn file_wins_over_direct_value_and_strips_newline() {
		let var = "KEYWARD_TEST_FILE_TOKEN_9183";
		let mut file = NamedTempFile::new().unwrap();
		writeln!(file, "hvs.from-file").unwrap();

		env::set_var(var, "hvs.direct");
		env::set_var(format!("{var}_FILE"), file.path().to_str().unwrap());

		let secret = load_secret_env(var).unwrap().unwrap();
		assert_eq!(secret.expose(), "hvs.from-file");

		env::remove_var(var);
		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn missing_file_is_an_error() {
		let var = "KEYWARD_TEST_MISSING_FILE_9183";
		env::set_var(format!("{var}_FILE"), "/nonexistent/keyward/token");

		assert!(matches!(
			load_secret_env(var).unwrap_err(),
			SecretEnvError::Io { .. }
		));

		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn empty_file_path_is_an_error() {
		let var = "KEYWARD_TEST_EMPTY_PATH_9183";
		env::set_var(format!("{var}_FILE"), "");

		assert!(matches!(
			load_secret_env(var).unwrap_err(),
			SecretEnvError::EmptyPath { .. }
		));

		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn first_secret_falls_through_in_order() {
		let primary = "KEYWARD_TEST_PRIMARY_9183";
		let fallback = "KEYWARD_TEST_FALLBACK_9183";
		env::remove_var(primary);
		env::remove_var(format!("{primary}_FILE"));
		env::set_var(fallback, "hvs.fallback");

		let secret = load_first_secret_env(&[primary, fallback]).unwrap().unwrap();
		assert_eq!(secret.expose(), "hvs.fallback");

		env::remove_var(fallback);
	}
}
