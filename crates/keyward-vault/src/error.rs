// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the vault transport and KV engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors raised by the transport client and any [`crate::SecretStore`].
#[derive(Debug, Error)]
pub enum VaultError {
	/// No address was configured.
	#[error("vault address is required")]
	MissingAddress,

	/// No token was configured and none was found in the environment.
	#[error("vault token is required: configure one or set VAULT_TOKEN / VAULT_TOKEN_FILE")]
	MissingToken,

	/// Configuration is present but unusable.
	#[error("invalid vault configuration: {0}")]
	Config(String),

	/// TLS material could not be read from disk.
	#[error("failed to read TLS material at {path}: {source}")]
	TlsRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// TLS material was read but could not be parsed.
	#[error("invalid TLS material at {path}: {source}")]
	TlsParse {
		path: PathBuf,
		#[source]
		source: reqwest::Error,
	},

	/// The HTTP client could not be constructed.
	#[error("failed to build HTTP client: {0}")]
	ClientBuild(#[source] reqwest::Error),

	/// Nothing lives at the requested path (or the requested version is deleted).
	#[error("secret not found: {path}")]
	NotFound { path: String },

	/// The request never produced a response.
	#[error("{operation} {path}: request failed: {source}")]
	Request {
		operation: &'static str,
		path: String,
		#[source]
		source: reqwest::Error,
	},

	/// The server answered with a non-success status.
	#[error("{operation} {path}: server returned {status}: {message}")]
	Status {
		operation: &'static str,
		path: String,
		status: u16,
		message: String,
	},

	/// The server answered with a body we could not interpret.
	#[error("{operation} {path}: malformed response: {message}")]
	Decode {
		operation: &'static str,
		path: String,
		message: String,
	},

	/// The health endpoint reported a server-side failure.
	#[error("vault is unhealthy (status {status})")]
	Unhealthy { status: u16 },

	/// A check-and-set write found a different current version.
	#[error("check-and-set failed for {path}: expected version {expected}")]
	CasMismatch { path: String, expected: u64 },

	/// The caller asked for something the engine cannot do.
	#[error("invalid request: {0}")]
	InvalidRequest(String),

	/// The client was closed before the call.
	#[error("vault client has been closed")]
	Closed,

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl VaultError {
	pub(crate) fn not_found(path: impl Into<String>) -> Self {
		VaultError::NotFound { path: path.into() }
	}

	/// True when the error means "no such secret" rather than a failure.
	pub fn is_not_found(&self) -> bool {
		matches!(self, VaultError::NotFound { .. })
	}

	/// True when a check-and-set write lost to a concurrent writer.
	pub fn is_cas_mismatch(&self) -> bool {
		matches!(self, VaultError::CasMismatch { .. })
	}

	/// True when a caller-side retry with backoff may succeed.
	pub fn is_retryable(&self) -> bool {
		match self {
			VaultError::Request { source, .. } => source.is_timeout() || source.is_connect(),
			VaultError::Status { status, .. } => matches!(*status, 412 | 429 | 500 | 502 | 503 | 504),
			VaultError::Unhealthy { .. } => true,
			_ => false,
		}
	}
}
