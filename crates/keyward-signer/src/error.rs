// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use keyward_vault::VaultError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SignerError>;

#[derive(Debug, Error)]
pub enum SignerError {
	#[error("invalid signer configuration: {0}")]
	Config(String),

	#[error("no signing key at {path}")]
	KeyNotFound { path: String },

	#[error("invalid signature length: expected {expected} bytes, got {actual}")]
	InvalidSignatureLength { expected: usize, actual: usize },

	#[error("invalid key material: {0}")]
	InvalidKey(String),

	#[error("cryptographic operation failed: {0}")]
	Crypto(String),

	#[error("secret store error: {0}")]
	Store(#[from] VaultError),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl SignerError {
	pub fn is_not_found(&self) -> bool {
		match self {
			SignerError::KeyNotFound { .. } => true,
			SignerError::Store(e) => e.is_not_found(),
			_ => false,
		}
	}
}
