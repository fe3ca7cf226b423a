// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the API key manager and rotation scheduler.

use keyward_vault::VaultError;
use thiserror::Error;

use crate::types::ApiKeyStatus;

/// Result type alias for API key operations.
pub type Result<T> = std::result::Result<T, ApiKeyError>;

#[derive(Debug, Error)]
pub enum ApiKeyError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("api key not found: {0}")]
	NotFound(String),

	#[error("api key {id} is {status}, expected active")]
	InvalidState { id: String, status: ApiKeyStatus },

	/// Uniform authentication failure.
	#[error("invalid credentials")]
	InvalidCredentials,

	#[error("rotation scheduler is already running")]
	AlreadyRunning,

	#[error("secret store error: {0}")]
	Store(#[from] VaultError),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl ApiKeyError {
	pub fn is_not_found(&self) -> bool {
		match self {
			ApiKeyError::NotFound(_) => true,
			ApiKeyError::Store(e) => e.is_not_found(),
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn not_found_is_forwarded_from_store() {
		assert!(ApiKeyError::NotFound("org-1/x".to_string()).is_not_found());
		assert!(ApiKeyError::Store(VaultError::NotFound {
			path: "apikeys/org-1/x".to_string()
		})
		.is_not_found());
		assert!(!ApiKeyError::Store(VaultError::Closed).is_not_found());
		assert!(!ApiKeyError::InvalidCredentials.is_not_found());
	}

	#[test]
	fn invalid_credentials_message_is_generic() {
		assert_eq!(ApiKeyError::InvalidCredentials.to_string(), "invalid credentials");
	}

	#[test]
	fn invalid_state_names_the_status() {
		let err = ApiKeyError::InvalidState {
			id: "abc".to_string(),
			status: ApiKeyStatus::Revoked,
		};
		assert_eq!(err.to_string(), "api key abc is revoked, expected active");
	}
}
