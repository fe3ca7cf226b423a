// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ECDSA P-256 signing of audit payloads.
//!
//! The key pair is stored as a single record at the configured path: a PKCS#8
//! PEM private key, an SPKI PEM public key, the algorithm tag, the signer
//! identity and the creation time. Rotation writes a new version of the same
//! path, so earlier keys survive only in the store's version history.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use keyward_vault::SecretStore;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SignerError};

/// Algorithm tag written with every key.
pub const ALGORITHM: &str = "ECDSA-P256";

/// Length of a fixed-width `r || s` signature.
pub const SIGNATURE_LEN: usize = 64;

pub const DEFAULT_KEY_PATH: &str = "audit/signing-key";
pub const DEFAULT_IDENTITY: &str = "keyward";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct SignerConfig {
	/// Store path of the key record.
	pub key_path: String,
	/// Logical signer name recorded with the key.
	pub identity: String,
	/// Generate a key at construction when none exists.
	pub auto_generate: bool,
	/// How long a loaded key is reused before it is re-read from the store.
	pub cache_ttl: Duration,
}

impl Default for SignerConfig {
	fn default() -> Self {
		Self {
			key_path: DEFAULT_KEY_PATH.to_string(),
			identity: DEFAULT_IDENTITY.to_string(),
			auto_generate: true,
			cache_ttl: DEFAULT_CACHE_TTL,
		}
	}
}

impl From<&keyward_config::SigningConfig> for SignerConfig {
	fn from(config: &keyward_config::SigningConfig) -> Self {
		Self {
			key_path: config.key_path.clone(),
			identity: config.identity.clone(),
			auto_generate: config.auto_generate,
			cache_ttl: config.cache_ttl(),
		}
	}
}

/// Describes the current signing key without exposing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
	pub algorithm: String,
	pub identity: String,
	pub created_at: DateTime<Utc>,
	/// Store version of the key record, when the store reports one.
	pub version: Option<u64>,
	/// Lowercase hex SHA-256 of the SPKI DER public key.
	pub fingerprint: String,
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredSigningKey {
	algorithm: String,
	private_key: String,
	public_key: String,
	identity: String,
	#[zeroize(skip)]
	created_at: DateTime<Utc>,
}

struct CachedKey {
	signing_key: SigningKey,
	public_key_der: Vec<u8>,
	info: KeyInfo,
	loaded_at: Instant,
}

/// Signs audit payloads with a store-held P-256 key.
///
/// The loaded key is cached behind an async mutex; every operation takes the
/// lock, so a rotation never interleaves with a signature.
pub struct AuditSigner {
	store: Arc<dyn SecretStore>,
	config: SignerConfig,
	cache: Mutex<Option<CachedKey>>,
}

impl AuditSigner {
	/// Load the key at `config.key_path`, generating one if it is missing and
	/// `auto_generate` is set.
	#[instrument(skip(store, config), fields(key_path = %config.key_path))]
	pub async fn new(store: Arc<dyn SecretStore>, config: SignerConfig) -> Result<Self> {
		let key_path = config.key_path.trim_matches('/').to_string();
		if key_path.is_empty() {
			return Err(SignerError::Config("signing key path must not be empty".to_string()));
		}
		if config.identity.trim().is_empty() {
			return Err(SignerError::Config("signer identity must not be empty".to_string()));
		}

		let signer = Self {
			store,
			config: SignerConfig { key_path, ..config },
			cache: Mutex::new(None),
		};

		match signer.load().await {
			Ok(key) => {
				debug!(version = ?key.info.version, "existing signing key loaded");
				*signer.cache.lock().await = Some(key);
			}
			Err(SignerError::KeyNotFound { .. }) if signer.config.auto_generate => {
				signer.generate_key().await?;
			}
			Err(e) => return Err(e),
		}

		Ok(signer)
	}

	pub fn config(&self) -> &SignerConfig {
		&self.config
	}

	/// Create and store a fresh key pair, replacing the current one.
	#[instrument(skip(self), fields(key_path = %self.config.key_path))]
	pub async fn generate_key(&self) -> Result<KeyInfo> {
		let mut cache = self.cache.lock().await;

		let signing_key = SigningKey::random(&mut OsRng);
		let private_pem = signing_key
			.to_pkcs8_pem(LineEnding::LF)
			.map_err(|e| SignerError::Crypto(format!("encode private key: {e}")))?;
		let verifying_key = signing_key.verifying_key();
		let public_pem = verifying_key
			.to_public_key_pem(LineEnding::LF)
			.map_err(|e| SignerError::Crypto(format!("encode public key: {e}")))?;
		let public_key_der = public_key_der(verifying_key)?;

		let record = StoredSigningKey {
			algorithm: ALGORITHM.to_string(),
			private_key: private_pem.as_str().to_string(),
			public_key: public_pem,
			identity: self.config.identity.clone(),
			created_at: Utc::now(),
		};
		let data = match serde_json::to_value(&record)? {
			serde_json::Value::Object(map) => map,
			_ => return Err(SignerError::Crypto("key record did not serialize to an object".to_string())),
		};
		let version = self.store.put(&self.config.key_path, data).await?;

		let info = KeyInfo {
			algorithm: ALGORITHM.to_string(),
			identity: record.identity.clone(),
			created_at: record.created_at,
			version: Some(version),
			fingerprint: fingerprint(&public_key_der),
		};
		*cache = Some(CachedKey {
			signing_key,
			public_key_der,
			info: info.clone(),
			loaded_at: Instant::now(),
		});

		info!(version, fingerprint = %info.fingerprint, "audit signing key generated");
		Ok(info)
	}

	/// Sign `data`. Returns the 64-byte `r || s` signature and the SPKI DER
	/// public key that verifies it.
	#[instrument(skip(self, data), fields(len = data.len()))]
	pub async fn sign(&self, data: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
		self.with_key(|key| {
			let signature: Signature = key.signing_key.sign(data);
			(signature.to_bytes().to_vec(), key.public_key_der.clone())
		})
		.await
	}

	/// Current SPKI DER public key.
	pub async fn get_public_key(&self) -> Result<Vec<u8>> {
		self.with_key(|key| key.public_key_der.clone()).await
	}

	pub async fn get_key_info(&self) -> Result<KeyInfo> {
		self.with_key(|key| key.info.clone()).await
	}

	/// Replace the key pair. Signatures made earlier verify only against the
	/// old public key.
	#[instrument(skip(self), fields(key_path = %self.config.key_path))]
	pub async fn rotate_key(&self) -> Result<KeyInfo> {
		self.clear_cache().await;
		let info = self.generate_key().await?;
		info!(version = ?info.version, "audit signing key rotated");
		Ok(info)
	}

	/// Drop the cached key so the next operation re-reads the store.
	pub async fn clear_cache(&self) {
		*self.cache.lock().await = None;
	}

	async fn with_key<R>(&self, f: impl FnOnce(&CachedKey) -> R) -> Result<R> {
		let mut cache = self.cache.lock().await;
		if let Some(cached) = cache
			.as_ref()
			.filter(|cached| cached.loaded_at.elapsed() < self.config.cache_ttl)
		{
			return Ok(f(cached));
		}

		let loaded = self.load().await?;
		let result = f(&loaded);
		*cache = Some(loaded);
		Ok(result)
	}

	async fn load(&self) -> Result<CachedKey> {
		let path = &self.config.key_path;
		let secret = self.store.get(path).await.map_err(|e| {
			if e.is_not_found() {
				SignerError::KeyNotFound { path: path.clone() }
			} else {
				SignerError::Store(e)
			}
		})?;
		let version = secret.version();
		let record: StoredSigningKey = serde_json::from_value(serde_json::Value::Object(secret.data))?;

		if record.algorithm != ALGORITHM {
			return Err(SignerError::InvalidKey(format!(
				"unsupported algorithm '{}'",
				record.algorithm
			)));
		}

		let signing_key = SigningKey::from_pkcs8_pem(&record.private_key)
			.map_err(|e| SignerError::InvalidKey(format!("private key: {e}")))?;
		let stored_public = VerifyingKey::from_public_key_pem(&record.public_key)
			.map_err(|e| SignerError::InvalidKey(format!("public key: {e}")))?;
		if &stored_public != signing_key.verifying_key() {
			return Err(SignerError::InvalidKey(
				"stored public key does not match private key".to_string(),
			));
		}

		let public_key_der = public_key_der(&stored_public)?;
		let info = KeyInfo {
			algorithm: record.algorithm.clone(),
			identity: record.identity.clone(),
			created_at: record.created_at,
			version,
			fingerprint: fingerprint(&public_key_der),
		};

		Ok(CachedKey {
			signing_key,
			public_key_der,
			info,
			loaded_at: Instant::now(),
		})
	}
}

impl std::fmt::Debug for AuditSigner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AuditSigner")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

/// Check `signature` over `data` against an SPKI DER `public_key`.
///
/// A signature that is not exactly [`SIGNATURE_LEN`] bytes, or a public key that
/// does not parse, is an error. Any other mismatch is `Ok(false)`.
pub fn verify_signature(data: &[u8], signature: &[u8], public_key: &[u8]) -> Result<bool> {
	if signature.len() != SIGNATURE_LEN {
		return Err(SignerError::InvalidSignatureLength {
			expected: SIGNATURE_LEN,
			actual: signature.len(),
		});
	}

	let verifying_key = VerifyingKey::from_public_key_der(public_key)
		.map_err(|e| SignerError::InvalidKey(format!("public key: {e}")))?;
	let Ok(signature) = Signature::from_slice(signature) else {
		return Ok(false);
	};
	Ok(verifying_key.verify(data, &signature).is_ok())
}

fn public_key_der(key: &VerifyingKey) -> Result<Vec<u8>> {
	key.to_public_key_der()
		.map(|document| document.as_bytes().to_vec())
		.map_err(|e| SignerError::Crypto(format!("encode public key: {e}")))
}

fn fingerprint(public_key_der: &[u8]) -> String {
	hex::encode(Sha256::digest(public_key_der))
}
