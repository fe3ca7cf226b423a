// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tamper-evident signatures for audit records.
//!
//! [`AuditSigner`] keeps one ECDSA P-256 key pair in a
//! [`keyward_vault::SecretStore`] and signs payloads with it. Verifiers only
//! need the payload, the signature and the public key, via [`verify_signature`].
//!
//! ```ignore
//! let signer = AuditSigner::new(store, SignerConfig::default()).await?;
//! let (signature, public_key) = signer.sign(record.as_bytes()).await?;
//! assert!(verify_signature(record.as_bytes(), &signature, &public_key)?);
//! ```

mod error;
mod signer;

pub use error::{Result, SignerError};
pub use signer::{
	verify_signature, AuditSigner, KeyInfo, SignerConfig, ALGORITHM, DEFAULT_CACHE_TTL, DEFAULT_IDENTITY,
	DEFAULT_KEY_PATH, SIGNATURE_LEN,
};
