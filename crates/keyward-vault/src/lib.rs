// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Vault transport and versioned KV secrets engine.
//!
//! [`VaultClient`] owns the authenticated HTTP(S) transport: token and namespace
//! headers, custom CAs, mutual TLS, SNI override, and a background task that
//! renews the token at 80% of its TTL. [`KvStore`] speaks the KV v2 protocol over
//! it and implements [`SecretStore`], the seam everything above this crate is
//! written against. [`MemorySecretStore`] implements the same trait in memory.
//!
//! # Example
//!
//! ```ignore
//! use keyward_vault::{KvStore, SecretData, SecretStore, VaultClient};
//! use serde_json::json;
//!
//! let client = VaultClient::builder()
//!     .address("https://vault.internal:8200")
//!     .token("hvs.CAESIJ...")
//!     .build()?;
//! let store = KvStore::new(client.clone());
//!
//! let mut data = SecretData::new();
//! data.insert("password".into(), json!("hunter2"));
//! let version = store.put("apps/db", data).await?;
//!
//! client.close().await;
//! ```

mod client;
mod config;
mod error;
pub mod kv;
mod tls;

pub use client::{HealthStatus, VaultClient, VaultClientBuilder};
pub use config::{ClientConfig, TlsConfig, DEFAULT_MOUNT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TOKEN_TTL};
pub use error::{Result, VaultError};
pub use kv::{
	CustomMetadata, KvStore, MemorySecretStore, SecretData, SecretMetadata, SecretStore, VersionInfo,
	VersionMetadata, VersionedSecret,
};
pub use reqwest::Method;
