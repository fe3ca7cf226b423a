// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key lifecycle on top of a [`keyward_vault::SecretStore`].
//!
//! [`ApiKeyManager`] issues, looks up, rotates, revokes and deletes keys.
//! [`RotationScheduler`] periodically rotates keys nearing expiry and removes
//! keys that have been revoked or expired for longer than a threshold.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use keyward_apikeys::{ApiKeyManager, ManagerConfig, RotationScheduler, SchedulerConfig};
//! use keyward_vault::MemorySecretStore;
//! use tokio_util::sync::CancellationToken;
//!
//! let manager = ApiKeyManager::new(Arc::new(MemorySecretStore::new()), ManagerConfig::default())?;
//! let key = manager.create_key("org-1", "user-1", "ci", ["read"]).await?;
//! let secret = key.secret.unwrap();
//! let authed = manager.authenticate("org-1", secret.expose()).await?;
//!
//! let scheduler = RotationScheduler::new(manager.clone(), SchedulerConfig::default());
//! scheduler.start(CancellationToken::new()).await?;
//! scheduler.stop().await;
//! ```

mod error;
mod manager;
mod scheduler;
mod types;

pub use error::{ApiKeyError, Result};
pub use manager::{ApiKeyManager, ManagerConfig, DEFAULT_PATH_PREFIX, DEFAULT_PREFIX, DEFAULT_TTL};
pub use scheduler::{RotationScheduler, SchedulerConfig};
pub use types::{ApiKey, ApiKeyStatus, CheckSummary, KeyRotationInfo, RotationStatus};
