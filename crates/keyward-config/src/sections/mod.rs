// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod apikeys;
mod rotation;
mod signing;
mod vault;

pub use apikeys::{ApiKeysConfig, ApiKeysConfigLayer};
pub use rotation::{RotationConfig, RotationConfigLayer};
pub use signing::{SigningConfig, SigningConfigLayer};
pub use vault::{VaultConfig, VaultConfigLayer};
