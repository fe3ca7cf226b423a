// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	ApiKeysConfigLayer, RotationConfigLayer, SigningConfigLayer, VaultConfigLayer,
};

/// Engine configuration layer. Every section is optional so sources can be partial.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeywardConfigLayer {
	#[serde(default)]
	pub vault: Option<VaultConfigLayer>,
	#[serde(default)]
	pub apikeys: Option<ApiKeysConfigLayer>,
	#[serde(default)]
	pub rotation: Option<RotationConfigLayer>,
	#[serde(default)]
	pub signer: Option<SigningConfigLayer>,
}

impl KeywardConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: KeywardConfigLayer) {
		merge_option(&mut self.vault, other.vault, VaultConfigLayer::merge);
		merge_option(&mut self.apikeys, other.apikeys, ApiKeysConfigLayer::merge);
		merge_option(&mut self.rotation, other.rotation, RotationConfigLayer::merge);
		merge_option(&mut self.signer, other.signer, SigningConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}
