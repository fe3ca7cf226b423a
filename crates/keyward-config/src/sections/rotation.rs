// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background rotation and cleanup section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DAY_SECS: u64 = 24 * 60 * 60;

pub const DEFAULT_INTERVAL_SECS: u64 = 60 * 60;
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = DAY_SECS;
pub const DEFAULT_WINDOW_SECS: u64 = 7 * DAY_SECS;
pub const DEFAULT_CLEANUP_THRESHOLD_SECS: u64 = 30 * DAY_SECS;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RotationConfigLayer {
	pub enabled: Option<bool>,
	pub interval_secs: Option<u64>,
	pub grace_period_secs: Option<u64>,
	pub window_secs: Option<u64>,
	pub cleanup_threshold_secs: Option<u64>,
	pub organizations: Option<Vec<String>>,
}

impl RotationConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.interval_secs.is_some() {
			self.interval_secs = other.interval_secs;
		}
		if other.grace_period_secs.is_some() {
			self.grace_period_secs = other.grace_period_secs;
		}
		if other.window_secs.is_some() {
			self.window_secs = other.window_secs;
		}
		if other.cleanup_threshold_secs.is_some() {
			self.cleanup_threshold_secs = other.cleanup_threshold_secs;
		}
		if other.organizations.is_some() {
			self.organizations = other.organizations;
		}
	}

	pub fn finalize(self) -> RotationConfig {
		RotationConfig {
			enabled: self.enabled.unwrap_or(true),
			interval_secs: self.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS),
			grace_period_secs: self.grace_period_secs.unwrap_or(DEFAULT_GRACE_PERIOD_SECS),
			window_secs: self.window_secs.unwrap_or(DEFAULT_WINDOW_SECS),
			cleanup_threshold_secs: self
				.cleanup_threshold_secs
				.unwrap_or(DEFAULT_CLEANUP_THRESHOLD_SECS),
			organizations: self.organizations.unwrap_or_default(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RotationConfig {
	pub enabled: bool,
	pub interval_secs: u64,
	pub grace_period_secs: u64,
	pub window_secs: u64,
	pub cleanup_threshold_secs: u64,
	/// Empty means "every organization found under the key path prefix".
	pub organizations: Vec<String>,
}

impl RotationConfig {
	pub fn interval(&self) -> Duration {
		Duration::from_secs(self.interval_secs)
	}

	pub fn grace_period(&self) -> Duration {
		Duration::from_secs(self.grace_period_secs)
	}

	pub fn window(&self) -> Duration {
		Duration::from_secs(self.window_secs)
	}

	pub fn cleanup_threshold(&self) -> Duration {
		Duration::from_secs(self.cleanup_threshold_secs)
	}
}

impl Default for RotationConfig {
	fn default() -> Self {
		RotationConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = RotationConfig::default();
		assert!(config.enabled);
		assert_eq!(config.interval(), Duration::from_secs(3600));
		assert_eq!(config.grace_period(), Duration::from_secs(86400));
		assert_eq!(config.window(), Duration::from_secs(7 * 86400));
		assert_eq!(config.cleanup_threshold(), Duration::from_secs(30 * 86400));
		assert!(config.organizations.is_empty());
	}

	#[test]
	fn deserialize_organizations() {
		let layer: RotationConfigLayer = toml::from_str(
			r#"
interval_secs = 600
organizations = ["org-1", "org-2"]
"#,
		)
		.unwrap();
		let config = layer.finalize();
		assert_eq!(config.interval_secs, 600);
		assert_eq!(config.organizations, vec!["org-1", "org-2"]);
	}
}
