// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic rotation and cleanup of API keys.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ApiKeyError, Result};
use crate::manager::ApiKeyManager;
use crate::types::{ApiKey, ApiKeyStatus, CheckSummary, KeyRotationInfo, RotationStatus};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Scheduler timing and scope.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
	pub enabled: bool,
	pub interval: Duration,
	/// How long a replaced secret keeps working after a scheduled rotation.
	pub grace_period: Duration,
	/// Keys are due once they are this close to expiry.
	pub rotation_window: Duration,
	/// Minimum age past revocation or expiry before a key is deleted.
	pub cleanup_threshold: Duration,
	/// Organizations to cover. Empty means every organization in the store.
	pub organizations: Vec<String>,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			interval: Duration::from_secs(60 * 60),
			grace_period: Duration::from_secs(24 * 60 * 60),
			rotation_window: Duration::from_secs(7 * 24 * 60 * 60),
			cleanup_threshold: Duration::from_secs(30 * 24 * 60 * 60),
			organizations: Vec::new(),
		}
	}
}

impl From<&keyward_config::RotationConfig> for SchedulerConfig {
	fn from(config: &keyward_config::RotationConfig) -> Self {
		Self {
			enabled: config.enabled,
			interval: config.interval(),
			grace_period: config.grace_period(),
			rotation_window: config.window(),
			cleanup_threshold: config.cleanup_threshold(),
			organizations: config.organizations.clone(),
		}
	}
}

struct RunningTask {
	stop: CancellationToken,
	handle: JoinHandle<()>,
}

#[derive(Default)]
struct SchedulerState {
	running: AtomicBool,
	task: Mutex<Option<RunningTask>>,
}

#[derive(Debug, Default, Clone, Copy)]
struct RotationOutcome {
	rotated: usize,
	failed: usize,
}

/// Runs rotation and cleanup cycles on an interval.
///
/// Stopped until [`start`](Self::start); back to stopped after [`stop`](Self::stop)
/// or when the caller's cancellation token fires. Clones share one loop.
#[derive(Clone)]
pub struct RotationScheduler {
	manager: ApiKeyManager,
	config: Arc<SchedulerConfig>,
	state: Arc<SchedulerState>,
}

impl RotationScheduler {
	pub fn new(manager: ApiKeyManager, config: SchedulerConfig) -> Self {
		Self {
			manager,
			config: Arc::new(config),
			state: Arc::new(SchedulerState::default()),
		}
	}

	pub fn manager(&self) -> &ApiKeyManager {
		&self.manager
	}

	pub fn config(&self) -> &SchedulerConfig {
		&self.config
	}

	pub fn is_running(&self) -> bool {
		self.state.running.load(Ordering::SeqCst)
	}

	/// Spawn the scheduling loop. The first check runs immediately.
	///
	/// A disabled scheduler logs and returns without spawning anything.
	#[instrument(skip(self, cancel))]
	pub async fn start(&self, cancel: CancellationToken) -> Result<()> {
		if !self.config.enabled {
			info!("rotation scheduler disabled, not starting");
			return Ok(());
		}

		let mut task = self.state.task.lock().await;
		if self.state.running.swap(true, Ordering::SeqCst) {
			return Err(ApiKeyError::AlreadyRunning);
		}

		let stop = CancellationToken::new();
		let scheduler = self.clone();
		let loop_stop = stop.clone();
		let handle = tokio::spawn(async move {
			scheduler.run_loop(cancel, loop_stop).await;
		});

		*task = Some(RunningTask { stop, handle });
		info!(
			interval_secs = self.config.interval.as_secs(),
			organizations = self.config.organizations.len(),
			"rotation scheduler started"
		);
		Ok(())
	}

	/// Stop the loop and wait for it to exit. Safe to call repeatedly.
	#[instrument(skip(self))]
	pub async fn stop(&self) {
		let mut task = self.state.task.lock().await;
		if let Some(RunningTask { stop, handle }) = task.take() {
			stop.cancel();
			if let Err(e) = handle.await {
				error!(error = %e, "rotation scheduler task panicked");
			}
		}
		self.state.running.store(false, Ordering::SeqCst);
	}

	async fn run_loop(&self, cancel: CancellationToken, stop: CancellationToken) {
		loop {
			if cancel.is_cancelled() || stop.is_cancelled() {
				break;
			}

			match self.run_check().await {
				Ok(summary) => debug!(?summary, "rotation check finished"),
				Err(e) => error!(error = %e, "rotation check failed"),
			}

			tokio::select! {
				_ = cancel.cancelled() => break,
				_ = stop.cancelled() => break,
				_ = tokio::time::sleep(self.config.interval) => {}
			}
		}

		self.state.running.store(false, Ordering::SeqCst);
		info!("rotation scheduler stopped");
	}

	/// Run one rotation and cleanup cycle across the covered organizations.
	///
	/// Per-organization failures are counted and logged; only failing to
	/// discover organizations is an error.
	#[instrument(skip(self))]
	pub async fn run_check(&self) -> Result<CheckSummary> {
		let organizations = if self.config.organizations.is_empty() {
			self.manager.list_organizations().await?
		} else {
			self.config.organizations.clone()
		};

		let mut summary = CheckSummary::default();
		for organization_id in &organizations {
			summary.organizations += 1;

			match self.rotate_keys(organization_id, false).await {
				Ok(outcome) => {
					summary.rotated += outcome.rotated;
					summary.failures += outcome.failed;
				}
				Err(e) => {
					warn!(organization_id = %organization_id, error = %e, "rotation pass failed");
					summary.failures += 1;
				}
			}

			match self
				.cleanup_expired_keys(organization_id, self.config.cleanup_threshold)
				.await
			{
				Ok(deleted) => summary.deleted += deleted,
				Err(e) => {
					warn!(organization_id = %organization_id, error = %e, "cleanup pass failed");
					summary.failures += 1;
				}
			}
		}

		info!(
			organizations = summary.organizations,
			rotated = summary.rotated,
			deleted = summary.deleted,
			failures = summary.failures,
			"rotation check completed"
		);
		Ok(summary)
	}

	/// True when `key` has an expiry and `now` is strictly past the start of
	/// its rotation window.
	pub fn needs_rotation(&self, key: &ApiKey, now: DateTime<Utc>) -> bool {
		key.expires_at
			.is_some_and(|expires_at| rotation_due(expires_at, self.config.rotation_window, now))
	}

	/// Rotate the organization's Active keys that are due. Returns the number rotated.
	#[instrument(skip(self))]
	pub async fn rotate_all_keys(&self, organization_id: &str) -> Result<usize> {
		Ok(self.rotate_keys(organization_id, false).await?.rotated)
	}

	/// Rotate every Active key of the organization regardless of expiry.
	#[instrument(skip(self))]
	pub async fn force_rotate_all_keys(&self, organization_id: &str) -> Result<usize> {
		Ok(self.rotate_keys(organization_id, true).await?.rotated)
	}

	async fn rotate_keys(&self, organization_id: &str, force: bool) -> Result<RotationOutcome> {
		let now = Utc::now();
		let mut outcome = RotationOutcome::default();

		for key in self.manager.list_keys(organization_id).await? {
			if key.status != ApiKeyStatus::Active {
				continue;
			}
			if !force && !self.needs_rotation(&key, now) {
				continue;
			}

			match self
				.manager
				.rotate_key(organization_id, &key.id, self.config.grace_period)
				.await
			{
				Ok(_) => {
					info!(key_id = %key.id, forced = force, "api key rotated by scheduler");
					outcome.rotated += 1;
				}
				Err(e) => {
					warn!(key_id = %key.id, error = %e, "failed to rotate api key");
					outcome.failed += 1;
				}
			}
		}

		Ok(outcome)
	}

	/// Key counts by effective status, plus days until each live key's
	/// rotation window opens.
	#[instrument(skip(self))]
	pub async fn get_rotation_status(&self, organization_id: &str) -> Result<RotationStatus> {
		let now = Utc::now();
		let window = chrono::Duration::from_std(self.config.rotation_window).ok();
		let mut status = RotationStatus {
			organization_id: organization_id.to_string(),
			..Default::default()
		};

		for key in self.manager.list_keys(organization_id).await? {
			status.total += 1;
			match key.effective_status(now) {
				ApiKeyStatus::Active => status.active += 1,
				ApiKeyStatus::Rotated => status.rotated += 1,
				ApiKeyStatus::Revoked => status.revoked += 1,
				ApiKeyStatus::Expired => status.expired += 1,
			}

			if key.effective_status(now) != ApiKeyStatus::Active {
				continue;
			}
			let Some(expires_at) = key.expires_at else {
				continue;
			};
			let days_until_rotation = window
				.and_then(|window| expires_at.checked_sub_signed(window))
				.map(|opens| (opens - now).num_seconds() / SECONDS_PER_DAY)
				.unwrap_or(0);

			status.keys.push(KeyRotationInfo {
				id: key.id,
				name: key.name,
				expires_at,
				days_until_rotation,
			});
		}

		Ok(status)
	}

	/// Delete Revoked and Expired keys that went stale more than `threshold` ago.
	///
	/// Keys that are still live are never touched. Returns the number deleted.
	#[instrument(skip(self))]
	pub async fn cleanup_expired_keys(&self, organization_id: &str, threshold: Duration) -> Result<usize> {
		let now = Utc::now();
		let cutoff = chrono::Duration::from_std(threshold)
			.ok()
			.and_then(|threshold| now.checked_sub_signed(threshold))
			.ok_or_else(|| {
				ApiKeyError::InvalidArgument(format!("cleanup threshold {threshold:?} is out of range"))
			})?;

		let mut deleted = 0;
		for key in self.manager.list_keys(organization_id).await? {
			let stale = match key.effective_status(now) {
				ApiKeyStatus::Revoked => key.revoked_at.is_some_and(|at| at < cutoff),
				ApiKeyStatus::Expired => key.expires_at.is_some_and(|at| at < cutoff),
				ApiKeyStatus::Active | ApiKeyStatus::Rotated => false,
			};
			if !stale {
				continue;
			}

			match self.manager.delete_key(organization_id, &key.id).await {
				Ok(()) => deleted += 1,
				Err(e) => warn!(key_id = %key.id, error = %e, "failed to delete stale api key"),
			}
		}

		if deleted > 0 {
			info!(organization_id = %organization_id, deleted, "stale api keys deleted");
		}
		Ok(deleted)
	}
}

impl std::fmt::Debug for RotationScheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RotationScheduler")
			.field("config", &self.config)
			.field("running", &self.is_running())
			.finish_non_exhaustive()
	}
}

/// `now > expires_at - window`. A window reaching past the start of time is always due.
fn rotation_due(expires_at: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
	match chrono::Duration::from_std(window)
		.ok()
		.and_then(|window| expires_at.checked_sub_signed(window))
	{
		Some(opens) => now > opens,
		None => true,
	}
}
