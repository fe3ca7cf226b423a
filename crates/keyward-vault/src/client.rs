// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transport client for a Vault-compatible secret store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keyward_common_secret::SecretString;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{ClientConfig, TlsConfig};
use crate::error::{Result, VaultError};
use crate::tls;

const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Never renew more often than this, whatever the TTL.
const MIN_RENEWAL_PERIOD: Duration = Duration::from_secs(1);

/// Builder for constructing a [`VaultClient`].
pub struct VaultClientBuilder {
	config: ClientConfig,
}

impl VaultClientBuilder {
	pub fn new() -> Self {
		Self {
			config: ClientConfig::default(),
		}
	}

	/// Base address, e.g. `https://vault.internal:8200`.
	pub fn address(mut self, address: impl Into<String>) -> Self {
		self.config.address = address.into();
		self
	}

	pub fn token(mut self, token: impl Into<SecretString>) -> Self {
		self.config.token = Some(token.into());
		self
	}

	/// KV v2 mount path. Defaults to `secret`.
	pub fn mount(mut self, mount: impl Into<String>) -> Self {
		self.config.mount = mount.into();
		self
	}

	pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
		self.config.namespace = Some(namespace.into());
		self
	}

	pub fn tls(mut self, tls: TlsConfig) -> Self {
		self.config.tls = tls;
		self
	}

	pub fn token_ttl(mut self, ttl: Duration) -> Self {
		self.config.token_ttl = ttl;
		self
	}

	/// Disable the background `renew-self` loop.
	pub fn renew_token(mut self, enabled: bool) -> Self {
		self.config.renew_token = enabled;
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	pub fn build(self) -> Result<VaultClient> {
		VaultClient::new(self.config)
	}
}

impl Default for VaultClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Cheap-to-clone request half of the client, shared with the renewal task.
#[derive(Clone)]
struct Transport {
	http: Client,
	base_url: String,
	namespace: Option<String>,
	token: Arc<RwLock<SecretString>>,
}

impl Transport {
	async fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
		let url = format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'));
		let token = self.token.read().await;
		let mut builder = self
			.http
			.request(method, url)
			.header(TOKEN_HEADER, token.expose().as_str());
		if let Some(namespace) = &self.namespace {
			builder = builder.header(NAMESPACE_HEADER, namespace);
		}
		builder
	}

	async fn send(
		&self,
		operation: &'static str,
		method: Method,
		path: &str,
		body: Option<&Value>,
	) -> Result<Option<Value>> {
		let mut request = self.request(method, path).await;
		if let Some(body) = body {
			request = request.json(body);
		}

		let response = request.send().await.map_err(|source| VaultError::Request {
			operation,
			path: path.to_string(),
			source,
		})?;

		let status = response.status();
		if status == StatusCode::NOT_FOUND {
			return Err(VaultError::not_found(path));
		}

		let text = response.text().await.map_err(|source| VaultError::Request {
			operation,
			path: path.to_string(),
			source,
		})?;

		if !status.is_success() {
			return Err(VaultError::Status {
				operation,
				path: path.to_string(),
				status: status.as_u16(),
				message: error_message(&text),
			});
		}

		if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
			return Ok(None);
		}

		serde_json::from_str(&text)
			.map(Some)
			.map_err(|e| VaultError::Decode {
				operation,
				path: path.to_string(),
				message: e.to_string(),
			})
	}

	async fn renew_self(&self, ttl: Duration) -> Result<()> {
		let body = json!({ "increment": format!("{}s", ttl.as_secs()) });
		let response = self
			.send("renew", Method::POST, "auth/token/renew-self", Some(&body))
			.await?;

		let renewed = response
			.map(serde_json::from_value::<RenewResponse>)
			.transpose()?
			.and_then(|r| r.auth)
			.map(|auth| auth.client_token)
			.filter(|t| !t.is_empty());

		if let Some(new_token) = renewed {
			let mut token = self.token.write().await;
			if token.expose() != &new_token {
				*token = SecretString::new(new_token);
				debug!("renewal returned a new token; replaced in memory");
			}
		}
		Ok(())
	}
}

#[derive(Deserialize)]
struct RenewResponse {
	auth: Option<RenewAuth>,
}

#[derive(Deserialize)]
struct RenewAuth {
	#[serde(default)]
	client_token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
	#[serde(default)]
	errors: Vec<String>,
}

/// Pull the `errors` array out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
	match serde_json::from_str::<ErrorBody>(body) {
		Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
		_ => body.trim().to_string(),
	}
}

/// Health endpoint payload. Fields absent from the response default to zero values.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
	#[serde(default)]
	pub initialized: bool,
	#[serde(default)]
	pub sealed: bool,
	#[serde(default)]
	pub standby: bool,
	#[serde(default)]
	pub version: String,
	#[serde(skip)]
	pub status_code: u16,
}

struct ClientInner {
	transport: Transport,
	address: String,
	mount: String,
	token_ttl: Duration,
	closed: AtomicBool,
	shutdown: CancellationToken,
	renewal: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ClientInner {
	fn drop(&mut self) {
		self.shutdown.cancel();
	}
}

/// Client for a Vault-compatible store.
///
/// Owns the HTTP transport and the background token renewal task. Clones share
/// both; call [`VaultClient::close`] once to stop renewal and reject further calls.
///
/// # Example
///
/// ```ignore
/// use keyward_vault::VaultClient;
///
/// let client = VaultClient::builder()
///     .address("https://vault.internal:8200")
///     .token("hvs.CAESIJ...")
///     .build()?;
///
/// client.health().await?;
/// client.close().await;
/// ```
#[derive(Clone)]
pub struct VaultClient {
	inner: Arc<ClientInner>,
}

impl VaultClient {
	pub fn builder() -> VaultClientBuilder {
		VaultClientBuilder::new()
	}

	/// Connect using `config`. Must be called inside a tokio runtime when
	/// renewal is enabled.
	pub fn new(config: ClientConfig) -> Result<Self> {
		let address = config.address.trim().trim_end_matches('/').to_string();
		if address.is_empty() {
			return Err(VaultError::MissingAddress);
		}

		let token = match config.token {
			Some(token) if !token.is_empty() => token,
			_ => keyward_config::load_secret_env("VAULT_TOKEN")
				.map_err(|e| VaultError::Config(e.to_string()))?
				.ok_or(VaultError::MissingToken)?,
		};

		let mount = config.mount.trim_matches('/').to_string();
		if mount.is_empty() {
			return Err(VaultError::Config("mount path must not be empty".to_string()));
		}
		if config.token_ttl.is_zero() {
			return Err(VaultError::Config("token TTL must be greater than zero".to_string()));
		}

		let mut builder = Client::builder()
			.user_agent(format!("keyward/{CLIENT_VERSION}"))
			.timeout(config.request_timeout);
		builder = tls::configure(builder, &config.tls)?;

		let base_url = match &config.tls.server_name {
			Some(server_name) => {
				let (base_url, addr) = tls::override_server_name(&address, server_name)?;
				builder = builder.resolve(server_name, addr);
				base_url
			}
			None => address.clone(),
		};

		let http = builder.build().map_err(VaultError::ClientBuild)?;

		let transport = Transport {
			http,
			base_url,
			namespace: config.namespace.filter(|ns| !ns.is_empty()),
			token: Arc::new(RwLock::new(token)),
		};

		let shutdown = CancellationToken::new();
		let renewal = if config.renew_token {
			let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
				VaultError::Config("token renewal requires a running tokio runtime".to_string())
			})?;
			Some(runtime.spawn(renewal_loop(
				transport.clone(),
				config.token_ttl,
				shutdown.clone(),
			)))
		} else {
			None
		};

		info!(
			address = %address,
			mount = %mount,
			namespace = transport.namespace.as_deref().unwrap_or(""),
			mutual_tls = config.tls.is_mutual(),
			renewal = config.renew_token,
			"Vault client initialized"
		);

		Ok(Self {
			inner: Arc::new(ClientInner {
				transport,
				address,
				mount,
				token_ttl: config.token_ttl,
				closed: AtomicBool::new(false),
				shutdown,
				renewal: Mutex::new(renewal),
			}),
		})
	}

	pub fn address(&self) -> &str {
		&self.inner.address
	}

	pub fn mount(&self) -> &str {
		&self.inner.mount
	}

	pub fn namespace(&self) -> Option<&str> {
		self.inner.transport.namespace.as_deref()
	}

	pub fn token_ttl(&self) -> Duration {
		self.inner.token_ttl
	}

	/// Current token. Changes only when renewal hands back a new one.
	pub async fn token(&self) -> SecretString {
		self.inner.transport.token.read().await.clone()
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	/// Issue a request against `/v1/{path}`.
	///
	/// 404 maps to [`VaultError::NotFound`]; other non-2xx statuses to
	/// [`VaultError::Status`]. Empty bodies return `Ok(None)`.
	pub async fn send(
		&self,
		operation: &'static str,
		method: Method,
		path: &str,
		body: Option<&Value>,
	) -> Result<Option<Value>> {
		if self.is_closed() {
			return Err(VaultError::Closed);
		}
		self.inner.transport.send(operation, method, path, body).await
	}

	/// Renew the token now, outside the background schedule.
	pub async fn renew_token(&self) -> Result<()> {
		if self.is_closed() {
			return Err(VaultError::Closed);
		}
		self.inner.transport.renew_self(self.inner.token_ttl).await
	}

	/// Query `GET /v1/sys/health`.
	///
	/// Any 5xx is [`VaultError::Unhealthy`]. Other codes, including 429 for a
	/// standby node, are returned as a [`HealthStatus`].
	#[instrument(skip(self))]
	pub async fn health(&self) -> Result<HealthStatus> {
		if self.is_closed() {
			return Err(VaultError::Closed);
		}

		let response = self
			.inner
			.transport
			.request(Method::GET, "sys/health")
			.await
			.send()
			.await
			.map_err(|source| VaultError::Request {
				operation: "health",
				path: "sys/health".to_string(),
				source,
			})?;

		let status = response.status();
		if status.is_server_error() {
			warn!(status = status.as_u16(), "vault health check failed");
			return Err(VaultError::Unhealthy {
				status: status.as_u16(),
			});
		}

		let text = response.text().await.unwrap_or_default();
		let mut health: HealthStatus = serde_json::from_str(&text).unwrap_or_default();
		health.status_code = status.as_u16();
		debug!(status = health.status_code, sealed = health.sealed, standby = health.standby, "vault health");
		Ok(health)
	}

	/// Stop the renewal loop and wait for it to exit. Idempotent.
	pub async fn close(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}

		self.inner.shutdown.cancel();
		let handle = self.inner.renewal.lock().await.take();
		if let Some(handle) = handle {
			if let Err(e) = handle.await {
				warn!(error = %e, "token renewal task ended abnormally");
			}
		}
		info!(address = %self.inner.address, "Vault client closed");
	}
}

impl std::fmt::Debug for VaultClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("VaultClient")
			.field("address", &self.inner.address)
			.field("mount", &self.inner.mount)
			.field("namespace", &self.inner.transport.namespace)
			.field("closed", &self.is_closed())
			.finish()
	}
}

pub(crate) fn renewal_period(ttl: Duration) -> Duration {
	(ttl * 4 / 5).max(MIN_RENEWAL_PERIOD)
}

async fn renewal_loop(transport: Transport, ttl: Duration, shutdown: CancellationToken) {
	let period = renewal_period(ttl);
	let mut ticker = interval_at(Instant::now() + period, period);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	debug!(period_secs = period.as_secs_f64(), "token renewal loop started");

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => {
				debug!("token renewal loop stopping");
				break;
			}
			_ = ticker.tick() => {
				match transport.renew_self(ttl).await {
					Ok(()) => debug!("vault token renewed"),
					Err(e) => warn!(error = %e, "vault token renewal failed; retrying next tick"),
				}
			}
		}
	}
}
