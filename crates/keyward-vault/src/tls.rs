// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! rustls transport setup: custom CAs, client identity, SNI override.

use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

use reqwest::{Certificate, ClientBuilder, Identity, Url};
use tracing::{debug, warn};

use crate::config::TlsConfig;
use crate::error::{Result, VaultError};

/// Apply CA trust, client identity and verification settings to `builder`.
pub(crate) fn configure(mut builder: ClientBuilder, tls: &TlsConfig) -> Result<ClientBuilder> {
	builder = builder.use_rustls_tls();

	if let Some(ca_cert) = &tls.ca_cert {
		let cert = load_certificate(ca_cert)?;
		debug!(path = %ca_cert.display(), "trusting CA certificate");
		builder = builder.add_root_certificate(cert);
	}

	if let Some(ca_path) = &tls.ca_path {
		for path in ca_files(ca_path)? {
			let cert = load_certificate(&path)?;
			debug!(path = %path.display(), "trusting CA certificate from directory");
			builder = builder.add_root_certificate(cert);
		}
	}

	match (&tls.client_cert, &tls.client_key) {
		(Some(cert), Some(key)) => {
			builder = builder.identity(load_identity(cert, key)?);
			debug!(cert = %cert.display(), "client certificate configured");
		}
		(Some(_), None) => {
			return Err(VaultError::Config(
				"client certificate configured without a client key".to_string(),
			));
		}
		(None, Some(_)) => {
			return Err(VaultError::Config(
				"client key configured without a client certificate".to_string(),
			));
		}
		(None, None) => {}
	}

	if tls.insecure {
		warn!("TLS certificate verification is disabled; use only for testing");
		builder = builder.danger_accept_invalid_certs(true);
	}

	Ok(builder)
}

/// Rewrite `address` so requests use `server_name` for SNI and certificate
/// checks while still connecting to the original host.
///
/// Returns the rewritten base URL and the address the name must resolve to.
pub(crate) fn override_server_name(address: &str, server_name: &str) -> Result<(String, SocketAddr)> {
	let mut url = Url::parse(address)
		.map_err(|e| VaultError::Config(format!("invalid vault address '{address}': {e}")))?;

	let host = url
		.host_str()
		.ok_or_else(|| VaultError::Config(format!("vault address '{address}' has no host")))?
		.trim_start_matches('[')
		.trim_end_matches(']')
		.to_string();
	let port = url
		.port_or_known_default()
		.ok_or_else(|| VaultError::Config(format!("vault address '{address}' has no port")))?;

	let addr = (host.as_str(), port)
		.to_socket_addrs()
		.map_err(|e| VaultError::Config(format!("failed to resolve {host}:{port}: {e}")))?
		.next()
		.ok_or_else(|| VaultError::Config(format!("{host}:{port} resolved to no addresses")))?;

	url.set_host(Some(server_name))
		.map_err(|e| VaultError::Config(format!("invalid TLS server name '{server_name}': {e}")))?;

	Ok((url.as_str().trim_end_matches('/').to_string(), addr))
}

fn load_certificate(path: &Path) -> Result<Certificate> {
	let pem = fs::read(path).map_err(|source| VaultError::TlsRead {
		path: path.to_path_buf(),
		source,
	})?;
	Certificate::from_pem(&pem).map_err(|source| VaultError::TlsParse {
		path: path.to_path_buf(),
		source,
	})
}

fn load_identity(cert: &Path, key: &Path) -> Result<Identity> {
	let mut pem = fs::read(cert).map_err(|source| VaultError::TlsRead {
		path: cert.to_path_buf(),
		source,
	})?;
	let key_pem = fs::read(key).map_err(|source| VaultError::TlsRead {
		path: key.to_path_buf(),
		source,
	})?;
	if !pem.ends_with(b"\n") {
		pem.push(b'\n');
	}
	pem.extend_from_slice(&key_pem);

	Identity::from_pem(&pem).map_err(|source| VaultError::TlsParse {
		path: cert.to_path_buf(),
		source,
	})
}

fn ca_files(dir: &Path) -> Result<Vec<PathBuf>> {
	let entries = fs::read_dir(dir).map_err(|source| VaultError::TlsRead {
		path: dir.to_path_buf(),
		source,
	})?;

	let mut files = Vec::new();
	for entry in entries {
		let entry = entry.map_err(|source| VaultError::TlsRead {
			path: dir.to_path_buf(),
			source,
		})?;
		let path = entry.path();
		let is_cert = path
			.extension()
			.and_then(|ext| ext.to_str())
			.is_some_and(|ext| ext.eq_ignore_ascii_case("pem") || ext.eq_ignore_ascii_case("crt"));
		if is_cert && path.is_file() {
			files.push(path);
		}
	}
	files.sort();
	Ok(files)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_ca_file_is_read_error() {
		let tls = TlsConfig {
			ca_cert: Some(PathBuf::from("/nonexistent/keyward/ca.pem")),
			..Default::default()
		};
		let err = configure(reqwest::Client::builder(), &tls).unwrap_err();
		assert!(matches!(err, VaultError::TlsRead { .. }));
	}

	#[test]
	fn client_cert_without_key_is_config_error() {
		let tls = TlsConfig {
			client_cert: Some(PathBuf::from("/tls/client.pem")),
			..Default::default()
		};
		let err = configure(reqwest::Client::builder(), &tls).unwrap_err();
		assert!(matches!(err, VaultError::Config(_)));
	}

	#[test]
	fn client_key_without_cert_is_config_error() {
		let tls = TlsConfig {
			client_key: Some(PathBuf::from("/tls/client.key")),
			..Default::default()
		};
		let err = configure(reqwest::Client::builder(), &tls).unwrap_err();
		assert!(matches!(err, VaultError::Config(_)));
	}

	#[test]
	fn ca_dir_picks_only_certificate_files() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("b.crt"), "x").unwrap();
		fs::write(dir.path().join("a.pem"), "x").unwrap();
		fs::write(dir.path().join("notes.txt"), "x").unwrap();
		fs::create_dir(dir.path().join("nested.pem")).unwrap();

		let files = ca_files(dir.path()).unwrap();
		let names: Vec<_> = files
			.iter()
			.map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
			.collect();
		assert_eq!(names, vec!["a.pem", "b.crt"]);
	}

	#[test]
	fn missing_ca_dir_is_read_error() {
		let err = ca_files(Path::new("/nonexistent/keyward/ca.d")).unwrap_err();
		assert!(matches!(err, VaultError::TlsRead { .. }));
	}

	#[test]
	fn server_name_override_keeps_port_and_path() {
		let (url, addr) =
			override_server_name("https://127.0.0.1:8200", "vault.internal").unwrap();
		assert_eq!(url, "https://vault.internal:8200");
		assert_eq!(addr, "127.0.0.1:8200".parse::<SocketAddr>().unwrap());
	}

	#[test]
	fn server_name_override_uses_scheme_default_port() {
		let (url, addr) = override_server_name("https://127.0.0.1", "vault.internal").unwrap();
		assert_eq!(url, "https://vault.internal");
		assert_eq!(addr.port(), 443);
	}

	#[test]
	fn server_name_override_rejects_garbage_address() {
		let err = override_server_name("not a url", "vault.internal").unwrap_err();
		assert!(matches!(err, VaultError::Config(_)));
	}
}
