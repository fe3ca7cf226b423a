// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacting wrapper for credential material.
//!
//! Vault tokens, API key secrets and PEM-encoded private keys all pass through
//! [`Secret<T>`]. The wrapper:
//!
//! - prints `[REDACTED]` from `Debug` and `Display`, so `tracing` fields such as
//!   `info!(token = %token)` never leak the value
//! - serializes as `"[REDACTED]"`, so config dumps stay clean
//! - zeroizes its memory on drop
//! - compares in constant time when the inner value is byte-like
//! - requires an explicit `.expose()` to read the value
//!
//! ```
//! use keyward_common_secret::SecretString;
//!
//! let token = SecretString::new("hvs.CAESIJ".to_string());
//! assert_eq!(format!("{token}"), "[REDACTED]");
//! assert_eq!(token.expose(), "hvs.CAESIJ");
//! ```

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Placeholder emitted wherever a secret would otherwise be printed.
pub const REDACTED: &str = "[REDACTED]";

/// A sensitive value that refuses to be printed or serialized.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// The common case: a secret string such as a token or bearer key.
pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Read the wrapped value. Call sites are greppable on purpose.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	/// Clone the inner value out. The wrapper keeps (and later zeroizes) its own copy.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl Secret<String> {
	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

impl From<String> for Secret<String> {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for Secret<String> {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + AsRef<[u8]>,
{
	fn eq(&self, other: &Self) -> bool {
		constant_time_eq(self.inner.as_ref(), other.inner.as_ref())
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + AsRef<[u8]> {}

/// Compare two byte strings without short-circuiting on the first mismatch.
///
/// Lengths are not secret: inputs of different length return `false` immediately.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
	if a.len() != b.len() {
		return false;
	}
	a.ct_eq(b).into()
}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn debug_and_display_hide_the_token() {
		let token = SecretString::new("hvs.super-secret-token".to_string());

		let debug = format!("{token:?}");
		let display = format!("{token}");

		assert!(!debug.contains("hvs.super-secret-token"));
		assert_eq!(debug, "Secret(\"[REDACTED]\")");
		assert_eq!(display, REDACTED);
	}

	#[test]
	fn optional_secret_debug_is_redacted() {
		let key: Option<SecretString> = Some("sk_abc".into());
		let debug = format!("{key:?}");
		assert!(!debug.contains("sk_abc"));
		assert!(debug.contains(REDACTED));
	}

	#[test]
	fn expose_and_into_inner_return_value() {
		let key = SecretString::from("sk_live");
		assert_eq!(key.expose(), "sk_live");
		assert_eq!(key.into_inner(), "sk_live");
	}

	#[test]
	fn equality_is_by_value() {
		assert_eq!(SecretString::from("a"), SecretString::from("a"));
		assert_ne!(SecretString::from("a"), SecretString::from("b"));
		assert_ne!(SecretString::from("a"), SecretString::from("ab"));
	}

	#[test]
	fn empty_secret_reports_empty() {
		assert!(SecretString::from("").is_empty());
		assert!(!SecretString::from("x").is_empty());
	}

	#[test]
	fn constant_time_eq_handles_lengths() {
		assert!(constant_time_eq(b"", b""));
		assert!(constant_time_eq(b"sk_1", b"sk_1"));
		assert!(!constant_time_eq(b"sk_1", b"sk_2"));
		assert!(!constant_time_eq(b"sk_1", b"sk_10"));
	}

	#[cfg(feature = "serde")]
	#[test]
	fn serialize_is_redacted_and_deserialize_reads_value() {
		let key = SecretString::from("sk_private");
		let json = serde_json::to_string(&key).unwrap();
		assert_eq!(json, "\"[REDACTED]\"");

		let parsed: SecretString = serde_json::from_str("\"sk_private\"").unwrap();
		assert_eq!(parsed.expose(), "sk_private");
	}

	proptest! {
		#[test]
		fn formatted_output_never_contains_value(inner in "[a-zA-Z0-9_.-]{4,48}") {
			prop_assume!(!inner.contains("REDACTED"));
			prop_assume!(!inner.contains("Secret"));

			let secret = SecretString::new(inner.clone());
			let debug_out = format!("{secret:?}");
			let display_out = format!("{secret}");
			prop_assert!(!debug_out.contains(&inner));
			prop_assert!(!display_out.contains(&inner));
		}

		#[test]
		fn constant_time_eq_matches_slice_eq(a in proptest::collection::vec(any::<u8>(), 0..64), b in proptest::collection::vec(any::<u8>(), 0..64)) {
			prop_assert_eq!(constant_time_eq(&a, &b), a == b);
		}
	}
}
