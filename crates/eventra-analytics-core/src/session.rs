// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Anonymous session identifiers.
//!
//! An identifier is a random base36 part followed by the creation time in
//! base36. It is generated once per client storage lifetime and never
//! rotated.

/// Storage key under which the identifier is persisted.
pub const SESSION_STORAGE_KEY: &str = "eventra_session_id";

/// Returned when client storage cannot be read at all.
pub const FALLBACK_SESSION_ID: &str = "anon";

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates a new identifier for the given creation time.
pub fn generate_session_id(now_millis: i64) -> String {
	let random = to_base36(fastrand::u64(..));
	let time = to_base36(now_millis.max(0) as u64);
	format!("{random}{time}")
}

/// Lowercase base36 rendering of `value`.
pub fn to_base36(mut value: u64) -> String {
	if value == 0 {
		return "0".to_string();
	}

	let mut digits = Vec::with_capacity(13);
	while value > 0 {
		digits.push(BASE36_DIGITS[(value % 36) as usize]);
		value /= 36;
	}
	digits.reverse();
	String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn base36_known_values() {
		assert_eq!(to_base36(0), "0");
		assert_eq!(to_base36(35), "z");
		assert_eq!(to_base36(36), "10");
		assert_eq!(to_base36(1_718_000_000_000), "lx8kuby8");
	}

	#[test]
	fn generated_ids_end_with_time_part() {
		let id = generate_session_id(1_718_000_000_000);
		assert!(id.ends_with("lx8kuby8"));
		assert!(id.len() > "lx8kuby8".len());
	}

	#[test]
	fn generated_ids_differ() {
		let a = generate_session_id(1);
		let b = generate_session_id(1);
		assert_ne!(a, b);
	}

	proptest! {
		#[test]
		fn base36_roundtrips(value in any::<u64>()) {
			let encoded = to_base36(value);
			prop_assert!(encoded.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
			prop_assert_eq!(u64::from_str_radix(&encoded, 36).unwrap(), value);
		}
	}
}
