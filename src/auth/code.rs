//! One-time code generation.

use rand::{Rng, rngs::OsRng};

/// System-wide one-time code length, in decimal digits.
pub const CODE_LENGTH: usize = 6;

/// Generate a fixed-length decimal one-time code from OS entropy.
///
/// Codes are single-use and short-lived; the small code space is acceptable
/// only under those constraints.
#[must_use]
pub fn generate() -> String {
    let mut rng = OsRng;
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Check that a submitted code has the expected length and charset.
/// Callers treat a malformed code exactly like a wrong code.
#[must_use]
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}
