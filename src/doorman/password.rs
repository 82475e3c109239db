//! One-way password hashing and verification.
//!
//! bcrypt with work factor 10. A mismatch during verification is a normal
//! `Ok(false)`; only a failing primitive (for example a malformed stored
//! hash) is an error.

use thiserror::Error;

const COST: u32 = 10;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct PasswordError(#[from] bcrypt::BcryptError);

/// Hash a plaintext password.
///
/// # Errors
/// Returns `PasswordError` if the bcrypt primitive fails. This signals an
/// internal fault, not bad user input.
pub fn hash(plain: &str) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(plain, COST)?)
}

/// Verify a plaintext password against a stored hash.
///
/// # Errors
/// Returns `PasswordError` only when the primitive itself fails; a wrong
/// password is `Ok(false)`.
pub fn verify(plain: &str, hashed: &str) -> Result<bool, PasswordError> {
    Ok(bcrypt::verify(plain, hashed)?)
}
