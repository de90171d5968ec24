/// Password hashing and verification over bcrypt.
use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::AppError;

/// Hashes a plaintext password. Called exactly where the password field is
/// set or changed, never on unrelated updates.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

/// Verifies a plaintext password against a stored digest. Never reconstructs
/// the plaintext.
pub fn verify_password(password: &str, digest: &str) -> Result<bool, AppError> {
    verify(password, digest)
        .map_err(|e| AppError::Internal(format!("password verification failed: {}", e)))
}
