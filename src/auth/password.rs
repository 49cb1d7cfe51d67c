/// Password hashing and credential checks
///
/// Hashes with bcrypt. The work factor comes from configuration so tests can
/// run at the bcrypt minimum.
use bcrypt::{hash, verify};

use crate::domain::User;
use crate::error::{AppError, AuthError};
use crate::store::UserRepository;
use crate::validators::is_valid_password;

/// Hash a password after checking its length bounds.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    is_valid_password(password)?;

    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

/// Looks up the account for `email` and checks `password` against it.
///
/// Unknown email and wrong password produce the same error so the response
/// does not reveal which accounts exist.
pub async fn verify_credentials(
    users: &dyn UserRepository,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let user = users
        .find_user_by_email(email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(password, &user.password_hash)? {
        return Err(AuthError::InvalidCredentials.into());
    }

    Ok(user)
}
