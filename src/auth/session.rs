/// Session lifecycle
///
/// A session is exactly one access token and one refresh token per user.
/// Logging in replaces both rows in one transaction; logging out removes them.
use chrono::{DateTime, Utc};

use crate::auth::jwt::{hash_token, IssuedToken, TokenIssuer};
use crate::auth::{Identity, TokenType};
use crate::configuration::TokenLifetimes;
use crate::error::{AppError, AuthError, DatabaseError};
use crate::store::{NewToken, SessionRepository};

#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Signs the access/refresh pair for `identity` as of `now`.
pub fn mint_session(
    issuer: &TokenIssuer,
    identity: &Identity,
    lifetimes: TokenLifetimes,
    now: DateTime<Utc>,
) -> Result<SessionTokens, AppError> {
    Ok(SessionTokens {
        access: issuer.issue_at(identity, TokenType::Access, lifetimes.access, now)?,
        refresh: issuer.issue_at(identity, TokenType::Refresh, lifetimes.refresh, now)?,
    })
}

fn stored(token: &IssuedToken) -> NewToken {
    NewToken {
        token_type: token.token_type,
        token_hash: hash_token(&token.token),
        expires_at: token.expires_at,
    }
}

/// Persists `tokens` as the user's only session. Any storage failure is
/// reported as a transaction failure; the store has rolled back by then.
pub async fn issue_session(
    sessions: &dyn SessionRepository,
    user_id: i64,
    tokens: &SessionTokens,
) -> Result<(), AppError> {
    sessions
        .replace_tokens(user_id, vec![stored(&tokens.access), stored(&tokens.refresh)])
        .await
        .map_err(|e| {
            tracing::error!(user_id, error = %e, "Failed to persist session");
            AppError::Database(DatabaseError::TransactionFailed(e.to_string()))
        })
}

/// Deletes every token row of `user_id`.
pub async fn invalidate_session(sessions: &dyn SessionRepository, user_id: i64) -> Result<(), AppError> {
    let removed = sessions.delete_tokens(user_id).await?;
    if removed == 0 {
        return Err(AuthError::SessionNotFound.into());
    }
    tracing::info!(user_id, removed, "Session invalidated");
    Ok(())
}
