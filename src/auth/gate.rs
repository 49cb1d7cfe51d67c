/// Authorization gate
///
/// Turns a raw `Authorization` header into a resolved `Identity`. The checks
/// run in a fixed order and the first failure wins:
///
/// 1. header present and of the form `Bearer <token>` (else `MissingToken`)
/// 2. a session row exists for the token digest (else `TokenInvalid`)
/// 3. signature and expiry verify (else `TokenExpired` / `TokenInvalid`)
/// 4. the embedded user still exists (else `UserNotFound`)
///
/// Role flags on the returned identity come from the user row, not the
/// token, so a role change applies from the next request.
use std::sync::Arc;

use crate::auth::jwt::{hash_token, TokenVerifier};
use crate::auth::Identity;
use crate::error::{AppError, AuthError};
use crate::store::{Repositories, SessionRepository, UserRepository};

#[derive(Clone)]
pub struct AuthorizationGate {
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
    verifier: TokenVerifier,
}

impl AuthorizationGate {
    pub fn new(repositories: &Repositories, verifier: TokenVerifier) -> Self {
        Self {
            sessions: repositories.sessions.clone(),
            users: repositories.users.clone(),
            verifier,
        }
    }

    pub async fn authorize(&self, header: Option<&str>) -> Result<Identity, AppError> {
        let token = bearer_token(header)?;
        self.resolve(token).await
    }

    /// Steps 2-4 for an already extracted token.
    pub async fn resolve(&self, token: &str) -> Result<Identity, AppError> {
        let record = self.sessions.find_token(&hash_token(token)).await?;
        let record = match record {
            Some(record) => record,
            None => {
                tracing::warn!("Presented token has no session row");
                return Err(AuthError::TokenInvalid.into());
            }
        };

        let claims = self.verifier.verify(token)?;
        if claims.user_id != record.user_id {
            tracing::warn!(
                claims_user = claims.user_id,
                session_user = record.user_id,
                "Token claims do not match session owner"
            );
            return Err(AuthError::TokenInvalid.into());
        }

        let user = self
            .users
            .find_user(claims.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(Identity::from(&user))
    }
}

/// Extracts the token from a `Bearer <token>` header value. The scheme is
/// matched case-insensitively.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingToken)?;
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MissingToken)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingToken);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{RoleSet, TokenIssuer, TokenType};
    use crate::configuration::JwtSettings;
    use crate::domain::NewUser;
    use crate::store::{InMemoryStore, NewToken};
    use chrono::{Duration, Utc};

    fn settings() -> JwtSettings {
        JwtSettings {
            secret: "gate-test-secret".to_string(),
            algorithm: "HS256".to_string(),
            access_token_expire_minutes: "30".to_string(),
            refresh_token_expire_days: "7".to_string(),
        }
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        gate: AuthorizationGate,
        issuer: TokenIssuer,
        user_id: i64,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let repositories = Repositories::from_store(store.clone());
        let user = repositories
            .users
            .create_user(NewUser {
                username: "gate@example.com".to_string(),
                email: "gate@example.com".to_string(),
                password_hash: "x".to_string(),
                is_admin: false,
                is_staff: true,
            })
            .await
            .unwrap();

        Fixture {
            gate: AuthorizationGate::new(&repositories, TokenVerifier::new(&settings()).unwrap()),
            issuer: TokenIssuer::new(&settings()).unwrap(),
            store,
            user_id: user.user_id,
        }
    }

    async fn persist(f: &Fixture, token: &str) {
        f.store
            .replace_tokens(
                f.user_id,
                vec![NewToken {
                    token_type: TokenType::Access,
                    token_hash: hash_token(token),
                    expires_at: Utc::now() + Duration::minutes(30),
                }],
            )
            .await
            .unwrap();
    }

    fn identity(f: &Fixture) -> Identity {
        Identity::new(f.user_id, RoleSet::from_flags(false, true))
    }

    #[test]
    fn test_bearer_header_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(Some("bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(None), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(Some("abc")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(Some("Basic abc")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(Some("Bearer   ")), Err(AuthError::MissingToken));
    }

    #[tokio::test]
    async fn stored_valid_token_resolves_identity() {
        let f = fixture().await;
        let issued = f
            .issuer
            .issue(&identity(&f), TokenType::Access, Duration::minutes(5))
            .unwrap();
        persist(&f, &issued.token).await;

        let header = format!("Bearer {}", issued.token);
        let resolved = f.gate.authorize(Some(&header)).await.unwrap();

        assert_eq!(resolved.user_id, f.user_id);
        assert!(resolved.is_staff());
        assert!(!resolved.is_admin());
    }

    #[tokio::test]
    async fn signed_but_unstored_token_is_invalid() {
        let f = fixture().await;
        let issued = f
            .issuer
            .issue(&identity(&f), TokenType::Access, Duration::minutes(5))
            .unwrap();

        let err = f.gate.resolve(&issued.token).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn expired_stored_token_is_expired() {
        let f = fixture().await;
        let issued = f
            .issuer
            .issue_at(
                &identity(&f),
                TokenType::Access,
                Duration::minutes(5),
                Utc::now() - Duration::hours(1),
            )
            .unwrap();
        persist(&f, &issued.token).await;

        let err = f.gate.resolve(&issued.token).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn missing_row_wins_over_expiry() {
        let f = fixture().await;
        let issued = f
            .issuer
            .issue_at(
                &identity(&f),
                TokenType::Access,
                Duration::minutes(5),
                Utc::now() - Duration::hours(1),
            )
            .unwrap();

        let err = f.gate.resolve(&issued.token).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn stored_garbage_is_invalid() {
        let f = fixture().await;
        persist(&f, "not-a-jwt").await;

        let err = f.gate.resolve("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenInvalid)));
    }

    struct NoUsers;

    #[async_trait::async_trait]
    impl UserRepository for NoUsers {
        async fn create_user(&self, _: NewUser) -> Result<crate::domain::User, AppError> {
            Err(AppError::Internal("read-only".to_string()))
        }
        async fn find_user(&self, _: i64) -> Result<Option<crate::domain::User>, AppError> {
            Ok(None)
        }
        async fn find_user_by_email(&self, _: &str) -> Result<Option<crate::domain::User>, AppError> {
            Ok(None)
        }
        async fn update_credentials(
            &self,
            _: i64,
            _: crate::domain::CredentialsUpdate,
        ) -> Result<crate::domain::User, AppError> {
            Err(AppError::not_found("User"))
        }
        async fn list_non_admin_users(&self) -> Result<Vec<crate::domain::User>, AppError> {
            Ok(Vec::new())
        }
        async fn delete_user(&self, _: i64) -> Result<bool, AppError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn vanished_user_is_reported() {
        let f = fixture().await;
        let issued = f
            .issuer
            .issue(&identity(&f), TokenType::Access, Duration::minutes(5))
            .unwrap();
        persist(&f, &issued.token).await;

        let mut repositories = Repositories::from_store(f.store.clone());
        repositories.users = Arc::new(NoUsers);
        let gate = AuthorizationGate::new(&repositories, TokenVerifier::new(&settings()).unwrap());

        let err = gate.resolve(&issued.token).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn token_for_another_user_is_invalid() {
        let f = fixture().await;
        let stranger = Identity::new(f.user_id + 1, RoleSet::default());
        let issued = f
            .issuer
            .issue(&stranger, TokenType::Access, Duration::minutes(5))
            .unwrap();
        persist(&f, &issued.token).await;

        let err = f.gate.resolve(&issued.token).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn rejected_token_from_missing_header() {
        let f = fixture().await;
        let err = f.gate.authorize(None).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::MissingToken)));
    }
}
