/// Signup, login and logout.
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::{
    hash_password, invalidate_session, issue_session, mint_session, verify_credentials, Identity,
    TokenIssuer,
};
use crate::configuration::JwtSettings;
use crate::domain::NewUser;
use crate::error::{AppError, ConfigError};
use crate::services::MessageResponse;
use crate::store::Repositories;
use crate::validators::{is_valid_email, is_valid_username};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub msg: String,
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub is_admin: bool,
    pub is_staff: bool,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Credential checks plus session issuance. Built once at startup from the
/// JWT settings and shared by every request.
#[derive(Clone)]
pub struct Authenticator {
    issuer: TokenIssuer,
    jwt: JwtSettings,
    password_hash_cost: u32,
}

impl Authenticator {
    pub fn new(jwt: &JwtSettings, password_hash_cost: u32) -> Result<Self, ConfigError> {
        Ok(Self {
            issuer: TokenIssuer::new(jwt)?,
            jwt: jwt.clone(),
            password_hash_cost,
        })
    }

    pub fn password_hash_cost(&self) -> u32 {
        self.password_hash_cost
    }

    pub async fn signup(&self, repos: &Repositories, request: SignupRequest) -> Result<SignupResponse, AppError> {
        let email = is_valid_email(&request.email)?;
        let username = match request.username.as_deref() {
            Some(username) => is_valid_username(username)?,
            None => email.clone(),
        };
        let password_hash = hash_password(&request.password, self.password_hash_cost)?;

        let user = repos
            .users
            .create_user(NewUser {
                username,
                email,
                password_hash,
                is_admin: false,
                is_staff: false,
            })
            .await?;

        tracing::info!(user_id = user.user_id, "User registered");
        Ok(SignupResponse {
            msg: "User created successfully".to_string(),
            user_id: user.user_id,
        })
    }

    /// Verifies credentials, then replaces the user's session with a fresh
    /// access/refresh pair.
    pub async fn login(&self, repos: &Repositories, request: LoginRequest) -> Result<LoginResponse, AppError> {
        let email = request.email.trim().to_lowercase();
        let user = verify_credentials(repos.users.as_ref(), &email, &request.password).await?;

        let lifetimes = self.jwt.token_lifetimes().map_err(|e| {
            tracing::error!(error = %e, "Token lifetimes are misconfigured");
            AppError::Config(e)
        })?;

        let identity = Identity::from(&user);
        let tokens = mint_session(&self.issuer, &identity, lifetimes, Utc::now())?;
        issue_session(repos.sessions.as_ref(), user.user_id, &tokens).await?;

        tracing::info!(user_id = user.user_id, "User logged in");
        Ok(LoginResponse {
            user_id: user.user_id,
            is_admin: identity.is_admin(),
            is_staff: identity.is_staff(),
            access_token: tokens.access.token,
            refresh_token: tokens.refresh.token,
            token_type: "bearer".to_string(),
            expires_in: lifetimes.access_seconds(),
        })
    }
}

pub async fn logout(repos: &Repositories, identity: &Identity) -> Result<MessageResponse, AppError> {
    invalidate_session(repos.sessions.as_ref(), identity.user_id).await?;
    Ok(MessageResponse::new("Successfully logged out"))
}
