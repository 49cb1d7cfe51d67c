use serde::Serialize;

use super::UserProfile;

/// Stored account. `password_hash` never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_staff: bool,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_staff: bool,
}

/// Changes to the login credentials; `None` leaves the field alone.
#[derive(Debug, Clone, Default)]
pub struct CredentialsUpdate {
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl CredentialsUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password_hash.is_none()
    }
}

impl User {
    /// A username that was derived from the email follows it to the new one.
    pub fn apply(&mut self, update: CredentialsUpdate) {
        if let Some(email) = update.email {
            if self.username == self.email {
                self.username = email.clone();
            }
            self.email = email;
        }
        if let Some(password_hash) = update.password_hash {
            self.password_hash = password_hash;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub is_staff: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

impl UserResponse {
    pub fn new(user: &User, profile: Option<UserProfile>) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            is_staff: user.is_staff,
            profile,
        }
    }
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse::new(user, None)
    }
}
