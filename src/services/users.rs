use serde::{Deserialize, Serialize};

use crate::auth::{found, hash_password, owned, require_owner, role_gated, Elevation, Identity};
use crate::domain::{CredentialsUpdate, ProfilePatch, UserProfile, UserResponse};
use crate::error::{AppError, AuthError};
use crate::services::MessageResponse;
use crate::store::Repositories;
use crate::validators::is_valid_email;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedUser {
    pub msg: String,
    pub user: UserResponse,
}

pub async fn current_user(repos: &Repositories, identity: &Identity) -> Result<UserResponse, AppError> {
    let user = repos
        .users
        .find_user(identity.user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    let profile = repos.profiles.find_profile(user.user_id).await?;
    Ok(UserResponse::new(&user, profile))
}

pub async fn update_me(
    repos: &Repositories,
    identity: &Identity,
    request: UpdateMeRequest,
    password_hash_cost: u32,
) -> Result<UpdatedUser, AppError> {
    let update = CredentialsUpdate {
        email: request.email.as_deref().map(is_valid_email).transpose()?,
        password_hash: request
            .password
            .as_deref()
            .map(|password| hash_password(password, password_hash_cost))
            .transpose()?,
    };
    if update.is_empty() {
        return Err(AppError::invalid("Provide an email or a password to update"));
    }

    let user = repos.users.update_credentials(identity.user_id, update).await?;
    let profile = repos.profiles.find_profile(user.user_id).await?;

    tracing::info!(user_id = user.user_id, "Credentials updated");
    Ok(UpdatedUser {
        msg: "User updated successfully".to_string(),
        user: UserResponse::new(&user, profile),
    })
}

pub async fn get_profile(repos: &Repositories, user_id: i64) -> Result<UserProfile, AppError> {
    found(repos.profiles.find_profile(user_id).await?, "Profile")
}

/// User must exist, caller must be that user or an admin, and no profile
/// may exist yet.
pub async fn create_profile(
    repos: &Repositories,
    identity: &Identity,
    user_id: i64,
    fields: ProfilePatch,
) -> Result<UserProfile, AppError> {
    found(repos.users.find_user(user_id).await?, "User")?;
    require_owner(
        identity,
        &[user_id],
        Elevation::Admin,
        "Not authorized to create a profile for this user",
    )?;
    if repos.profiles.find_profile(user_id).await?.is_some() {
        return Err(AppError::duplicate("Profile already exists"));
    }

    let profile = repos.profiles.create_profile(user_id, fields).await?;
    tracing::info!(user_id, caller = identity.user_id, "Profile created");
    Ok(profile)
}

pub async fn update_profile(
    repos: &Repositories,
    identity: &Identity,
    user_id: i64,
    patch: ProfilePatch,
) -> Result<UserProfile, AppError> {
    let mut profile = owned(
        identity,
        repos.profiles.find_profile(user_id).await?,
        "Profile",
        Elevation::Admin,
        "Not authorized to update this profile",
    )?;

    profile.apply(patch);
    let profile = repos.profiles.save_profile(&profile).await?;
    tracing::info!(user_id, caller = identity.user_id, "Profile updated");
    Ok(profile)
}

pub async fn delete_profile(
    repos: &Repositories,
    identity: &Identity,
    user_id: i64,
) -> Result<MessageResponse, AppError> {
    role_gated(
        identity,
        repos.profiles.find_profile(user_id).await?,
        "Profile",
        Elevation::Admin,
        "Only admins can delete profiles",
    )?;

    repos.profiles.delete_profile(user_id).await?;
    tracing::info!(user_id, caller = identity.user_id, "Profile deleted");
    Ok(MessageResponse::new("Profile deleted successfully"))
}
