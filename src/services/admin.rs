use crate::auth::{require_role, role_gated, Elevation, Identity};
use crate::domain::UserResponse;
use crate::error::AppError;
use crate::services::MessageResponse;
use crate::store::Repositories;

/// Every non-admin account. An empty result is reported as not found.
pub async fn all_users(repos: &Repositories, identity: &Identity) -> Result<Vec<UserResponse>, AppError> {
    require_role(identity, Elevation::Admin, "Only admins can list users")?;

    let users = repos.users.list_non_admin_users().await?;
    if users.is_empty() {
        return Err(AppError::not_found("Users"));
    }
    Ok(users.iter().map(UserResponse::from).collect())
}

pub async fn delete_user(
    repos: &Repositories,
    identity: &Identity,
    user_id: i64,
) -> Result<MessageResponse, AppError> {
    role_gated(
        identity,
        repos.users.find_user(user_id).await?,
        "User",
        Elevation::Admin,
        "Only admins can delete users",
    )?;

    repos.users.delete_user(user_id).await?;
    tracing::warn!(user_id, admin_id = identity.user_id, "User deleted by admin");
    Ok(MessageResponse::new("User deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    #[tokio::test]
    async fn empty_listing_is_not_found() {
        let repos = Repositories::in_memory();
        let admin = testing::user(&repos, "a@x.com", true, false).await;

        let err = all_users(&repos, &admin).await.unwrap_err();
        assert_eq!(err.to_string(), "Users not found");

        testing::user(&repos, "t@x.com", false, false).await;
        let users = all_users(&repos, &admin).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "t@x.com");
    }

    #[tokio::test]
    async fn staff_cannot_list_or_delete() {
        let repos = Repositories::in_memory();
        let staff = testing::user(&repos, "s@x.com", false, true).await;
        let victim = testing::user(&repos, "v@x.com", false, false).await;

        assert!(all_users(&repos, &staff).await.unwrap_err().is_permission_denied());
        assert!(delete_user(&repos, &staff, victim.user_id).await.unwrap_err().is_permission_denied());
        assert!(delete_user(&repos, &staff, 999).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn deleting_a_user_removes_their_listings() {
        let repos = Repositories::in_memory();
        let admin = testing::user(&repos, "a@x.com", true, false).await;
        let owner = testing::user(&repos, "o@x.com", false, true).await;
        let property = testing::property(&repos, &owner, "Lisbon", 100.0).await;

        delete_user(&repos, &admin, owner.user_id).await.unwrap();

        assert!(repos.users.find_user(owner.user_id).await.unwrap().is_none());
        assert!(repos.profiles.find_profile(owner.user_id).await.unwrap().is_none());
        assert!(repos
            .properties
            .find_property(property.property_id)
            .await
            .unwrap()
            .is_none());
    }
}
