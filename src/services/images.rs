use crate::auth::{found, owned, require_owner, Elevation, Identity};
use crate::domain::{ImagePatch, NewImage, PropertyImage};
use crate::error::AppError;
use crate::services::MessageResponse;
use crate::store::Repositories;

/// Existence of the image, then ownership through its property.
async fn authorize_image(
    repos: &Repositories,
    identity: &Identity,
    image_id: i64,
    denial: &str,
) -> Result<PropertyImage, AppError> {
    let image = found(repos.images.find_image(image_id).await?, "Image")?;
    let owners: Vec<i64> = repos
        .properties
        .find_property(image.property_id)
        .await?
        .map(|property| property.owner_id)
        .into_iter()
        .collect();
    require_owner(identity, &owners, Elevation::Admin, denial)?;
    Ok(image)
}

pub async fn add_image(
    repos: &Repositories,
    identity: &Identity,
    property_id: i64,
    image: NewImage,
) -> Result<PropertyImage, AppError> {
    owned(
        identity,
        repos.properties.find_property(property_id).await?,
        "Property",
        Elevation::Admin,
        "Not authorized to add images to this property",
    )?;

    let image = repos.images.create_image(property_id, image.validated()?).await?;
    tracing::info!(property_id, image_id = image.image_id, "Image added");
    Ok(image)
}

pub async fn list_images(repos: &Repositories, property_id: i64) -> Result<Vec<PropertyImage>, AppError> {
    found(repos.properties.find_property(property_id).await?, "Property")?;
    repos.images.images_for_property(property_id).await
}

pub async fn update_image(
    repos: &Repositories,
    identity: &Identity,
    image_id: i64,
    patch: ImagePatch,
) -> Result<PropertyImage, AppError> {
    authorize_image(repos, identity, image_id, "Not authorized to update this image").await?;

    let image = repos.images.update_image(image_id, patch.validated()?).await?;
    tracing::info!(image_id, caller = identity.user_id, "Image updated");
    Ok(image)
}

pub async fn delete_image(
    repos: &Repositories,
    identity: &Identity,
    image_id: i64,
) -> Result<MessageResponse, AppError> {
    authorize_image(repos, identity, image_id, "Not authorized to delete this image").await?;

    repos.images.delete_image(image_id).await?;
    tracing::info!(image_id, caller = identity.user_id, "Image deleted");
    Ok(MessageResponse::new("Image deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    fn image(url: &str) -> NewImage {
        NewImage {
            image_url: url.to_string(),
            is_cover: false,
        }
    }

    #[tokio::test]
    async fn ownership_flows_through_the_property() {
        let repos = Repositories::in_memory();
        let owner = testing::user(&repos, "o@x.com", false, true).await;
        let stranger = testing::user(&repos, "s@x.com", false, false).await;
        let admin = testing::user(&repos, "a@x.com", true, false).await;
        let property = testing::property(&repos, &owner, "Faro", 70.0).await;

        let err = add_image(&repos, &stranger, property.property_id, image("https://i/1"))
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());

        let added = add_image(&repos, &owner, property.property_id, image("https://i/1"))
            .await
            .unwrap();

        let patch = ImagePatch {
            is_cover: Some(true),
            ..ImagePatch::default()
        };
        let err = update_image(&repos, &stranger, added.image_id, patch.clone())
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());
        assert!(update_image(&repos, &owner, added.image_id, patch).await.unwrap().is_cover);

        let err = delete_image(&repos, &stranger, added.image_id).await.unwrap_err();
        assert!(err.is_permission_denied());
        delete_image(&repos, &admin, added.image_id).await.unwrap();
        assert!(list_images(&repos, property.property_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_targets_are_404() {
        let repos = Repositories::in_memory();
        let admin = testing::user(&repos, "a@x.com", true, false).await;

        assert!(add_image(&repos, &admin, 5, image("https://i/1")).await.unwrap_err().is_not_found());
        assert!(delete_image(&repos, &admin, 5).await.unwrap_err().is_not_found());
        assert!(list_images(&repos, 5).await.unwrap_err().is_not_found());
    }
}
