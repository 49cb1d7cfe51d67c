use crate::auth::{found, owned, require_role, role_gated, Elevation, Identity};
use crate::domain::{Amenity, AmenityInput};
use crate::error::AppError;
use crate::services::MessageResponse;
use crate::store::Repositories;

pub async fn list_amenities(repos: &Repositories) -> Result<Vec<Amenity>, AppError> {
    repos.amenities.list_amenities().await
}

pub async fn create_amenity(
    repos: &Repositories,
    identity: &Identity,
    input: AmenityInput,
) -> Result<Amenity, AppError> {
    require_role(identity, Elevation::Admin, "Only admins can create amenities")?;
    let input = input.validated()?;

    let amenity = repos.amenities.create_amenity(&input.name).await?;
    tracing::info!(amenity_id = amenity.amenity_id, "Amenity created");
    Ok(amenity)
}

pub async fn update_amenity(
    repos: &Repositories,
    identity: &Identity,
    amenity_id: i64,
    input: AmenityInput,
) -> Result<Amenity, AppError> {
    role_gated(
        identity,
        repos.amenities.find_amenity(amenity_id).await?,
        "Amenity",
        Elevation::Admin,
        "Only admins can update amenities",
    )?;
    let input = input.validated()?;

    repos.amenities.rename_amenity(amenity_id, &input.name).await
}

pub async fn delete_amenity(
    repos: &Repositories,
    identity: &Identity,
    amenity_id: i64,
) -> Result<MessageResponse, AppError> {
    role_gated(
        identity,
        repos.amenities.find_amenity(amenity_id).await?,
        "Amenity",
        Elevation::Admin,
        "Only admins can delete amenities",
    )?;

    repos.amenities.delete_amenity(amenity_id).await?;
    tracing::info!(amenity_id, "Amenity deleted");
    Ok(MessageResponse::new("Amenity deleted successfully"))
}

/// Replaces the property's amenity set. Every id must name an existing
/// amenity; the first unknown one is reported.
pub async fn set_property_amenities(
    repos: &Repositories,
    identity: &Identity,
    property_id: i64,
    amenity_ids: Vec<i64>,
) -> Result<Vec<Amenity>, AppError> {
    owned(
        identity,
        repos.properties.find_property(property_id).await?,
        "Property",
        Elevation::Admin,
        "Not authorized to change amenities of this property",
    )?;

    for amenity_id in &amenity_ids {
        if repos.amenities.find_amenity(*amenity_id).await?.is_none() {
            return Err(AppError::not_found(format!("Amenity {}", amenity_id)));
        }
    }

    repos
        .amenities
        .set_property_amenities(property_id, &amenity_ids)
        .await?;
    tracing::info!(property_id, count = amenity_ids.len(), "Property amenities replaced");
    repos.amenities.amenities_for_property(property_id).await
}

pub async fn property_amenities(repos: &Repositories, property_id: i64) -> Result<Vec<Amenity>, AppError> {
    found(repos.properties.find_property(property_id).await?, "Property")?;
    repos.amenities.amenities_for_property(property_id).await
}
