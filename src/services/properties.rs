use crate::auth::{found, owned, require_role, Elevation, Identity};
use crate::domain::{NewProperty, Property, PropertyFilter, PropertyPatch};
use crate::error::AppError;
use crate::services::MessageResponse;
use crate::store::Repositories;

/// Admins and staff list properties; the caller becomes the owner.
pub async fn create_property(
    repos: &Repositories,
    identity: &Identity,
    input: NewProperty,
) -> Result<Property, AppError> {
    require_role(
        identity,
        Elevation::AdminOrStaff,
        "Only admin or staff can create properties",
    )?;
    let input = input.validated()?;

    let property = repos.properties.create_property(identity.user_id, input).await?;
    tracing::info!(
        property_id = property.property_id,
        owner_id = property.owner_id,
        "Property created"
    );
    Ok(property)
}

pub async fn get_property(repos: &Repositories, property_id: i64) -> Result<Property, AppError> {
    found(repos.properties.find_property(property_id).await?, "Property")
}

pub async fn update_property(
    repos: &Repositories,
    identity: &Identity,
    property_id: i64,
    patch: PropertyPatch,
) -> Result<Property, AppError> {
    let mut property = owned(
        identity,
        repos.properties.find_property(property_id).await?,
        "Property",
        Elevation::Admin,
        "Not authorized to update this property",
    )?;

    property.apply(patch.validated()?);
    let property = repos.properties.save_property(&property).await?;
    tracing::info!(property_id, caller = identity.user_id, "Property updated");
    Ok(property)
}

pub async fn delete_property(
    repos: &Repositories,
    identity: &Identity,
    property_id: i64,
) -> Result<MessageResponse, AppError> {
    owned(
        identity,
        repos.properties.find_property(property_id).await?,
        "Property",
        Elevation::Admin,
        "Not authorized to delete this property",
    )?;

    repos.properties.delete_property(property_id).await?;
    tracing::info!(property_id, caller = identity.user_id, "Property deleted");
    Ok(MessageResponse::new("Property deleted successfully"))
}

pub async fn list_properties(repos: &Repositories, filter: PropertyFilter) -> Result<Vec<Property>, AppError> {
    let filter = filter.normalized();
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
        if min > max {
            return Err(AppError::invalid("min_price must not exceed max_price"));
        }
    }
    repos.properties.list_properties(&filter).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;

    #[tokio::test]
    async fn only_admin_or_staff_create() {
        let repos = Repositories::in_memory();
        let traveler = testing::user(&repos, "t@x.com", false, false).await;
        let staff = testing::user(&repos, "s@x.com", false, true).await;

        let err = create_property(&repos, &traveler, testing::listing("Lisbon", 80.0))
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());

        let property = create_property(&repos, &staff, testing::listing("Lisbon", 80.0))
            .await
            .unwrap();
        assert_eq!(property.owner_id, staff.user_id);
    }

    #[tokio::test]
    async fn missing_property_is_404_for_everyone() {
        let repos = Repositories::in_memory();
        let traveler = testing::user(&repos, "t@x.com", false, false).await;
        let admin = testing::user(&repos, "a@x.com", true, false).await;

        for who in [&traveler, &admin] {
            let err = update_property(&repos, who, 42, PropertyPatch::default())
                .await
                .unwrap_err();
            assert!(err.is_not_found());
            let err = delete_property(&repos, who, 42).await.unwrap_err();
            assert!(err.is_not_found());
        }
    }

    #[tokio::test]
    async fn non_owner_cannot_mutate() {
        let repos = Repositories::in_memory();
        let owner = testing::user(&repos, "o@x.com", false, true).await;
        let other_staff = testing::user(&repos, "s@x.com", false, true).await;
        let property = testing::property(&repos, &owner, "Porto", 50.0).await;

        let patch = PropertyPatch {
            title: Some("Mine now".to_string()),
            ..PropertyPatch::default()
        };
        let err = update_property(&repos, &other_staff, property.property_id, patch)
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());

        let err = delete_property(&repos, &other_staff, property.property_id)
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());
        assert!(get_property(&repos, property.property_id).await.is_ok());
    }

    #[tokio::test]
    async fn owner_and_admin_can_update() {
        let repos = Repositories::in_memory();
        let owner = testing::user(&repos, "o@x.com", false, true).await;
        let admin = testing::user(&repos, "a@x.com", true, false).await;
        let property = testing::property(&repos, &owner, "Porto", 50.0).await;

        let updated = update_property(
            &repos,
            &owner,
            property.property_id,
            PropertyPatch {
                price_per_night: Some(65.0),
                ..PropertyPatch::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.price_per_night, 65.0);

        delete_property(&repos, &admin, property.property_id).await.unwrap();
        assert!(get_property(&repos, property.property_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn listing_filters_and_is_repeatable() {
        let repos = Repositories::in_memory();
        let owner = testing::user(&repos, "o@x.com", false, true).await;
        testing::property(&repos, &owner, "Lisbon", 80.0).await;
        testing::property(&repos, &owner, "Porto", 120.0).await;
        let hidden = testing::property(&repos, &owner, "Lisbon", 90.0).await;
        update_property(
            &repos,
            &owner,
            hidden.property_id,
            PropertyPatch {
                is_available: Some(false),
                ..PropertyPatch::default()
            },
        )
        .await
        .unwrap();

        let filter = PropertyFilter {
            city: Some("LIS".to_string()),
            ..PropertyFilter::default()
        };
        let first = list_properties(&repos, filter.clone()).await.unwrap();
        let second = list_properties(&repos, filter).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);

        let priced = list_properties(
            &repos,
            PropertyFilter {
                min_price: Some(80.0),
                max_price: Some(120.0),
                ..PropertyFilter::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(priced.len(), 2);
        assert!(priced[0].property_id < priced[1].property_id);

        let err = list_properties(
            &repos,
            PropertyFilter {
                min_price: Some(10.0),
                max_price: Some(5.0),
                ..PropertyFilter::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
