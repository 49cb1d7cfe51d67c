/// Bookings
///
/// A booking belongs to its traveler; the owner of the booked property
/// manages it. Status moves along
///
/// ```text
/// pending -> confirmed -> completed
///    \           \
///     +-----------+-> cancelled
/// ```
///
/// Travelers may only cancel. Owners and admins may make any legal move.
use crate::auth::{found, owned, require_owner, Elevation, Identity};
use crate::domain::{Booking, BookingRequest, BookingStatus, NewBooking, Property};
use crate::error::AppError;
use crate::store::Repositories;

fn is_legal(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled) | (Confirmed, Completed)
    )
}

fn manages(identity: &Identity, property: Option<&Property>) -> bool {
    identity.is_admin() || property.is_some_and(|p| p.owner_id == identity.user_id)
}

pub async fn create_booking(
    repos: &Repositories,
    identity: &Identity,
    request: BookingRequest,
) -> Result<Booking, AppError> {
    let property = found(
        repos.properties.find_property(request.property_id).await?,
        "Property",
    )?;

    if !property.is_available {
        return Err(AppError::invalid("Property is not available for booking"));
    }
    if request.guests < 1 || request.guests > property.max_guests {
        return Err(AppError::invalid(format!(
            "guests must be between 1 and {}",
            property.max_guests
        )));
    }
    let nights = request.nights();
    if nights < 1 {
        return Err(AppError::invalid("A booking must span at least one night"));
    }

    let booking = repos
        .bookings
        .create_booking(NewBooking {
            traveler_id: identity.user_id,
            property_id: property.property_id,
            start_date: request.start_date,
            end_date: request.end_date,
            guests: request.guests,
            total_price: nights as f64 * property.price_per_night,
        })
        .await?
        .ok_or_else(|| AppError::Conflict("Property is already booked for these dates".to_string()))?;

    tracing::info!(
        booking_id = booking.booking_id,
        property_id = booking.property_id,
        traveler_id = booking.traveler_id,
        "Booking created"
    );
    Ok(booking)
}

pub async fn my_bookings(repos: &Repositories, identity: &Identity) -> Result<Vec<Booking>, AppError> {
    repos.bookings.bookings_for_traveler(identity.user_id).await
}

/// Visible to the traveler, the property owner, admins and staff.
pub async fn get_booking(repos: &Repositories, identity: &Identity, booking_id: i64) -> Result<Booking, AppError> {
    let booking = found(repos.bookings.find_booking(booking_id).await?, "Booking")?;
    let property = repos.properties.find_property(booking.property_id).await?;

    let mut parties = vec![booking.traveler_id];
    parties.extend(property.map(|p| p.owner_id));
    require_owner(
        identity,
        &parties,
        Elevation::AdminOrStaff,
        "Not authorized to view this booking",
    )?;
    Ok(booking)
}

pub async fn update_status(
    repos: &Repositories,
    identity: &Identity,
    booking_id: i64,
    status: BookingStatus,
) -> Result<Booking, AppError> {
    let booking = found(repos.bookings.find_booking(booking_id).await?, "Booking")?;
    let property = repos.properties.find_property(booking.property_id).await?;

    let manager = manages(identity, property.as_ref());
    let traveler = booking.traveler_id == identity.user_id;
    if !manager && !traveler {
        return Err(AppError::forbidden("Not authorized to change this booking"));
    }

    if !manager && status != BookingStatus::Cancelled {
        return Err(AppError::forbidden(
            "Only the property owner can confirm or complete a booking",
        ));
    }
    if !is_legal(booking.status, status) {
        return Err(AppError::invalid(format!(
            "Cannot change booking status from {} to {}",
            booking.status, status
        )));
    }

    let booking = repos.bookings.set_booking_status(booking_id, status).await?;
    tracing::info!(booking_id, status = %status, caller = identity.user_id, "Booking status changed");
    Ok(booking)
}

pub async fn property_bookings(
    repos: &Repositories,
    identity: &Identity,
    property_id: i64,
) -> Result<Vec<Booking>, AppError> {
    owned(
        identity,
        repos.properties.find_property(property_id).await?,
        "Property",
        Elevation::Admin,
        "Not authorized to view bookings of this property",
    )?;
    repos.bookings.bookings_for_property(property_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;
    use chrono::{DateTime, TimeZone, Utc};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, d, 14, 0, 0).unwrap()
    }

    fn request(property_id: i64, from: u32, to: u32, guests: i32) -> BookingRequest {
        BookingRequest {
            property_id,
            start_date: day(from),
            end_date: day(to),
            guests,
        }
    }

    #[tokio::test]
    async fn booking_is_priced_per_night() {
        let repos = Repositories::in_memory();
        let owner = testing::user(&repos, "o@x.com", false, true).await;
        let traveler = testing::user(&repos, "t@x.com", false, false).await;
        let property = testing::property(&repos, &owner, "Lisbon", 75.0).await;

        let booking = create_booking(&repos, &traveler, request(property.property_id, 1, 4, 2))
            .await
            .unwrap();

        assert_eq!(booking.total_price, 225.0);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.traveler_id, traveler.user_id);
        assert_eq!(my_bookings(&repos, &traveler).await.unwrap(), vec![booking]);
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected() {
        let repos = Repositories::in_memory();
        let owner = testing::user(&repos, "o@x.com", false, true).await;
        let traveler = testing::user(&repos, "t@x.com", false, false).await;
        let property = testing::property(&repos, &owner, "Lisbon", 75.0).await;

        assert!(create_booking(&repos, &traveler, request(99, 1, 4, 2)).await.unwrap_err().is_not_found());
        for bad in [
            request(property.property_id, 1, 4, 0),
            request(property.property_id, 1, 4, 5),
            request(property.property_id, 4, 4, 1),
            request(property.property_id, 5, 4, 1),
        ] {
            let err = create_booking(&repos, &traveler, bad).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn overlapping_dates_conflict_until_cancelled() {
        let repos = Repositories::in_memory();
        let owner = testing::user(&repos, "o@x.com", false, true).await;
        let traveler = testing::user(&repos, "t@x.com", false, false).await;
        let property = testing::property(&repos, &owner, "Lisbon", 75.0).await;

        let first = create_booking(&repos, &traveler, request(property.property_id, 1, 4, 1))
            .await
            .unwrap();
        let err = create_booking(&repos, &traveler, request(property.property_id, 3, 6, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // check-out day is free
        create_booking(&repos, &traveler, request(property.property_id, 4, 6, 1))
            .await
            .unwrap();

        update_status(&repos, &traveler, first.booking_id, BookingStatus::Cancelled)
            .await
            .unwrap();
        create_booking(&repos, &traveler, request(property.property_id, 1, 3, 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn status_transitions_respect_roles() {
        let repos = Repositories::in_memory();
        let owner = testing::user(&repos, "o@x.com", false, true).await;
        let traveler = testing::user(&repos, "t@x.com", false, false).await;
        let stranger = testing::user(&repos, "s@x.com", false, true).await;
        let property = testing::property(&repos, &owner, "Lisbon", 75.0).await;
        let booking = create_booking(&repos, &traveler, request(property.property_id, 1, 4, 1))
            .await
            .unwrap();
        let id = booking.booking_id;

        let err = update_status(&repos, &traveler, id, BookingStatus::Confirmed).await.unwrap_err();
        assert!(err.is_permission_denied());
        // not a legal move from pending either, but the traveler may only cancel
        let err = update_status(&repos, &traveler, id, BookingStatus::Completed).await.unwrap_err();
        assert!(err.is_permission_denied());
        let err = update_status(&repos, &stranger, id, BookingStatus::Cancelled).await.unwrap_err();
        assert!(err.is_permission_denied());
        let err = update_status(&repos, &owner, id, BookingStatus::Completed).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        update_status(&repos, &owner, id, BookingStatus::Confirmed).await.unwrap();
        let done = update_status(&repos, &owner, id, BookingStatus::Completed).await.unwrap();
        assert_eq!(done.status, BookingStatus::Completed);

        let err = update_status(&repos, &traveler, id, BookingStatus::Cancelled).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(update_status(&repos, &owner, 999, BookingStatus::Cancelled).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn visibility() {
        let repos = Repositories::in_memory();
        let owner = testing::user(&repos, "o@x.com", false, false).await;
        let traveler = testing::user(&repos, "t@x.com", false, false).await;
        let staff = testing::user(&repos, "s@x.com", false, true).await;
        let other = testing::user(&repos, "x@x.com", false, false).await;
        let property = testing::property(&repos, &owner, "Lisbon", 75.0).await;
        let booking = create_booking(&repos, &traveler, request(property.property_id, 1, 4, 1))
            .await
            .unwrap();

        for who in [&owner, &traveler, &staff] {
            assert!(get_booking(&repos, who, booking.booking_id).await.is_ok());
        }
        assert!(get_booking(&repos, &other, booking.booking_id).await.unwrap_err().is_permission_denied());

        assert_eq!(property_bookings(&repos, &owner, property.property_id).await.unwrap().len(), 1);
        assert!(property_bookings(&repos, &traveler, property.property_id)
            .await
            .unwrap_err()
            .is_permission_denied());
    }
}
