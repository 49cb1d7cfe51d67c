use actix_web::{web, HttpResponse};

use crate::auth::Identity;
use crate::domain::{BookingRequest, StatusUpdate};
use crate::error::AppError;
use crate::services::bookings as service;
use crate::store::Repositories;
use crate::validators::positive_id;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/bookings", web::post().to(create))
        .route("/bookings", web::get().to(mine))
        .route("/bookings/{booking_id}", web::get().to(get))
        .route("/bookings/{booking_id}/status", web::put().to(update_status))
        .route("/properties/{property_id}/bookings", web::get().to(for_property));
}

/// POST /booking/bookings
///
/// # Errors
/// - 400: property unavailable, guest count out of range, or zero nights
/// - 404: property does not exist
/// - 409: dates overlap a booking that is not cancelled
pub async fn create(
    identity: Identity,
    form: web::Json<BookingRequest>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let booking = service::create_booking(&repos, &identity, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(booking))
}

pub async fn mine(identity: Identity, repos: web::Data<Repositories>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(service::my_bookings(&repos, &identity).await?))
}

pub async fn get(
    identity: Identity,
    path: web::Path<i64>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let booking_id = positive_id("booking_id", path.into_inner())?;
    Ok(HttpResponse::Ok().json(service::get_booking(&repos, &identity, booking_id).await?))
}

pub async fn update_status(
    identity: Identity,
    path: web::Path<i64>,
    form: web::Json<StatusUpdate>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let booking_id = positive_id("booking_id", path.into_inner())?;
    let booking = service::update_status(&repos, &identity, booking_id, form.status).await?;
    Ok(HttpResponse::Ok().json(booking))
}

pub async fn for_property(
    identity: Identity,
    path: web::Path<i64>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let property_id = positive_id("property_id", path.into_inner())?;
    Ok(HttpResponse::Ok().json(service::property_bookings(&repos, &identity, property_id).await?))
}
