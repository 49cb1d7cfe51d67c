use actix_web::{web, HttpResponse};

use crate::auth::Identity;
use crate::domain::AmenityInput;
use crate::error::AppError;
use crate::services::amenities as service;
use crate::store::Repositories;
use crate::validators::positive_id;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/amenities", web::get().to(list))
        .route("/amenities", web::post().to(create))
        .route("/amenities/{amenity_id}", web::put().to(update))
        .route("/amenities/{amenity_id}", web::delete().to(delete))
        .route("/properties/{property_id}/amenities", web::post().to(set_for_property))
        .route("/properties/{property_id}/amenities", web::get().to(for_property));
}

pub async fn list(repos: web::Data<Repositories>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(service::list_amenities(&repos).await?))
}

pub async fn create(
    identity: Identity,
    form: web::Json<AmenityInput>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let amenity = service::create_amenity(&repos, &identity, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(amenity))
}

pub async fn update(
    identity: Identity,
    path: web::Path<i64>,
    form: web::Json<AmenityInput>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let amenity_id = positive_id("amenity_id", path.into_inner())?;
    let amenity = service::update_amenity(&repos, &identity, amenity_id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(amenity))
}

pub async fn delete(
    identity: Identity,
    path: web::Path<i64>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let amenity_id = positive_id("amenity_id", path.into_inner())?;
    Ok(HttpResponse::Ok().json(service::delete_amenity(&repos, &identity, amenity_id).await?))
}

/// POST /amenity/properties/{property_id}/amenities with a JSON array of ids
pub async fn set_for_property(
    identity: Identity,
    path: web::Path<i64>,
    form: web::Json<Vec<i64>>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let property_id = positive_id("property_id", path.into_inner())?;
    let linked =
        service::set_property_amenities(&repos, &identity, property_id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(linked))
}

pub async fn for_property(path: web::Path<i64>, repos: web::Data<Repositories>) -> Result<HttpResponse, AppError> {
    let property_id = positive_id("property_id", path.into_inner())?;
    Ok(HttpResponse::Ok().json(service::property_amenities(&repos, property_id).await?))
}
