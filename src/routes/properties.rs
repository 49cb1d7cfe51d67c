use actix_web::{web, HttpResponse};

use crate::auth::Identity;
use crate::domain::{NewProperty, PropertyFilter, PropertyPatch};
use crate::error::AppError;
use crate::services::properties as service;
use crate::store::Repositories;
use crate::validators::positive_id;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/properties", web::post().to(create))
        .route("/properties", web::get().to(list))
        .route("/properties/{property_id}", web::get().to(get))
        .route("/properties/{property_id}", web::put().to(update))
        .route("/properties/{property_id}", web::delete().to(delete));
}

/// POST /property/properties (admin or staff)
pub async fn create(
    identity: Identity,
    form: web::Json<NewProperty>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let property = service::create_property(&repos, &identity, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(property))
}

/// GET /property/properties?city=&country=&min_price=&max_price=&is_available=
pub async fn list(
    query: web::Query<PropertyFilter>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(service::list_properties(&repos, query.into_inner()).await?))
}

pub async fn get(path: web::Path<i64>, repos: web::Data<Repositories>) -> Result<HttpResponse, AppError> {
    let property_id = positive_id("property_id", path.into_inner())?;
    Ok(HttpResponse::Ok().json(service::get_property(&repos, property_id).await?))
}

pub async fn update(
    identity: Identity,
    path: web::Path<i64>,
    form: web::Json<PropertyPatch>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let property_id = positive_id("property_id", path.into_inner())?;
    let property = service::update_property(&repos, &identity, property_id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(property))
}

pub async fn delete(
    identity: Identity,
    path: web::Path<i64>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let property_id = positive_id("property_id", path.into_inner())?;
    Ok(HttpResponse::Ok().json(service::delete_property(&repos, &identity, property_id).await?))
}
