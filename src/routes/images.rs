use actix_web::{web, HttpResponse};

use crate::auth::Identity;
use crate::domain::{ImagePatch, NewImage};
use crate::error::AppError;
use crate::services::images as service;
use crate::store::Repositories;
use crate::validators::positive_id;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/properties/images/{image_id}", web::put().to(update))
        .route("/properties/images/{image_id}", web::delete().to(delete))
        .route("/properties/{property_id}/images", web::post().to(add))
        .route("/properties/{property_id}/images", web::get().to(list));
}

pub async fn add(
    identity: Identity,
    path: web::Path<i64>,
    form: web::Json<NewImage>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let property_id = positive_id("property_id", path.into_inner())?;
    let image = service::add_image(&repos, &identity, property_id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(image))
}

pub async fn list(path: web::Path<i64>, repos: web::Data<Repositories>) -> Result<HttpResponse, AppError> {
    let property_id = positive_id("property_id", path.into_inner())?;
    Ok(HttpResponse::Ok().json(service::list_images(&repos, property_id).await?))
}

pub async fn update(
    identity: Identity,
    path: web::Path<i64>,
    form: web::Json<ImagePatch>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let image_id = positive_id("image_id", path.into_inner())?;
    let image = service::update_image(&repos, &identity, image_id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(image))
}

pub async fn delete(
    identity: Identity,
    path: web::Path<i64>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let image_id = positive_id("image_id", path.into_inner())?;
    Ok(HttpResponse::Ok().json(service::delete_image(&repos, &identity, image_id).await?))
}
