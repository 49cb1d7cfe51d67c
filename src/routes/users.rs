use actix_web::{web, HttpResponse};

use crate::auth::Identity;
use crate::domain::ProfilePatch;
use crate::error::AppError;
use crate::services::auth::Authenticator;
use crate::services::users::{self as service, UpdateMeRequest};
use crate::store::Repositories;
use crate::validators::positive_id;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/users/me", web::get().to(me))
        .route("/users/me", web::put().to(update_me))
        .route("/users/{user_id}/profile", web::get().to(get_profile))
        .route("/users/{user_id}/profile", web::post().to(create_profile))
        .route("/users/{user_id}/profile", web::put().to(update_profile))
        .route("/users/{user_id}/profile", web::delete().to(delete_profile));
}

/// GET /user/users/me
pub async fn me(identity: Identity, repos: web::Data<Repositories>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(service::current_user(&repos, &identity).await?))
}

/// PUT /user/users/me
///
/// Changes the caller's email and/or password. Existing sessions stay valid.
pub async fn update_me(
    identity: Identity,
    form: web::Json<UpdateMeRequest>,
    repos: web::Data<Repositories>,
    auth: web::Data<Authenticator>,
) -> Result<HttpResponse, AppError> {
    let updated =
        service::update_me(&repos, &identity, form.into_inner(), auth.password_hash_cost()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// GET /user/users/{user_id}/profile (public)
pub async fn get_profile(path: web::Path<i64>, repos: web::Data<Repositories>) -> Result<HttpResponse, AppError> {
    let user_id = positive_id("user_id", path.into_inner())?;
    Ok(HttpResponse::Ok().json(service::get_profile(&repos, user_id).await?))
}

pub async fn create_profile(
    identity: Identity,
    path: web::Path<i64>,
    form: web::Json<ProfilePatch>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let user_id = positive_id("user_id", path.into_inner())?;
    let profile = service::create_profile(&repos, &identity, user_id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

pub async fn update_profile(
    identity: Identity,
    path: web::Path<i64>,
    form: web::Json<ProfilePatch>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let user_id = positive_id("user_id", path.into_inner())?;
    let profile = service::update_profile(&repos, &identity, user_id, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

pub async fn delete_profile(
    identity: Identity,
    path: web::Path<i64>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let user_id = positive_id("user_id", path.into_inner())?;
    Ok(HttpResponse::Ok().json(service::delete_profile(&repos, &identity, user_id).await?))
}
