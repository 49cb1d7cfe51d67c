use actix_web::{web, HttpResponse};

use crate::auth::Identity;
use crate::error::AppError;
use crate::services::admin as service;
use crate::store::Repositories;
use crate::validators::positive_id;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/get-all-users", web::get().to(all_users))
        .route("/delete-user/{user_id}", web::delete().to(delete_user));
}

pub async fn all_users(identity: Identity, repos: web::Data<Repositories>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(service::all_users(&repos, &identity).await?))
}

pub async fn delete_user(
    identity: Identity,
    path: web::Path<i64>,
    repos: web::Data<Repositories>,
) -> Result<HttpResponse, AppError> {
    let user_id = positive_id("user_id", path.into_inner())?;
    Ok(HttpResponse::Ok().json(service::delete_user(&repos, &identity, user_id).await?))
}
