/// Authentication Routes
///
/// Signup, login and logout under `/rest/v1/auth`.
use actix_web::{web, HttpResponse};

use crate::auth::Identity;
use crate::error::AppError;
use crate::services::auth::{self as service, Authenticator, LoginRequest, SignupRequest};
use crate::store::Repositories;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/signup", web::post().to(signup))
        .route("/login", web::post().to(login))
        .route("/logout", web::post().to(logout));
}

/// POST /auth/signup
///
/// Creates an account and its empty profile.
///
/// # Errors
/// - 400: invalid email/password, or email already registered
pub async fn signup(
    form: web::Json<SignupRequest>,
    repos: web::Data<Repositories>,
    auth: web::Data<Authenticator>,
) -> Result<HttpResponse, AppError> {
    let created = auth.signup(&repos, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(created))
}

/// POST /auth/login
///
/// Returns a fresh access/refresh pair. Any earlier tokens of the user stop
/// working.
///
/// # Errors
/// - 401: unknown email or wrong password (same message for both)
/// - 500: token lifetimes misconfigured, or the session write rolled back
pub async fn login(
    form: web::Json<LoginRequest>,
    repos: web::Data<Repositories>,
    auth: web::Data<Authenticator>,
) -> Result<HttpResponse, AppError> {
    let session = auth.login(&repos, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(session))
}

/// POST /auth/logout
pub async fn logout(identity: Identity, repos: web::Data<Repositories>) -> Result<HttpResponse, AppError> {
    let done = service::logout(&repos, &identity).await?;
    Ok(HttpResponse::Ok().json(done))
}
