use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::middleware::{Logger, NormalizePath, TrailingSlash};
use actix_web::{web, App, HttpServer};

use crate::auth::{AuthorizationGate, TokenVerifier};
use crate::configuration::{Settings, StorageBackend};
use crate::error::{AppError, ConfigError};
use crate::logger::LoggerMiddleware;
use crate::routes::{admin, amenities, auth, bookings, health_check, images, properties, users};
use crate::services::auth::Authenticator;
use crate::store::{PgStore, Repositories};

/// Everything a request handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub repositories: Repositories,
    pub authenticator: Authenticator,
    pub gate: AuthorizationGate,
}

impl AppState {
    pub fn new(settings: &Settings, repositories: Repositories) -> Result<Self, ConfigError> {
        let verifier = TokenVerifier::new(&settings.jwt)?;
        Ok(Self {
            authenticator: Authenticator::new(&settings.jwt, settings.application.password_hash_cost)?,
            gate: AuthorizationGate::new(&repositories, verifier),
            repositories,
        })
    }
}

/// Connects the configured storage backend. Postgres is migrated on the way.
pub async fn build_repositories(settings: &Settings) -> Result<Repositories, AppError> {
    match settings.application.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            Ok(Repositories::in_memory())
        }
        StorageBackend::Postgres => {
            let store = PgStore::connect(&settings.database).await?;
            store.migrate().await?;
            tracing::info!("Database connection pool created and migrated");
            Ok(Repositories::from_store(Arc::new(store)))
        }
    }
}

fn bad_request(message: String) -> actix_web::Error {
    AppError::invalid(message).into()
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let repositories = web::Data::new(state.repositories);
    let authenticator = web::Data::new(state.authenticator);
    let gate = web::Data::new(state.gate);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(NormalizePath::new(TrailingSlash::Trim))
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(repositories.clone())
            .app_data(authenticator.clone())
            .app_data(gate.clone())

            // Malformed bodies, paths and queries use the common error body
            .app_data(web::JsonConfig::default().error_handler(|err, _| bad_request(err.to_string())))
            .app_data(web::PathConfig::default().error_handler(|err, _| bad_request(err.to_string())))
            .app_data(web::QueryConfig::default().error_handler(|err, _| bad_request(err.to_string())))

            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/rest/v1")
                    .service(web::scope("/auth").configure(auth::configure))
                    .service(web::scope("/user").configure(users::configure))
                    .service(web::scope("/property").configure(properties::configure))
                    .service(web::scope("/property-image").configure(images::configure))
                    .service(web::scope("/amenity").configure(amenities::configure))
                    .service(web::scope("/admin").configure(admin::configure))
                    .service(web::scope("/booking").configure(bookings::configure)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
