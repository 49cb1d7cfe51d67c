use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;

use crate::auth::{AuthorizationGate, Identity};
use crate::error::{AppError, AuthError};

/// Handlers that take an `Identity` argument are protected: the request is
/// run through the `AuthorizationGate` before the handler body executes.
impl FromRequest for Identity {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let gate = req.app_data::<web::Data<AuthorizationGate>>().cloned();
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .map(|value| value.to_str().map(str::to_owned));

        Box::pin(async move {
            let gate = gate.ok_or_else(|| {
                AppError::Internal("authorization gate is not registered".to_string())
            })?;

            let header = match header {
                None => None,
                Some(Ok(value)) => Some(value),
                // Not visible ASCII, so it cannot be a bearer header.
                Some(Err(_)) => return Err(AuthError::MissingToken.into()),
            };

            gate.authorize(header.as_deref()).await
        })
    }
}
