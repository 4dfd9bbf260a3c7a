use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use serde::Serialize;
use std::future::{ready, Ready};

use crate::error::AppError;

/// The authenticated principal, resolved by `PrincipalResolver` and threaded
/// to handlers through request extensions.
///
/// Handlers that need the caller take this as an argument; nothing reads an
/// ambient "current user" from global state.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub email: String,
}

impl FromRequest for CurrentUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<CurrentUser>().cloned() {
            Some(user) => ready(Ok(user)),
            None => {
                // Reached only if a protected route is wired up without the
                // resolver middleware; deny rather than guess.
                let err = AppError::InvalidAccessToken;
                let response = err.error_response_at(req.path());
                ready(Err(
                    actix_web::error::InternalError::from_response(err, response).into()
                ))
            }
        }
    }
}
