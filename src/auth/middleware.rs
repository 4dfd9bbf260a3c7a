use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::auth::extractors::CurrentUser;
use crate::auth::token::TokenCodec;
use crate::error::AppError;
use crate::store::CredentialStore;

/// Resolves the authenticated principal for every protected request.
///
/// Validation of the bearer token is stateless (codec only); the refresh
/// store is never touched on this path. A token that decodes fine is then
/// bound to a live account: signature validity does not imply continued
/// account validity, so a vanished or disabled principal still fails the
/// request. The resolved `CurrentUser` is threaded to handlers through
/// request extensions; there is no ambient security context.
///
/// The middleware also re-renders any `AppError` escaping downstream
/// handlers into the uniform error envelope, stamped with the request path.
pub struct PrincipalResolver;

impl<S, B> Transform<S, ServiceRequest> for PrincipalResolver
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = PrincipalResolverService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PrincipalResolverService {
            service: Rc::new(service),
        }))
    }
}

pub struct PrincipalResolverService<S> {
    service: Rc<S>,
}

/// Endpoints reachable without an access token. Logout is matched exactly
/// so that logout-all stays protected.
fn is_public(path: &str) -> bool {
    path == "/health"
        || path == "/api/auth/login"
        || path == "/api/auth/register"
        || path == "/api/auth/refresh"
        || path == "/api/auth/logout"
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

async fn resolve_principal(req: &ServiceRequest) -> Result<CurrentUser, AppError> {
    let token = bearer_token(req).ok_or(AppError::InvalidAccessToken)?;

    let codec = req
        .app_data::<web::Data<TokenCodec>>()
        .ok_or_else(|| AppError::InternalServerError("token codec not configured".into()))?;
    let claims = codec.decode(token)?;

    // Stateless checks passed; bind the subject to a live account.
    let credentials = req
        .app_data::<web::Data<CredentialStore>>()
        .ok_or_else(|| AppError::InternalServerError("credential store not configured".into()))?;

    match credentials.find_by_username(&claims.sub).await? {
        Some(user) if user.enabled => Ok(CurrentUser {
            id: user.id,
            username: user.username,
            email: user.email,
        }),
        Some(user) => {
            log::debug!("request rejected: user {} is disabled", user.id);
            Err(AppError::InvalidAccessToken)
        }
        None => {
            log::debug!("request rejected: token subject no longer exists");
            Err(AppError::InvalidAccessToken)
        }
    }
}

impl<S, B> Service<ServiceRequest> for PrincipalResolverService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let http_req = req.request().clone();

            if !is_public(req.path()) {
                match resolve_principal(&req).await {
                    Ok(user) => {
                        req.extensions_mut().insert(user);
                    }
                    Err(err) => {
                        let response = err.error_response_at(http_req.path());
                        return Ok(ServiceResponse::new(http_req, response).map_into_right_body());
                    }
                }
            }

            match service.call(req).await {
                Ok(res) => Ok(res.map_into_left_body()),
                Err(err) => {
                    // Handler errors pass through here, so the whole scope
                    // answers with the same envelope, path included.
                    let response = match err.as_error::<AppError>() {
                        Some(app_err) => app_err.error_response_at(http_req.path()),
                        None => err.as_response_error().error_response(),
                    };
                    Ok(ServiceResponse::new(http_req, response).map_into_right_body())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    #[::core::prelude::v1::test]
    fn test_public_paths() {
        assert!(is_public("/health"));
        assert!(is_public("/api/auth/login"));
        assert!(is_public("/api/auth/register"));
        assert!(is_public("/api/auth/refresh"));
        assert!(is_public("/api/auth/logout"));

        assert!(!is_public("/api/auth/logout-all"));
        assert!(!is_public("/api/auth/me"));
    }

    #[::core::prelude::v1::test]
    fn test_bearer_token_extraction() {
        let req = test::TestRequest::default()
            .append_header(("Authorization", "Bearer abc.def.ghi"))
            .to_srv_request();
        assert_eq!(bearer_token(&req), Some("abc.def.ghi"));

        let req = test::TestRequest::default()
            .append_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_srv_request();
        assert_eq!(bearer_token(&req), None);

        let req = test::TestRequest::default().to_srv_request();
        assert_eq!(bearer_token(&req), None);
    }

    #[actix_rt::test]
    async fn test_missing_token_is_rejected_with_envelope() {
        let app = test::init_service(
            App::new()
                .wrap(PrincipalResolver)
                .route(
                    "/api/auth/me",
                    web::get().to(|| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/auth/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 401);
        assert_eq!(body["message"], "unauthenticated");
        assert_eq!(body["path"], "/api/auth/me");
    }

    #[actix_rt::test]
    async fn test_undecodable_token_is_rejected_statelessly() {
        // Only the codec is registered; no credential store. A garbage
        // token must be rejected before any principal lookup is attempted.
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(TokenCodec::new("middleware-test-secret", 900)))
                .wrap(PrincipalResolver)
                .route(
                    "/api/auth/me",
                    web::get().to(|| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/auth/me")
            .append_header(("Authorization", "Bearer not-a-real-token"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "unauthenticated");
    }

    #[actix_rt::test]
    async fn test_public_path_passes_through() {
        let app = test::init_service(
            App::new()
                .wrap(PrincipalResolver)
                .route(
                    "/api/auth/login",
                    web::post().to(|| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/auth/login").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
