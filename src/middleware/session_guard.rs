/// Session guard middleware.
///
/// Validates the access token on every protected request and injects the
/// caller's sanitized identity into the request extensions. Accepts the token
/// from the `Authorization: Bearer` header or the `accessToken` cookie.
/// Performs no store mutation.
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use sqlx::PgPool;
use std::rc::Rc;

use crate::auth::verify_access_token;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::users::store;
use crate::users::UserView;

pub struct SessionGuard {
    jwt_config: JwtSettings,
}

impl SessionGuard {
    pub fn new(jwt_config: JwtSettings) -> Self {
        Self { jwt_config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(SessionGuardService {
            service: Rc::new(service),
            jwt_config: self.jwt_config.clone(),
        }))
    }
}

pub struct SessionGuardService<S> {
    service: Rc<S>,
    jwt_config: JwtSettings,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

impl<S, B> Service<ServiceRequest> for SessionGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let jwt_config = self.jwt_config.clone();
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let token = bearer_token(&req)
                .or_else(|| req.cookie("accessToken").map(|c| c.value().to_string()));

            let token = match token {
                Some(token) => token,
                None => {
                    tracing::warn!("protected request without access token");
                    return Err(AppError::Auth(AuthError::MissingToken).into());
                }
            };

            let claims = verify_access_token(&token, &jwt_config)?;

            let pool = req
                .app_data::<web::Data<PgPool>>()
                .cloned()
                .ok_or_else(|| {
                    AppError::Internal("database pool missing from app data".to_string())
                })?;

            // The subject must still resolve to a credential record.
            let user = store::find_by_id(&pool, claims.user_id()?)
                .await?
                .ok_or(AppError::Auth(AuthError::InvalidAccessToken))?;

            tracing::debug!(user_id = %user.id, username = %user.username, "session validated");

            req.extensions_mut().insert(UserView::from(&user));
            service.call(req).await
        })
    }
}
