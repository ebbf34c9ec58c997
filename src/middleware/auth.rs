use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::response::{IntoResponse, Response};
use chrono::Utc;
use http::header::AUTHORIZATION;
use http::{HeaderMap, Request as HttpRequest};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tower::{Layer, Service};
use uuid::Uuid;

use crate::error::AppError;

/// Caller identity injected by the auth middleware into request extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

/// Signs an HS256 token for `identity` that expires after `ttl`.
pub fn issue_token(
    secret: &str,
    identity: &CallerIdentity,
    ttl: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: identity.user_id,
        email: identity.email.clone(),
        is_admin: identity.is_admin,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validates the bearer token in `headers` and returns the caller it names.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<CallerIdentity, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthenticated("authorization header is required".to_string()))?;

    let token = header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty() && !t.contains(' '))
        .ok_or_else(|| {
            AppError::Unauthenticated(
                "authorization header format must be Bearer {token}".to_string(),
            )
        })?;

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        let message = match e.kind() {
            ErrorKind::InvalidSignature => "invalid token signature",
            ErrorKind::ExpiredSignature => "token expired",
            _ => "invalid token",
        };
        AppError::Unauthenticated(message.to_string())
    })?;

    Ok(CallerIdentity {
        user_id: data.claims.sub,
        email: data.claims.email,
        is_admin: data.claims.is_admin,
    })
}

#[derive(Clone)]
pub struct AuthLayer {
    jwt_secret: Arc<str>,
}

impl AuthLayer {
    pub fn new(jwt_secret: impl Into<Arc<str>>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            jwt_secret: self.jwt_secret.clone(),
        }
    }
}

/// Rejects requests without a valid bearer token; otherwise attaches a
/// [`CallerIdentity`] and forwards.
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    jwt_secret: Arc<str>,
}

impl<S, ReqBody> Service<HttpRequest<ReqBody>> for AuthMiddleware<S>
where
    S: Service<HttpRequest<ReqBody>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: HttpRequest<ReqBody>) -> Self::Future {
        let mut inner = self.inner.clone();
        std::mem::swap(&mut self.inner, &mut inner);

        let jwt_secret = self.jwt_secret.clone();

        Box::pin(async move {
            match authenticate(req.headers(), &jwt_secret) {
                Ok(identity) => {
                    req.extensions_mut().insert(identity);
                    inner.call(req).await
                }
                Err(e) => {
                    tracing::debug!("Rejected {} {}: {}", req.method(), req.uri().path(), e);
                    Ok(e.into_response())
                }
            }
        })
    }
}
