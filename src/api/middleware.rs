use crate::error::AppError;
use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, Request, request::Parts},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the caller identity, set out of band by the trusted auth
/// layer in front of this service.
pub const IDENTITY_HEADER: &str = "x-user";

/// Caller identity resolved from the trusted header. Absence or an empty
/// value is always a 401, never anonymous access.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(IDENTITY_HEADER).ok_or(AppError::Unauthenticated)?;
        let user = header.to_str().map_err(|_| AppError::Unauthenticated)?.trim();
        if user.is_empty() {
            return Err(AppError::Unauthenticated);
        }
        Ok(Self(user.to_string()))
    }
}

/// Generates a request id when the caller did not supply one.
#[derive(Clone, Copy, Debug)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string()).ok().map(RequestId::new)
    }
}
