//! Request Extractors

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::LedgerError;

/// Header carrying the identity an upstream gateway authenticated
pub const OWNER_HEADER: &str = "x-account-owner";

/// The authenticated account owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedOwner(pub String);

impl<S> FromRequestParts<S> for AuthenticatedOwner
where
    S: Send + Sync,
{
    type Rejection = LedgerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
            .map(|owner| Self(owner.to_owned()))
            .ok_or(LedgerError::Unauthenticated)
    }
}
