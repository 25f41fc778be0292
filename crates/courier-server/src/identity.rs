//! Caller identity extraction.
//!
//! Session issuance lives in an external collaborator; the credential that
//! reaches this service is an opaque bearer token that resolves to the
//! caller's user id. Here that resolution is direct: the token carries the
//! id itself.

use crate::error::ApiError;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use courier_protocol::UserId;
use uuid::Uuid;

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub UserId);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;
        let user = Uuid::parse_str(token.trim()).map_err(|_| ApiError::Unauthorized)?;

        Ok(Identity(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(value: Option<&str>) -> Result<Identity, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = value {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Identity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_bearer_uuid_resolves() {
        let user = Uuid::new_v4();
        let identity = extract(Some(&format!("Bearer {user}"))).await.unwrap();
        assert_eq!(identity.0, user);
    }

    #[tokio::test]
    async fn test_missing_or_malformed_is_unauthorized() {
        assert!(matches!(extract(None).await, Err(ApiError::Unauthorized)));
        assert!(matches!(
            extract(Some("Bearer not-a-uuid")).await,
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            extract(Some("Basic abc")).await,
            Err(ApiError::Unauthorized)
        ));
    }
}
