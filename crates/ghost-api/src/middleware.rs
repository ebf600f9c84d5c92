use axum::{
    extract::{FromRequestParts, Path, Request},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use ghost_rooms::RoomError;
use ghost_types::models::RoomId;

use crate::error::ApiError;

/// Participant token taken from `Authorization: Bearer <token>`, if any.
#[derive(Debug, Clone, Copy)]
pub struct ParticipantToken(pub Option<Uuid>);

impl ParticipantToken {
    pub fn required(self) -> Result<Uuid, ApiError> {
        self.0
            .ok_or_else(|| ApiError::InvalidToken("missing participant token".into()))
    }
}

/// Parse the bearer token, if present, into a [`ParticipantToken`] extension.
/// A header that is present but malformed is rejected outright.
pub async fn participant_token(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    req.extensions_mut().insert(ParticipantToken(token));
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<Uuid>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::InvalidToken("expected a bearer token".into()))?;
    token
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ApiError::InvalidToken("participant token is not a valid id".into()))
}

/// Room id from the path. An id that cannot name a room is simply not found.
#[derive(Debug, Clone, Copy)]
pub struct RoomPath(pub RoomId);

impl<S: Send + Sync> FromRequestParts<S> for RoomPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Room(RoomError::NotFound))?;
        raw.parse()
            .map(RoomPath)
            .map_err(|_| ApiError::Room(RoomError::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn absent_header_is_no_token() {
        assert!(bearer_token(&HeaderMap::new()).unwrap().is_none());
    }

    #[test]
    fn valid_bearer_token() {
        let token = Uuid::new_v4();
        let parsed = bearer_token(&headers(&format!("Bearer {token}"))).unwrap();
        assert_eq!(parsed, Some(token));
    }

    #[test]
    fn malformed_headers_rejected() {
        for value in ["Basic abc", "Bearer not-a-uuid", "Bearer"] {
            assert!(matches!(
                bearer_token(&headers(value)),
                Err(ApiError::InvalidToken(_))
            ));
        }
    }
}
