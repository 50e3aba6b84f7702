//! Caller identity extraction
//!
//! The gateway in front of this service authenticates users and forwards the
//! result as headers:
//! - `x-user-id`: user UUID (required)
//! - `x-user-role`: STUDENT, FACULTY, HOD or ADMIN (required)
//! - `x-department-id`: department UUID (optional, scopes HOD views)
//!
//! Missing or malformed identity headers are rejected with 401.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Actor, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const DEPARTMENT_HEADER: &str = "x-department-id";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map(str::trim)
                .map_err(|_| ApiError::Unauthorized(format!("Header {} is not valid text", name)))
        })
        .transpose()
}

fn parse_uuid_header(headers: &HeaderMap, name: &str) -> Result<Option<Uuid>, ApiError> {
    header(headers, name)?
        .map(|raw| {
            Uuid::parse_str(raw)
                .map_err(|_| ApiError::Unauthorized(format!("Header {} is not a valid id", name)))
        })
        .transpose()
}

/// Build the actor from identity headers
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = parse_uuid_header(headers, USER_ID_HEADER)?
        .ok_or_else(|| ApiError::Unauthorized("Missing user identity".into()))?;

    let role_raw = header(headers, USER_ROLE_HEADER)?
        .ok_or_else(|| ApiError::Unauthorized("Missing user role".into()))?;
    let role = Role::parse(role_raw)
        .ok_or_else(|| ApiError::Unauthorized(format!("Unknown role '{}'", role_raw)))?;

    let mut actor = Actor::new(user_id, role);
    if let Some(department_id) = parse_uuid_header(headers, DEPARTMENT_HEADER)? {
        actor = actor.with_department(department_id);
    }
    Ok(actor)
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_valid_headers() {
        let id = Uuid::new_v4();
        let dept = Uuid::new_v4();
        let actor = actor_from_headers(&headers(&[
            (USER_ID_HEADER, &id.to_string()),
            (USER_ROLE_HEADER, "hod"),
            (DEPARTMENT_HEADER, &dept.to_string()),
        ]))
        .unwrap();
        assert_eq!(actor.user_id, id);
        assert_eq!(actor.role, Role::Hod);
        assert_eq!(actor.department_id, Some(dept));
    }

    #[test]
    fn test_missing_or_bad_headers_rejected() {
        assert!(matches!(
            actor_from_headers(&headers(&[(USER_ROLE_HEADER, "ADMIN")])),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            actor_from_headers(&headers(&[(USER_ID_HEADER, "not-a-uuid"), (USER_ROLE_HEADER, "ADMIN")])),
            Err(ApiError::Unauthorized(_))
        ));
        let id = Uuid::new_v4().to_string();
        assert!(matches!(
            actor_from_headers(&headers(&[(USER_ID_HEADER, &id), (USER_ROLE_HEADER, "DEAN")])),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
