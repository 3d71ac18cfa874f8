use axum::{extract::FromRequestParts, http::request::Parts};

use bakery_common::{Actor, Role};

use crate::error::ApiError;

/// Role set by the upstream auth layer.
pub const ROLE_HEADER: &str = "x-bakery-role";
/// Optional display name of the signed-in user.
pub const USER_HEADER: &str = "x-bakery-user";

/// The staff member behind a request. Rejected with 401 when the role header
/// is missing or names no known role.
#[derive(Debug, Clone)]
pub struct StaffSession {
    pub role: Role,
    pub actor: Actor,
}

impl<S: Send + Sync> FromRequestParts<S> for StaffSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role: Role = header(parts, ROLE_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing role"))?
            .parse()
            .map_err(|_| ApiError::unauthorized("unknown role"))?;

        let actor = match header(parts, USER_HEADER) {
            Some(name) => Actor::named(role, name),
            None => Actor::user(role),
        };
        Ok(Self { role, actor })
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
