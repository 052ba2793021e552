//! Caller identity from the upstream authentication layer
//!
//! Sessions are terminated in front of this service, which forwards the
//! verified user as `x-user-id` and `x-user-role`.

use crate::error::ApiError;
use delivery_model::{Principal, RequestMeta, Role, UserId};
use std::net::SocketAddr;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Build the principal from forwarded identity headers
///
/// # Errors
/// [`ApiError::Authentication`] if either header is missing or malformed
pub fn principal(user_id: Option<&str>, role: Option<&str>) -> Result<Principal, ApiError> {
    let (Some(user_id), Some(role)) = (user_id, role) else {
        return Err(ApiError::Authentication("authentication required".into()));
    };
    let user_id: UserId = user_id
        .trim()
        .parse()
        .map_err(|_| ApiError::Authentication(format!("invalid {USER_ID_HEADER} header")))?;
    let role: Role = role
        .trim()
        .parse()
        .map_err(|_| ApiError::Authentication(format!("invalid {USER_ROLE_HEADER} header")))?;
    Ok(Principal::new(user_id, role))
}

/// Client address and agent for audit evidence
///
/// The first `x-forwarded-for` hop wins over the socket address.
#[must_use]
pub fn request_meta(
    forwarded_for: Option<&str>,
    remote: Option<SocketAddr>,
    user_agent: Option<String>,
) -> RequestMeta {
    let ip = forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(ToString::to_string)
        .or_else(|| remote.map(|addr| addr.ip().to_string()));
    RequestMeta::new(ip, user_agent)
}
