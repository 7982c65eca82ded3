//! Caller identity from access tokens.
//!
//! Tokens are HS256 JWTs with `sub` = user id and `type` = "access".
//! Desktop GIS clients cannot always set headers, so the token is
//! accepted from the `access_token` query parameter as well as the
//! Authorization header. A missing or invalid token resolves to an
//! anonymous caller, not an error; the route decides whether identity
//! is required.

use crate::error::Result;
use crate::state::AppState;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, DecodingKey, Validation};
use meridian_core::GisError;
use serde::Deserialize;
use uuid::Uuid;

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "type")]
    token_type: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Extract the raw token from header or query parameter.
fn bearer_token<'a>(headers: &'a HeaderMap, query_token: Option<&'a str>) -> Option<&'a str> {
    if let Some(value) = headers.get("authorization") {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token);
            }
        }
    }
    query_token.filter(|t| !t.is_empty())
}

/// Resolve the current user, if any.
pub async fn current_user(
    state: &AppState,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<Option<CurrentUser>> {
    let Some(token) = bearer_token(headers, query_token) else {
        return Ok(None);
    };

    let key = DecodingKey::from_secret(state.config.jwt_secret.as_bytes());
    let claims = match decode::<Claims>(token, &key, &Validation::default()) {
        Ok(data) => data.claims,
        Err(e) => {
            tracing::debug!(error = %e, "access token rejected");
            return Ok(None);
        }
    };
    if claims.token_type != "access" {
        return Ok(None);
    }
    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        return Ok(None);
    };

    let is_admin: Option<bool> = sqlx::query_scalar("SELECT is_admin FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(GisError::from)?;

    Ok(is_admin.map(|is_admin| CurrentUser {
        id: user_id,
        is_admin,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_takes_precedence_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers, Some("xyz")), Some("abc"));
        assert_eq!(bearer_token(&HeaderMap::new(), Some("xyz")), Some("xyz"));
        assert_eq!(bearer_token(&HeaderMap::new(), Some("")), None);
        assert_eq!(bearer_token(&HeaderMap::new(), None), None);
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic dXNlcg==".parse().unwrap());
        assert_eq!(bearer_token(&headers, None), None);
    }
}
