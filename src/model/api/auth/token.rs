use std::marker::PhantomData;
use std::sync::Arc;

use jsonwebtoken::{DecodingKey, Validation};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AuthFailure, Error, ErrorBody, Result};
use crate::model::{common::user::UserRole, mongodb::Id};
use crate::store::{Store, UserDirectory};

use super::rights::Rights;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// Identity token claims, as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The user's ID, as hex.
    pub sub: String,
    pub role: UserRole,
    /// Expiry, in seconds since the epoch.
    pub exp: i64,
}

impl Claims {
    /// Verify and decode a signed token.
    pub fn decode(token: &str, config: &Config) -> Result<Self> {
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }
}

/// An authenticated caller, holding at least the rights `R`.
///
/// The token's subject must exist in the user directory and be active; the
/// directory's role, not the token's, decides the caller's rights.
pub struct AuthToken<R> {
    pub id: Id,
    pub role: UserRole,
    phantom: PhantomData<R>,
}

/// Find the raw token, preferring the `Authorization` header.
fn raw_token<'r>(req: &'r Request<'_>) -> Option<&'r str> {
    if let Some(header) = req.headers().get_one("Authorization") {
        return header.strip_prefix("Bearer ").map(str::trim);
    }
    req.cookies().get(AUTH_TOKEN_COOKIE).map(|c| c.value())
}

async fn authenticate<R: Rights>(req: &Request<'_>) -> Result<(Id, UserRole)> {
    let config = req
        .rocket()
        .state::<Config>()
        .ok_or_else(|| Error::Unauthorized("authentication is not configured".to_string()))?;
    let store = req
        .rocket()
        .state::<Arc<dyn Store>>()
        .ok_or_else(|| Error::Unauthorized("user directory is unavailable".to_string()))?;

    let token =
        raw_token(req).ok_or_else(|| Error::Unauthorized("missing identity token".to_string()))?;
    let claims = Claims::decode(token, config)?;
    let id: Id = claims
        .sub
        .parse()
        .map_err(|_| Error::Unauthorized("malformed token subject".to_string()))?;

    let user = store
        .begin()
        .await?
        .find_user(id)
        .await?
        .ok_or_else(|| Error::Unauthorized(format!("unknown user {id}")))?;
    if !user.is_active {
        return Err(Error::UserInactive(id));
    }
    if !R::permits(user.role) {
        return Err(Error::Forbidden(format!("{} rights required", R::NAME)));
    }
    Ok((id, user.role))
}

#[rocket::async_trait]
impl<'r, R> FromRequest<'r> for AuthToken<R>
where
    R: Rights + Send,
{
    type Error = Error;

    /// Verify the caller's token and check they hold the rights `R`.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match authenticate::<R>(req).await {
            Ok((id, role)) => Outcome::Success(Self {
                id,
                role,
                phantom: PhantomData,
            }),
            Err(e) => {
                let status = match e {
                    Error::UserInactive(_) => Status::Forbidden,
                    Error::Jwt(_) => Status::Unauthorized,
                    ref other => other.status(),
                };
                debug!("Rejected caller: {e}");
                // Catchers cannot see guard errors, so leave the body for them.
                req.local_cache(|| AuthFailure(Some(ErrorBody::from(&e))));
                Outcome::Error((status, e))
            }
        }
    }
}
