use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::time::OffsetDateTime;
use serde::{Deserialize, Serialize};

use super::util::date_time_as_unix_seconds;
use crate::data::user::{Identity, User};
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::security::Security;

pub static AUTH_COOKIE_NAME: &str = "auth_token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoleToken {
    #[serde(with = "date_time_as_unix_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    exp: DateTime<Utc>,
    pub user: String,
    pub username: String,
    pub role: Role,
}

impl UserRoleToken {
    pub fn new(user: &User) -> UserRoleToken {
        let now = Utc::now();
        UserRoleToken {
            iat: now,
            exp: now + Duration::weeks(1),
            user: user.user_id.clone(),
            username: user.username.clone(),
            role: user.role,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user.clone(),
            username: self.username.clone(),
            role: self.role,
        }
    }

    pub fn encode_jwt(&self, secret: impl AsRef<[u8]>) -> Result<String, jsonwebtoken::errors::Error> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, &self, &EncodingKey::from_secret(secret.as_ref()))
    }

    pub fn cookie(&self, secret: impl AsRef<[u8]>) -> Result<Cookie<'static>, jsonwebtoken::errors::Error> {
        Ok(Cookie::build((AUTH_COOKIE_NAME, self.encode_jwt(secret)?))
            .secure(true)
            .expires(OffsetDateTime::from_unix_timestamp(self.exp.timestamp()).ok())
            .path("/")
            .http_only(true)
            .build())
    }
}

pub fn auth_problem(detail: impl ToString) -> Problem {
    Problem::new_untyped(Status::Unauthorized, "Unable to authorize user.")
        .detail(detail)
        .clone()
}

pub fn decode_token(token: &str, secret: impl AsRef<[u8]>) -> Result<UserRoleToken, Problem> {
    decode::<UserRoleToken>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(Problem::from)
}

pub fn extract_claims(
    cookies: &CookieJar,
    secret: impl AsRef<[u8]>,
) -> Result<UserRoleToken, Problem> {
    let token = match cookies.get(AUTH_COOKIE_NAME) {
        Some(jwt) => jwt.value().to_owned(),
        None => {
            return Err(auth_problem("No auth token cookie."));
        }
    };
    tracing::debug!("extracted auth token from cookie");

    match decode_token(&token, secret) {
        Ok(it) => {
            tracing::debug!("decoded user roles token for user: {}", it.user);
            Ok(it)
        }
        Err(_) => Err(auth_problem("Auth token cookie was malformed.")),
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserRoleToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let security: &Security = match req.rocket().state() {
            Some(it) => it,
            None => {
                return Outcome::Error((
                    Status::InternalServerError,
                    Problem::new_untyped(Status::InternalServerError, "Security isn't configured."),
                ))
            }
        };

        tracing::trace!("extracting user roles token from request cookies");
        match extract_claims(req.cookies(), &security.token_secret) {
            Ok(claims) => Outcome::Success(claims),
            Err(e) => {
                tracing::debug!("unable to extract claims from cookies");
                Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}

pub mod doc {
    use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

    use super::AUTH_COOKIE_NAME;

    #[derive(Clone, Copy)]
    pub struct CookieAuth;

    impl From<CookieAuth> for SecurityScheme {
        fn from(_: CookieAuth) -> Self {
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(AUTH_COOKIE_NAME)))
        }
    }

    impl utoipa::Modify for CookieAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(c) = openapi.components.as_mut() {
                c.add_security_scheme(AUTH_COOKIE_NAME, *self)
            }
        }
    }
}
