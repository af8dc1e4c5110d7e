use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, TokenData, Validation};
use mongodb::bson::doc;
use rocket::{
    http::{Cookie, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    common::lifecycle::only_active,
    db::{commissioner::Commissioner, voter::Voter},
    mongodb::{Coll, Id},
};

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with specific rights.
///
/// Tokens are issued by the identity provider; this service only verifies them.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    pub id: Id,
    pub email: String,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that it has the correct rights for this user
    /// type.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        // Forward to any routes that do not require an authentication token.
        let cookie = try_outcome!(req.cookies().get(AUTH_TOKEN_COOKIE).or_forward(()));

        // Decode the token.
        let token: Self = try_outcome!(Self::from_cookie(cookie, config).or_forward(()));

        // Check it represents the correct rights.
        if !token.permits(U::RIGHTS) {
            return Outcome::Forward(());
        }

        // Check the user actually exists. Voters are registered per election, so
        // any active registration under this email will do; the election itself
        // is checked by the route.
        let db = req.guard::<&State<mongodb::Database>>().await.unwrap();
        let found = match token.rights {
            Rights::Voter => Coll::<Voter>::from_db(db)
                .find_one(only_active(doc! { "email": &token.email }), None)
                .await
                .map(|voter| voter.is_some()),
            Rights::Commissioner => Coll::<Commissioner>::from_db(db)
                .find_one(token.id.as_doc(), None)
                .await
                .map(|commissioner| commissioner.is_some()),
        };
        match found {
            Ok(true) => Outcome::Success(token),
            Ok(false) => Outcome::Forward(()),
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::db::commissioner::CommissionerCore;

    #[test]
    fn cookie_round_trip() {
        let config = Config::example();
        let commissioner = Commissioner {
            id: Id::new(),
            commissioner: CommissionerCore::example(),
        };

        let cookie = AuthToken::new(&commissioner).into_cookie(&config);
        assert!(cookie.http_only().unwrap_or(false));

        let token = AuthToken::<Commissioner>::from_cookie(&cookie, &config).unwrap();
        assert_eq!(token.id, commissioner.id);
        assert_eq!(token.email, commissioner.email);
        assert!(token.permits(Rights::Commissioner));
        assert!(!token.permits(Rights::Voter));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = Config::example();
        let commissioner = Commissioner {
            id: Id::new(),
            commissioner: CommissionerCore::example(),
        };
        let cookie = AuthToken::new(&commissioner).into_cookie(&config);

        let other = Config::example_with_secret("a different secret");
        assert!(AuthToken::<Commissioner>::from_cookie(&cookie, &other).is_err());
    }
}
