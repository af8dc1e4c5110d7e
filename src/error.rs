use std::fmt::Display;

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{debug, error};
use mongodb::bson::de::Error as BsonError;
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Bson(#[from] BsonError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    /// The referenced election, position, candidate, ... is absent or soft-deleted.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The voting window is closed.
    #[error("Not ongoing: {0}")]
    NotOngoing(String),
    /// The voter already has a ballot for this election.
    #[error("Already voted: {0}")]
    AlreadyVoted(String),
    /// The caller lacks voter or commissioner standing.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Duplicate slug/acronym/email, or a lost race against a concurrent write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] about the given thing.
    pub fn not_found(what: impl Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Bson(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::NotFound(_) => Status::NotFound,
            Self::NotOngoing(_) => Status::Forbidden,
            Self::AlreadyVoted(_) | Self::Conflict(_) => Status::Conflict,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::BadRequest(_) => Status::BadRequest,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.class().is_server_error() {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        Err(status)
    }
}
