use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use crate::domain_model::CursorError;
use crate::domain_port::StoreError;
use crate::logger::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let failure = if let Some(failure) = err.find::<ApiFailure>() {
        failure.clone()
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiFailure::new(ApiErrorCode::InvalidInput, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        ApiFailure::new(ApiErrorCode::InvalidInput, e.to_string())
    } else if err.is_not_found() || err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiFailure::bare(ApiErrorCode::NotFound)
    } else {
        ApiFailure::internal(format!("Unhandled rejection: {:?}", err))
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(failure.code, failure.message));
    Ok(warp::reply::with_status(json, failure.code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Sign-in required")]
    Unauthenticated,
    #[error("Not allowed")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    #[error("Conflict")]
    Conflict,
    #[error("Too many requests")]
    RateLimited,
    #[error("A dependency is unavailable")]
    UpstreamDependencyFailure,
    #[error("Invalid input")]
    InvalidInput,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials | ApiErrorCode::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::Conflict => StatusCode::CONFLICT,
            ApiErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::UpstreamDependencyFailure => StatusCode::BAD_GATEWAY,
            ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A rejection carrying an error code and a client-facing message.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ApiFailure {
    pub code: ApiErrorCode,
    pub message: String,
}

impl reject::Reject for ApiFailure {}

impl ApiFailure {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiFailure {
            code,
            message: message.into(),
        }
    }

    pub fn bare(code: ApiErrorCode) -> Self {
        ApiFailure::new(code, code.to_string())
    }

    /// Logs the detail and hides it from the client.
    pub fn internal<E: std::fmt::Display>(error: E) -> Self {
        error!("Internal error: {}", error);
        ApiFailure::bare(ApiErrorCode::InternalError)
    }
}

impl From<StoreError> for ApiFailure {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable(e) => {
                warn!("store unavailable: {}", e);
                ApiFailure::bare(ApiErrorCode::UpstreamDependencyFailure)
            }
            StoreError::Duplicate(e) => ApiFailure::new(ApiErrorCode::Conflict, e),
            StoreError::Store(e) => ApiFailure::internal(e),
        }
    }
}

impl From<AuthError> for ApiFailure {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiFailure::bare(ApiErrorCode::InvalidCredentials),
            AuthError::Unauthenticated | AuthError::TokenInvalid | AuthError::TokenExpired => {
                ApiFailure::bare(ApiErrorCode::Unauthenticated)
            }
            AuthError::Store(e) => e.into(),
            AuthError::InternalError(e) => ApiFailure::internal(e),
        }
    }
}

impl From<VerificationError> for ApiFailure {
    fn from(error: VerificationError) -> Self {
        match error {
            VerificationError::InvalidInput(m) => ApiFailure::new(ApiErrorCode::InvalidInput, m),
            VerificationError::Conflict(m) => ApiFailure::new(ApiErrorCode::Conflict, m),
            VerificationError::NotFound => {
                ApiFailure::new(ApiErrorCode::NotFound, error.to_string())
            }
            VerificationError::Unauthenticated => ApiFailure::bare(ApiErrorCode::Unauthenticated),
            VerificationError::Forbidden => {
                ApiFailure::new(ApiErrorCode::Forbidden, error.to_string())
            }
            VerificationError::InvalidCredentials => {
                ApiFailure::bare(ApiErrorCode::InvalidCredentials)
            }
            VerificationError::RateLimited => ApiFailure::bare(ApiErrorCode::RateLimited),
            VerificationError::Upstream(e) => {
                warn!("mail delivery failed: {}", e);
                ApiFailure::bare(ApiErrorCode::UpstreamDependencyFailure)
            }
            VerificationError::Store(e) => e.into(),
            VerificationError::InternalError(e) => ApiFailure::internal(e),
        }
    }
}

impl From<MediaError> for ApiFailure {
    fn from(error: MediaError) -> Self {
        match error {
            MediaError::Forbidden(_) | MediaError::ForeignSource(_) => {
                ApiFailure::new(ApiErrorCode::Forbidden, error.to_string())
            }
            MediaError::NotFound(_) => ApiFailure::new(ApiErrorCode::NotFound, error.to_string()),
            MediaError::Store(e) => e.into(),
        }
    }
}

impl From<AccountError> for ApiFailure {
    fn from(error: AccountError) -> Self {
        match error {
            AccountError::InvalidInput(m) => ApiFailure::new(ApiErrorCode::InvalidInput, m),
            AccountError::InvalidCredentials => ApiFailure::bare(ApiErrorCode::InvalidCredentials),
            AccountError::Forbidden => ApiFailure::bare(ApiErrorCode::Forbidden),
            AccountError::NotFound => ApiFailure::new(ApiErrorCode::NotFound, error.to_string()),
            AccountError::Conflict(m) => ApiFailure::new(ApiErrorCode::Conflict, m),
            AccountError::Verification(e) => e.into(),
            AccountError::Media(e) => e.into(),
            AccountError::Store(e) => e.into(),
            AccountError::InternalError(e) => ApiFailure::internal(e),
        }
    }
}

impl From<ContentError> for ApiFailure {
    fn from(error: ContentError) -> Self {
        match error {
            ContentError::NotFound => ApiFailure::bare(ApiErrorCode::NotFound),
            ContentError::Forbidden => ApiFailure::bare(ApiErrorCode::Forbidden),
            ContentError::Conflict(m) => ApiFailure::new(ApiErrorCode::Conflict, m),
            ContentError::InvalidInput(m) => ApiFailure::new(ApiErrorCode::InvalidInput, m),
            ContentError::Media(e) => e.into(),
            ContentError::Store(e) => e.into(),
        }
    }
}

impl From<CursorError> for ApiFailure {
    fn from(error: CursorError) -> Self {
        ApiFailure::new(ApiErrorCode::InvalidInput, error.to_string())
    }
}
