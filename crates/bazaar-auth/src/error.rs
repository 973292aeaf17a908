use thiserror::Error;

/// Failure kinds of the access-control core. The HTTP layer maps these to
/// status codes; `Unauthorized` deliberately carries no detail, so an
/// expired token and a malformed one look identical to callers.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
