//! Library-level error type
//!
//! Failures below the HTTP layer land here: database access, filesystem
//! work under the root folder, config parsing, and lookups that come up
//! empty (a project id nobody owns, a blob key with no file behind it).
//! The API crate wraps this type and decides which status code each
//! variant deserves.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file parse or validation failure. Deliberately loud: a
    /// malformed file aborts startup instead of silently running on
    /// defaults.
    #[error("configuration error: {0}")]
    Config(String),

    /// A lookup that found nothing, carrying what was looked for
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller-supplied value rejected before it reaches the database or
    /// the filesystem (bad storage keys, unparseable fields)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}
