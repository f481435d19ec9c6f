use sqlx::error::DatabaseError;

use crate::application::repos::RepoError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const QUERY_CANCELED: &str = "57014";

/// Translate a driver error into the repository vocabulary.
///
/// A foreign-key violation on an analytics write means the post or category was
/// deleted underneath it; callers such as the counter flusher rely on that
/// surfacing as [`RepoError::InvalidInput`].
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => map_database_error(&*db),
        other => RepoError::from_persistence(other),
    }
}

fn map_database_error(db: &dyn DatabaseError) -> RepoError {
    let message = db.message().to_string();
    match db.code().as_deref() {
        Some(UNIQUE_VIOLATION) => RepoError::Duplicate {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        Some(FOREIGN_KEY_VIOLATION | INVALID_TEXT_REPRESENTATION) => {
            RepoError::InvalidInput { message }
        }
        Some(CHECK_VIOLATION | NOT_NULL_VIOLATION) => RepoError::Integrity { message },
        Some(QUERY_CANCELED) => RepoError::Timeout,
        _ => RepoError::Persistence(message),
    }
}
