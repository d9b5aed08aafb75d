//! Error taxonomy shared by every service.

use thiserror::Error;

use crate::types::PageRequest;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{} not found with id: {}", what, id))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// True for a UNIQUE or PRIMARY KEY violation raised by SQLite.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Storage(rusqlite::Error::SqliteFailure(failure, _)) => matches!(
                failure.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ),
            _ => false,
        }
    }

    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Validation(_) => 400,
            AppError::Conflict(_) => 409,
            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::Storage(_) | AppError::Serialization(_) | AppError::Internal(_) => 500,
        }
    }

    /// Message safe to return to callers. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Storage(_) | AppError::Serialization(_) | AppError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Turns a lost insert race into the same `Conflict` the pre-check reports.
pub trait UniqueConflict<T> {
    fn or_conflict(self, message: impl Into<String>) -> Result<T>;
}

impl<T> UniqueConflict<T> for Result<T> {
    fn or_conflict(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            if e.is_unique_violation() {
                AppError::Conflict(message.into())
            } else {
                e
            }
        })
    }
}

/// Offset for `req`, or `Validation` when the page is out of range.
pub fn page_offset(req: &PageRequest) -> Result<usize> {
    req.offset()
        .ok_or_else(|| AppError::validation(format!("Page number is too large: {}", req.page)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::not_found("Scholarship", 4).status_code(), 404);
        assert_eq!(AppError::validation("bad").status_code(), 400);
        assert_eq!(AppError::Conflict("dup".into()).status_code(), 409);
        assert_eq!(AppError::Unauthorized("no".into()).status_code(), 401);
        assert_eq!(AppError::Forbidden("no".into()).status_code(), 403);
        assert_eq!(AppError::Internal("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_unique_violation_becomes_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (email TEXT UNIQUE); INSERT INTO t VALUES ('a@b.lk');")
            .unwrap();
        let insert: Result<usize> = conn
            .execute("INSERT INTO t VALUES ('a@b.lk')", [])
            .map_err(AppError::from);
        let err = insert.or_conflict("Email is already registered").unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "Email is already registered"));

        let other: Result<()> = Err(AppError::Internal("boom".into()));
        assert!(matches!(other.or_conflict("dup"), Err(AppError::Internal(_))));
    }

    #[test]
    fn test_page_offset_out_of_range() {
        assert_eq!(page_offset(&PageRequest::new(2, 20)).unwrap(), 40);
        let err = page_offset(&PageRequest::new(usize::MAX / 2, 10)).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("disk on fire".into());
        assert_eq!(err.public_message(), "An internal error occurred");
        let err = AppError::not_found("Tag", 9);
        assert_eq!(err.public_message(), "Tag not found with id: 9");
    }
}
