pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

// SQLite signals a RESTRICT parent delete with extended code 1811
// (SQLITE_CONSTRAINT_TRIGGER), which sqlx does not classify as a
// foreign key violation; only the insert-side code 787 is.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(e) => {
            matches!(e.kind(), sqlx::error::ErrorKind::ForeignKeyViolation)
                || e.code().as_deref() == Some("1811")
        }
        _ => false,
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e)
        if matches!(e.kind(), sqlx::error::ErrorKind::UniqueViolation))
}
