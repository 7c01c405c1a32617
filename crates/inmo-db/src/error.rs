use inmo_core::AppError;

/// SQLite result codes for SQLITE_BUSY / SQLITE_LOCKED and their extended variants.
const LOCK_CODES: &[&str] = &["5", "6", "261", "262", "517", "773"];

/// Map a sqlx error, separating lock contention from other failures.
pub(crate) fn map_db_err(e: sqlx::Error) -> AppError {
    if is_lock_error(&e) {
        AppError::DatabaseLocked(e.to_string())
    } else if matches!(e, sqlx::Error::RowNotFound) {
        AppError::NotFound(e.to_string())
    } else {
        AppError::DatabaseError(e.to_string())
    }
}

fn is_lock_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            let by_code = db
                .code()
                .is_some_and(|code| LOCK_CODES.contains(&code.as_ref()));
            by_code || is_lock_message(db.message())
        }
        _ => false,
    }
}

fn is_lock_message(message: &str) -> bool {
    message.contains("database is locked") || message.contains("database table is locked")
}
