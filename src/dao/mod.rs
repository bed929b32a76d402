pub mod donors;
pub mod neighborhoods;
pub mod statistics;

use std::borrow::Cow;

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Handles database errors from writes and maps them to application errors.
 *
 * # Arguments
 * `error`: The error returned by sqlx.
 * `conflict_message`: Message used when a unique constraint is violated.
 * `missing_parent_message`: Message used when a foreign key is violated.
 *
 * # Returns
 * An `ApplicationError` corresponding to the database error.
 */
pub fn handle_database_error(error: &sqlx::Error, conflict_message: &str, missing_parent_message: &str) -> ApplicationError {
    if let Some(db_error) = error.as_database_error() {
        tracing::debug!("Database error: {}", db_error);
        tracing::info!("Add error: {:?}", db_error.code());
        if db_error.code() == Some(Cow::Borrowed("23505")) {
            // Unique violation
            return ApplicationError::new(ErrorType::Conflict, conflict_message.to_string());
        } else if db_error.code() == Some(Cow::Borrowed("23503")) {
            // Foreign key violation
            return ApplicationError::new(ErrorType::Validation, missing_parent_message.to_string());
        } else if db_error.code() == Some(Cow::Borrowed("22001")) {
            // Value too long
            return ApplicationError::new(ErrorType::Validation, "Value too long".to_string());
        } else if db_error.code() == Some(Cow::Borrowed("23514")) {
            // Check violation
            return ApplicationError::new(ErrorType::Validation, "Value not allowed".to_string());
        }
        tracing::error!("Unhandled database error: {}", db_error);
        return ApplicationError::new(ErrorType::DatabaseError, "Unhandled database error".to_string());
    }
    tracing::error!("Failed to execute database operation: {}", error);
    ApplicationError::new(ErrorType::DatabaseError, "Failed to execute database operation".to_string())
}

/**
 * Maps a read failure to an internal error, keeping the cause in the log only.
 */
pub fn query_error(context: &str, error: &sqlx::Error) -> ApplicationError {
    tracing::error!("Failed to execute query to {}: {}", context, error);
    ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to {context}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_non_database_error_is_internal() {
        let error = handle_database_error(&sqlx::Error::RowNotFound, "exists", "missing");
        assert_eq!(error.error_type, ErrorType::DatabaseError);
    }

    #[test]
    fn test_query_error_hides_cause() {
        let error = query_error("count donors", &sqlx::Error::PoolTimedOut);
        assert_eq!(error.error_type, ErrorType::DatabaseError);
        assert_eq!(error.message, "Failed to execute query to count donors");
    }
}
