//! Conversions from external infrastructure errors into domain errors.

use bookingsync_domain::{FetchError, StoreError};
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub StoreError);

impl From<InfraError> for StoreError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<StoreError> for InfraError {
    fn from(value: StoreError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → StoreError */
/* -------------------------------------------------------------------------- */

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        let store_error = match value {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => StoreError::Unavailable("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        StoreError::Unavailable("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 1555 | 2067) => {
                        StoreError::Query("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        StoreError::Query("foreign key constraint violation".into())
                    }
                    _ => StoreError::Query(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => StoreError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                StoreError::Query(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => StoreError::Query(format!("invalid column type: {ty}")),
            RE::Utf8Error(_) => StoreError::Query("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidQuery => StoreError::Query("invalid SQL query".into()),
            other => StoreError::Query(other.to_string()),
        };

        InfraError(store_error)
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(StoreError::Unavailable(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → FetchError */
/* -------------------------------------------------------------------------- */

/// Map a transport-level reqwest error into the fetch taxonomy.
///
/// HTTP status handling lives in the fetcher itself (a non-success status is
/// not a reqwest error unless `error_for_status` is used); this covers
/// timeouts and connection-level failures.
pub(crate) fn fetch_error_from_reqwest(err: HttpError) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout;
    }

    if err.is_connect() {
        return FetchError::Network(format!("connection failure: {err}"));
    }

    if let Some(status) = err.status() {
        return FetchError::HttpStatus(status.as_u16());
    }

    FetchError::Network(err.to_string())
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
