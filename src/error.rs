use axum::http::StatusCode;

/// Handler error type: a status code plus a message rendered by the client.
pub type ApiError = (StatusCode, String);

/// Error type for transactional handlers: either the database failed or a
/// domain rule refused the request with a concrete status code. The
/// `From<diesel::result::Error>` impl lets `?` inside `conn.transaction`
/// closures roll back on database errors.
pub enum TxError {
    Db(diesel::result::Error),
    Api(ApiError),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        TxError::Db(err)
    }
}

pub fn refuse(err: ApiError) -> TxError {
    TxError::Api(err)
}

pub fn unwrap_tx<T>(res: Result<T, TxError>) -> Result<T, ApiError> {
    res.map_err(|e| match e {
        TxError::Db(err) => internal_error(err),
        TxError::Api(err) => err,
    })
}

/// Surfaces a unique-constraint violation as a 409 so inserts racing past
/// an existence check still refuse duplicates cleanly.
pub fn unique_conflict(err: diesel::result::Error, msg: &str) -> TxError {
    match err {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ) => TxError::Api(conflict(msg)),
        other => TxError::Db(other),
    }
}

pub fn internal_error<E>(err: E) -> ApiError
where
    E: std::error::Error,
{
    tracing::error!("internal error: {err}");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

pub fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.into())
}

pub fn unauthorized(msg: impl Into<String>) -> ApiError {
    (StatusCode::UNAUTHORIZED, msg.into())
}

pub fn forbidden(msg: impl Into<String>) -> ApiError {
    (StatusCode::FORBIDDEN, msg.into())
}

pub fn not_found(msg: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, msg.into())
}

pub fn conflict(msg: impl Into<String>) -> ApiError {
    (StatusCode::CONFLICT, msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorKind, Error};

    #[test]
    fn unique_violation_becomes_conflict() {
        let err = Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key".to_string()),
        );
        match unique_conflict(err, "already exists") {
            TxError::Api((status, msg)) => {
                assert_eq!(status, StatusCode::CONFLICT);
                assert_eq!(msg, "already exists");
            }
            TxError::Db(_) => panic!("unique violation should map to 409"),
        }
    }

    #[test]
    fn other_database_errors_stay_internal() {
        assert!(matches!(
            unique_conflict(Error::NotFound, "already exists"),
            TxError::Db(Error::NotFound)
        ));
    }
}
