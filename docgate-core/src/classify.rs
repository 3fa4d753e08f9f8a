//! Mapping of raw backend failures into the caller-facing error taxonomy.

use crate::error::{AppError, BackendError, ErrorKind, codes};

/// Backend codes with a known HTTP-style status. Anything else maps to 500.
const STATUS_CODES: [(&str, u16); 13] = [
    (codes::INVALID_ARGUMENT, 400),
    (codes::FAILED_PRECONDITION, 400),
    (codes::OUT_OF_RANGE, 400),
    (codes::UNAUTHENTICATED, 401),
    (codes::PERMISSION_DENIED, 403),
    (codes::NOT_FOUND, 404),
    (codes::ALREADY_EXISTS, 409),
    (codes::ABORTED, 409),
    (codes::RESOURCE_EXHAUSTED, 429),
    (codes::CANCELLED, 499),
    (codes::UNIMPLEMENTED, 501),
    (codes::UNAVAILABLE, 503),
    (codes::DEADLINE_EXCEEDED, 504),
];

/// Returns the status for a backend code, 500 when the code is not in the table.
pub fn status_for_code(code: &str) -> u16 {
    STATUS_CODES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, status)| *status)
        .unwrap_or(500)
}

/// Classifies a backend failure as a repository [`AppError`].
///
/// Never fails: a backend error without a code becomes `UNKNOWN_ERROR` with status 500.
pub fn classify(err: &BackendError) -> AppError {
    let code = err.code().unwrap_or(codes::UNKNOWN_ERROR);

    AppError::new(ErrorKind::Repository, err.to_string(), code).with_status(status_for_code(code))
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        classify(&err)
    }
}
