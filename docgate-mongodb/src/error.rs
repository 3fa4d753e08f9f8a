//! Translation of driver errors into backend errors.

use mongodb::error::{
    Error, ErrorKind, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT, WriteFailure,
};

use docgate_core::error::{BackendError, codes};

const DUPLICATE_KEY: i32 = 11000;
const WRITE_CONFLICT: i32 = 112;
const UNAUTHORIZED: i32 = 13;
const AUTHENTICATION_FAILED: i32 = 18;
const MAX_TIME_MS_EXPIRED: i32 = 50;

/// Maps a driver error to the backend error carrying the matching code.
///
/// Errors labelled `TransientTransactionError` or `UnknownTransactionCommitResult` are
/// conflicts, so the transaction coordinator retries them.
pub(crate) fn map_error(err: Error) -> BackendError {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR)
        || err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
    {
        return BackendError::Conflict(err.to_string());
    }

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
            already_exists(write.message.clone())
        }
        ErrorKind::Command(command) => match command.code {
            WRITE_CONFLICT => BackendError::Conflict(command.message.clone()),
            DUPLICATE_KEY => already_exists(command.message.clone()),
            UNAUTHORIZED => BackendError::PermissionDenied(command.message.clone()),
            AUTHENTICATION_FAILED => BackendError::Unauthenticated(command.message.clone()),
            MAX_TIME_MS_EXPIRED => BackendError::DeadlineExceeded(command.message.clone()),
            _ => BackendError::Unknown(err.to_string()),
        },
        ErrorKind::Authentication { message, .. } => BackendError::Unauthenticated(message.clone()),
        ErrorKind::ServerSelection { message, .. } => BackendError::Unavailable(message.clone()),
        ErrorKind::Io(io) => BackendError::Unavailable(io.to_string()),
        ErrorKind::InvalidArgument { message, .. } => BackendError::InvalidArgument(message.clone()),
        _ => BackendError::Unknown(err.to_string()),
    }
}

fn already_exists(message: String) -> BackendError {
    BackendError::Other { code: Some(codes::ALREADY_EXISTS.to_string()), message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use mongodb::error::{CommandError, WriteConcernError, WriteError};

    fn command_error(code: i32, message: &str) -> Error {
        let command: CommandError =
            bson::deserialize_from_document(doc! { "code": code, "errmsg": message }).unwrap();

        Error::from(ErrorKind::Command(command))
    }

    #[test]
    fn maps_command_codes() {
        assert!(matches!(map_error(command_error(112, "write conflict")), BackendError::Conflict(_)));
        assert!(matches!(
            map_error(command_error(13, "not authorized")),
            BackendError::PermissionDenied(_)
        ));
        assert!(matches!(
            map_error(command_error(18, "auth failed")),
            BackendError::Unauthenticated(_)
        ));
        assert!(matches!(
            map_error(command_error(50, "time limit")),
            BackendError::DeadlineExceeded(_)
        ));
        assert!(matches!(map_error(command_error(2, "bad value")), BackendError::Unknown(_)));
    }

    #[test]
    fn duplicate_keys_already_exist() {
        let write: WriteError =
            bson::deserialize_from_document(doc! { "code": 11000, "errmsg": "dup key" }).unwrap();
        let err = map_error(Error::from(ErrorKind::Write(WriteFailure::WriteError(write))));

        assert_eq!(err.code(), Some(codes::ALREADY_EXISTS));
        assert_eq!(map_error(command_error(11000, "dup key")).code(), Some(codes::ALREADY_EXISTS));
    }

    #[test]
    fn io_failures_are_unavailable() {
        let err = Error::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset));

        assert!(matches!(map_error(err), BackendError::Unavailable(_)));
    }

    #[test]
    fn transaction_labels_are_conflicts() {
        for label in [TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT] {
            let concern: WriteConcernError = bson::deserialize_from_document(doc! {
                "code": 64,
                "errmsg": "waiting for replication timed out",
                "errorLabels": [label],
            })
            .unwrap();
            let err = Error::from(ErrorKind::Write(WriteFailure::WriteConcernError(concern)));

            assert!(matches!(map_error(err), BackendError::Conflict(_)), "{label}");
        }
    }

    #[test]
    fn custom_errors_are_unknown() {
        assert!(matches!(map_error(Error::custom("boom")), BackendError::Unknown(_)));
    }
}
