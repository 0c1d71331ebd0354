//! Unified error handling for team contacts.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;

/// Error type returned by every team contacts operation.
#[derive(Debug, Error)]
pub enum TeamContactsError {
    /// The team book or a contact does not exist. Callers treat this as
    /// "feature inactive for this tenant", never as fatal.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A write was attempted without sufficient privilege. Terminal; callers
    /// must not retry.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The underlying store failed. Propagated so contact data never
    /// silently degrades.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[source] RepositoryError),

    /// A duplicate team book or self contact was detected. Logged and
    /// self-corrected internally; only surfaces if correction itself fails.
    #[error("Provisioning race: {0}")]
    ProvisioningRace(String),
}

impl From<RepositoryError> for TeamContactsError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // A row removed between check and write, e.g. an update racing a delete.
            RepositoryError::NotFound => Self::NotFound("record no longer exists".to_string()),
            other => Self::BackendUnavailable(other),
        }
    }
}

impl TeamContactsError {
    /// Build an `AccessDenied` error.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied(reason.into())
    }

    /// Build a `NotFound` error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether this error is terminal for the caller (must not be retried).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::AccessDenied(_) | Self::NotFound(_))
    }
}

impl IntoResponse for TeamContactsError {
    fn into_response(self) -> Response {
        if matches!(self, Self::BackendUnavailable(_) | Self::ProvisioningRace(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Team contacts request error"
            );
        }

        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ProvisioningRace(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose store details to clients
        let message = match &self {
            Self::BackendUnavailable(_) => "Contacts backend unavailable".to_string(),
            Self::ProvisioningRace(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TeamContactsError::denied("contact 9 is read-only");
        assert_eq!(err.to_string(), "Access denied: contact 9 is read-only");

        let err = TeamContactsError::from(RepositoryError::Unavailable("offline".to_string()));
        assert_eq!(err.to_string(), "Backend unavailable: store unavailable: offline");
    }

    #[test]
    fn test_vanished_record_is_not_found() {
        let err = TeamContactsError::from(RepositoryError::NotFound);
        assert!(matches!(err, TeamContactsError::NotFound(_)));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_status_codes() {
        fn get_status(err: TeamContactsError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(TeamContactsError::not_found("team book")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(TeamContactsError::denied("test")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(TeamContactsError::BackendUnavailable(
                RepositoryError::Unavailable("down".to_string())
            )),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(TeamContactsError::ProvisioningRace("two books".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_terminal_errors() {
        assert!(TeamContactsError::denied("x").is_terminal());
        assert!(!TeamContactsError::ProvisioningRace("x".to_string()).is_terminal());
    }
}
