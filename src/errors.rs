use crate::application::StepError;
use crate::eligibility::EligibilityError;
use crate::navigation::Route;
use crate::payment::PaymentError;
use crate::validation::ValidationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
///
/// Every variant renders as exactly one `{"error": ...}` message.
#[derive(Debug, Clone)]
pub enum AppError {
    /// User-correctable input problem.
    Validation(ValidationError),
    /// Required state from an earlier step is missing; the client must
    /// navigate to `redirect`.
    Precondition { message: String, redirect: Route },
    /// Payment gateway unreachable or unreadable.
    Transport(String),
    /// Payment gateway refused the request; carries the reason to show.
    Application(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Action conflicts with work already in progress.
    Conflict(String),
    /// Internal server error.
    InternalError(String),
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "Validation error: {}", e),
            AppError::Precondition { message, redirect } => {
                write!(f, "Precondition failed: {} (redirect to {})", message, redirect)
            }
            AppError::Transport(msg) => write!(f, "Payment transport error: {}", msg),
            AppError::Application(msg) => write!(f, "Payment rejected: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Validation failures are the applicant's to fix and are not logged as faults.
    fn into_response(self) -> Response {
        let (status, error_message, redirect) = match &self {
            AppError::Validation(e) => {
                tracing::debug!("Validation rejected: {}", e);
                (StatusCode::UNPROCESSABLE_ENTITY, e.message.to_string(), None)
            }
            AppError::Precondition { message, redirect } => {
                tracing::info!("Precondition failed, redirecting to {}: {}", redirect, message);
                (StatusCode::CONFLICT, message.clone(), Some(*redirect))
            }
            AppError::Transport(msg) => {
                tracing::error!("Payment transport error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    crate::payment::NETWORK_ERROR_MESSAGE.to_string(),
                    None,
                )
            }
            AppError::Application(msg) => {
                tracing::warn!("Payment rejected by gateway: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone(), None)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), None),
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = match redirect {
            Some(route) => json!({ "error": error_message, "redirect": route }),
            None => json!({ "error": error_message }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Transport(detail) => AppError::Transport(detail),
            PaymentError::Rejected(reason) => AppError::Application(reason),
        }
    }
}

impl From<StepError> for AppError {
    fn from(err: StepError) -> Self {
        match err {
            StepError::NoSelection | StepError::UnknownAmount(_) => {
                AppError::BadRequest(err.to_string())
            }
            StepError::InvalidTransition { .. } | StepError::NoPendingPayment => {
                AppError::Conflict(err.to_string())
            }
            StepError::WrongStrategy | StepError::ReferenceMismatch => {
                AppError::BadRequest(err.to_string())
            }
            StepError::ProfileMissing => AppError::Precondition {
                message: err.to_string(),
                redirect: Route::Eligibility,
            },
            StepError::Payment(e) => e.into(),
        }
    }
}

impl From<EligibilityError> for AppError {
    fn from(err: EligibilityError) -> Self {
        match err {
            EligibilityError::Invalid(e) => AppError::Validation(e),
            EligibilityError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_precondition_carries_redirect() {
        let response = AppError::Precondition {
            message: "Please check your eligibility first".to_string(),
            redirect: Route::Eligibility,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["redirect"], "/eligibility");
        assert_eq!(body["error"], "Please check your eligibility first");
    }

    #[tokio::test]
    async fn test_transport_detail_is_not_leaked() {
        let response = AppError::Transport("dns error: pay.internal".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"], crate::payment::NETWORK_ERROR_MESSAGE);
    }

    #[test]
    fn test_missing_profile_during_payment_redirects() {
        let err: AppError = StepError::ProfileMissing.into();
        assert!(matches!(
            err,
            AppError::Precondition { redirect: Route::Eligibility, .. }
        ));
    }

    #[test]
    fn test_payment_error_mapping() {
        let err: AppError = PaymentError::Rejected("Invalid amount".to_string()).into();
        assert!(matches!(err, AppError::Application(ref m) if m == "Invalid amount"));
    }
}
