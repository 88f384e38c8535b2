use crate::application::{ApplicationStep, Confirmation, ProceedOutcome};
use crate::catalog::{format_ksh, LoanCatalog};
use crate::config::Config;
use crate::eligibility::EligibilityStep;
use crate::errors::AppError;
use crate::models::*;
use crate::navigation::Entry;
use crate::payment::{InFlightRegistry, PaymentStrategy};
use crate::session_store::{ProfileStore, SessionId, SessionStorage};
use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "loan_session";

/// Largest accepted request body.
pub const BODY_LIMIT_BYTES: usize = 64 * 1024;

const ELIGIBILITY_REQUIRED_MESSAGE: &str = "Please check your eligibility first";
const ALREADY_IN_FLIGHT_MESSAGE: &str = "A payment request is already in progress";

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Session-scoped key-value storage holding applicant profiles.
    pub sessions: Arc<dyn SessionStorage>,
    /// How processing fees are collected.
    pub strategy: PaymentStrategy,
    /// Sessions with a push request currently in flight.
    pub in_flight: InFlightRegistry,
}

impl AppState {
    fn profile_store(&self, session: SessionId) -> ProfileStore {
        ProfileStore::new(self.sessions.clone(), session)
    }

    async fn application_step(&self, session: SessionId) -> Result<ApplicationStep, AppError> {
        let entry = ApplicationStep::enter(
            self.profile_store(session),
            self.strategy.clone(),
            self.in_flight.clone(),
        )
        .await;

        match entry {
            Entry::Ready(step) => Ok(step),
            Entry::Redirect(redirect) => Err(AppError::Precondition {
                message: ELIGIBILITY_REQUIRED_MESSAGE.to_string(),
                redirect,
            }),
        }
    }

    /// Rebuilds the step up to the confirmation dialog for the requested
    /// amount.
    async fn confirmed_step(
        &self,
        session: SessionId,
        selection: LoanSelectionRequest,
    ) -> Result<(ApplicationStep, Confirmation), AppError> {
        let mut step = self.application_step(session).await?;
        if let Some(amount) = selection.amount {
            step.select(amount)?;
        }
        let confirmation = step.apply()?;
        Ok((step, confirmation))
    }
}

/// Routes served under `/api/v1`, wrapped in the session middleware.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/eligibility", get(get_eligibility).post(submit_eligibility))
        .route("/api/v1/application", get(get_application))
        .route("/api/v1/application/confirm", post(confirm_selection))
        .route("/api/v1/application/payment", post(start_payment))
        .route("/api/v1/application/payment/verify", post(verify_payment))
        .layer(middleware::from_fn(session_middleware))
}

/// Health check plus the API with its body limit; rate limiting and
/// documentation routes are added by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api_routes().layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES)))
        .with_state(state)
}

/// Resolves the caller's session from the `loan_session` cookie, minting a
/// new one when it is absent.
///
/// The cookie carries no expiry, so it lives as long as the browser session.
pub async fn session_middleware(mut request: Request, next: Next) -> Response {
    let (session, issued) = match session_from_headers(request.headers()) {
        Some(session) => (session, false),
        None => (SessionId::generate(), true),
    };
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    if issued {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, session
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
                tracing::debug!("Issued session {}", session);
            }
            Err(e) => tracing::error!("Failed to encode session cookie: {}", e),
        }
    }

    response
}

fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && is_valid_session_value(value))
        .map(|(_, value)| SessionId::from(value))
}

fn is_valid_session_value(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 64
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Health check endpoint.
///
/// Returns the service status, version and active payment strategy.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-loan-funnel",
            "version": env!("CARGO_PKG_VERSION"),
            "payment_strategy": state.strategy.name(),
        })),
    )
}

/// GET /api/v1/eligibility
///
/// Returns the eligibility form, pre-filled with whatever this session
/// saved before, together with the loan type choices.
pub async fn get_eligibility(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
) -> Json<EligibilityFormResponse> {
    let step =
        EligibilityStep::enter(state.profile_store(session), state.config.eligibility_check_delay)
            .await;

    Json(EligibilityFormResponse {
        form: step.form().clone(),
        loan_types: LoanType::ALL
            .iter()
            .map(|t| LoanTypeChoice {
                value: t.as_str(),
                label: t.label(),
            })
            .collect(),
        amount_range: LoanCatalog.amount_range_display(),
    })
}

/// POST /api/v1/eligibility
///
/// Validates and saves the submitted profile. Answers with the next route,
/// or with the first violated rule.
pub async fn submit_eligibility(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    Json(form): Json<RawProfile>,
) -> Result<Json<NavigationResponse>, AppError> {
    let mut step =
        EligibilityStep::enter(state.profile_store(session), state.config.eligibility_check_delay)
            .await;
    step.edit(form)?;
    let next = step.submit().await?;

    Ok(Json(NavigationResponse {
        message: "Congratulations! You qualify for a loan.".to_string(),
        next: next.path().to_string(),
    }))
}

/// GET /api/v1/application
///
/// Loan options for a session with a valid saved profile. Sessions without
/// one get a 409 pointing back at the eligibility page.
pub async fn get_application(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<ApplicationPageResponse>, AppError> {
    let step = state.application_step(session).await?;

    let options = step
        .options()
        .iter()
        .map(|option| LoanOptionView {
            amount: option.amount,
            fee: option.fee,
            amount_display: format_ksh(option.amount),
            fee_display: format_ksh(option.fee),
        })
        .collect();

    Ok(Json(ApplicationPageResponse {
        customer_name: step.profile().name.clone(),
        options,
        payment_strategy: state.strategy.name(),
    }))
}

/// POST /api/v1/application/confirm
pub async fn confirm_selection(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    Json(selection): Json<LoanSelectionRequest>,
) -> Result<Json<Confirmation>, AppError> {
    let (_, confirmation) = state.confirmed_step(session, selection).await?;
    Ok(Json(confirmation))
}

/// POST /api/v1/application/payment
///
/// Starts collecting the processing fee of the selected option. Returns
/// till instructions under the manual strategy, or the gateway's
/// acknowledgment under remote push.
pub async fn start_payment(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    Json(selection): Json<LoanSelectionRequest>,
) -> Result<Json<ProceedOutcome>, AppError> {
    let (mut step, confirmation) = state.confirmed_step(session, selection).await?;
    tracing::info!(
        "Payment requested for {} ({} fee) via {}",
        confirmation.amount_display,
        confirmation.fee_display,
        state.strategy.name()
    );

    match step.proceed().await? {
        ProceedOutcome::AlreadyInFlight => {
            Err(AppError::Conflict(ALREADY_IN_FLIGHT_MESSAGE.to_string()))
        }
        outcome => Ok(Json(outcome)),
    }
}

/// POST /api/v1/application/payment/verify
///
/// The applicant reports having paid at the till, quoting the reference from
/// the instructions. Only meaningful under the manual strategy.
pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    Json(request): Json<PaymentVerificationRequest>,
) -> Result<Json<NavigationResponse>, AppError> {
    let mut step = state.application_step(session).await?;
    let next = step.confirm_manual_payment(&request.reference).await?;

    Ok(Json(NavigationResponse {
        message: "Payment submitted for verification".to_string(),
        next: next.path().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_session_cookie_is_found_among_others() {
        let session = session_from_headers(&headers("theme=dark; loan_session=abc-123; lang=sw"));
        assert_eq!(session, Some(SessionId::from("abc-123")));
    }

    #[test]
    fn test_malformed_session_cookie_is_ignored() {
        assert_eq!(session_from_headers(&headers("loan_session=")), None);
        assert_eq!(session_from_headers(&headers("loan_session=a:b")), None);
        assert_eq!(session_from_headers(&HeaderMap::new()), None);
    }
}
