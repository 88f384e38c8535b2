//! Application step.
//!
//! Lets a validated applicant pick one loan option, shows the confirmation
//! figures and drives the payment sub-flow.
//!
//! ```text
//! awaiting_selection ──apply──> awaiting_confirmation ──proceed──> confirming
//!          ^                        |        ^                      |      |
//!          └────────cancel──────────┘        |                      v      v
//!          └────────cancel──────────── payment_failed <──── payment_initiated
//!                                         (retry: proceed)
//! ```

use crate::catalog::{format_ksh, total_repayment, LoanCatalog};
use crate::models::{ApplicantProfile, LoanOption, PaymentAttempt, PaymentStatus};
use crate::navigation::{Entry, Route};
use crate::payment::{InFlightRegistry, PaymentError, PaymentStrategy, TillInstructions};
use crate::session_store::ProfileStore;
use crate::validation::validate;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    AwaitingSelection,
    AwaitingConfirmation,
    Confirming,
    PaymentInitiated,
    PaymentFailed,
}

fn is_valid_transition(from: ApplicationState, to: ApplicationState) -> bool {
    use ApplicationState::*;
    matches!(
        (from, to),
        (AwaitingSelection, AwaitingConfirmation)
            | (AwaitingConfirmation, AwaitingSelection)
            | (AwaitingConfirmation, Confirming)
            | (Confirming, PaymentInitiated)
            | (Confirming, PaymentFailed)
            | (PaymentFailed, Confirming)
            | (PaymentFailed, AwaitingSelection)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// Apply was pressed with nothing selected.
    NoSelection,
    /// The amount is not in the catalog.
    UnknownAmount(u64),
    InvalidTransition {
        from: ApplicationState,
        to: ApplicationState,
    },
    /// Manual verification was requested under the push strategy.
    WrongStrategy,
    /// The session's profile was cleared or replaced by something invalid
    /// since the step was entered.
    ProfileMissing,
    /// No till payment is waiting for the applicant's report.
    NoPendingPayment,
    /// The reported reference is not the one of the pending till payment.
    ReferenceMismatch,
    Payment(PaymentError),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::NoSelection => write!(f, "Please select a loan amount"),
            StepError::UnknownAmount(_) => write!(f, "Please select a valid loan amount"),
            StepError::InvalidTransition { from, to } => {
                write!(f, "Cannot move from {:?} to {:?}", from, to)
            }
            StepError::WrongStrategy => {
                write!(f, "Payment verification is only available for till payments")
            }
            StepError::ProfileMissing => write!(f, "Please check your eligibility first"),
            StepError::NoPendingPayment => write!(f, "No payment is awaiting verification"),
            StepError::ReferenceMismatch => {
                write!(f, "Payment reference does not match the pending payment")
            }
            StepError::Payment(e) => write!(f, "{}", e.user_message()),
        }
    }
}

impl std::error::Error for StepError {}

impl From<PaymentError> for StepError {
    fn from(err: PaymentError) -> Self {
        StepError::Payment(err)
    }
}

/// Figures shown in the confirmation dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub amount: u64,
    pub fee: u64,
    pub total_repayment: u64,
    pub amount_display: String,
    pub fee_display: String,
    pub total_repayment_display: String,
}

impl Confirmation {
    fn for_option(option: LoanOption) -> Self {
        let total = total_repayment(option.amount);
        Self {
            amount: option.amount,
            fee: option.fee,
            total_repayment: total,
            amount_display: format_ksh(option.amount),
            fee_display: format_ksh(option.fee),
            total_repayment_display: format_ksh(total),
        }
    }
}

/// What happened when the applicant proceeded to payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProceedOutcome {
    /// Till instructions are on screen. The attempt stays in the session
    /// until the applicant reports completion with its reference through
    /// [`ApplicationStep::confirm_manual_payment`].
    TillInstructions(TillInstructions),
    /// The gateway acknowledged the push request and the profile was cleared.
    RequestSent {
        reference: String,
        message: String,
        next: Route,
    },
    /// Another payment for this session is still in flight; nothing was sent.
    AlreadyInFlight,
}

pub struct ApplicationStep {
    profile: ApplicantProfile,
    store: ProfileStore,
    catalog: LoanCatalog,
    strategy: PaymentStrategy,
    in_flight: InFlightRegistry,
    state: ApplicationState,
    selection: Option<LoanOption>,
    attempt: Option<PaymentAttempt>,
}

impl ApplicationStep {
    /// Entry guard.
    ///
    /// The stored profile must still pass validation in full; anything
    /// missing, unreadable or invalid sends the applicant back to the
    /// eligibility page.
    pub async fn enter(
        store: ProfileStore,
        strategy: PaymentStrategy,
        in_flight: InFlightRegistry,
    ) -> Entry<Self> {
        let Some(raw) = store.load().await else {
            tracing::info!("No profile for session {}, redirecting", store.session());
            return Entry::Redirect(Route::Eligibility);
        };

        let profile = match validate(&raw) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(
                    "Stored profile for session {} is invalid ({}), redirecting",
                    store.session(),
                    e
                );
                return Entry::Redirect(Route::Eligibility);
            }
        };

        Entry::Ready(Self {
            profile,
            store,
            catalog: LoanCatalog,
            strategy,
            in_flight,
            state: ApplicationState::AwaitingSelection,
            selection: None,
            attempt: None,
        })
    }

    pub fn profile(&self) -> &ApplicantProfile {
        &self.profile
    }

    pub fn state(&self) -> ApplicationState {
        self.state
    }

    pub fn selection(&self) -> Option<LoanOption> {
        self.selection
    }

    /// The current or most recent payment attempt.
    pub fn attempt(&self) -> Option<&PaymentAttempt> {
        self.attempt.as_ref()
    }

    pub fn options(&self) -> &'static [LoanOption] {
        self.catalog.list()
    }

    /// Selects the option with the given principal, replacing any earlier
    /// selection.
    pub fn select(&mut self, amount: u64) -> Result<LoanOption, StepError> {
        if self.state != ApplicationState::AwaitingSelection {
            return Err(StepError::InvalidTransition {
                from: self.state,
                to: ApplicationState::AwaitingSelection,
            });
        }
        let option = self
            .catalog
            .find_by_amount(amount)
            .ok_or(StepError::UnknownAmount(amount))?;
        self.selection = Some(option);
        Ok(option)
    }

    /// Opens the confirmation for the current selection.
    pub fn apply(&mut self) -> Result<Confirmation, StepError> {
        if self.state != ApplicationState::AwaitingSelection {
            return Err(StepError::InvalidTransition {
                from: self.state,
                to: ApplicationState::AwaitingConfirmation,
            });
        }
        let option = self.selection.ok_or(StepError::NoSelection)?;
        self.transition(ApplicationState::AwaitingConfirmation)?;
        Ok(Confirmation::for_option(option))
    }

    /// Dismisses the confirmation. Any pending attempt is discarded; nothing
    /// was persisted for it.
    pub fn cancel(&mut self) -> Result<(), StepError> {
        self.transition(ApplicationState::AwaitingSelection)?;
        self.attempt = None;
        Ok(())
    }

    /// Starts a payment attempt for the selected option.
    ///
    /// Under the push strategy the session's in-flight slot is held for the
    /// duration of the gateway call; a second proceed for the same session
    /// in the meantime returns `AlreadyInFlight` without creating an attempt.
    /// The stored profile is read again before any attempt is created, so a
    /// step opened before another one on the same session completed cannot
    /// pay with stale data.
    ///
    /// A failed call leaves the step in `PaymentFailed`, which stands in for
    /// the rolled-back confirmation state: selection and profile are
    /// untouched and the applicant may retry or cancel.
    pub async fn proceed(&mut self) -> Result<ProceedOutcome, StepError> {
        match self.state {
            ApplicationState::AwaitingConfirmation | ApplicationState::PaymentFailed => {}
            ApplicationState::Confirming => return Ok(ProceedOutcome::AlreadyInFlight),
            from => {
                return Err(StepError::InvalidTransition {
                    from,
                    to: ApplicationState::Confirming,
                })
            }
        }
        let loan = self.selection.ok_or(StepError::NoSelection)?;

        match self.strategy.clone() {
            PaymentStrategy::Manual(till) => {
                self.refresh_profile().await?;
                let attempt = PaymentAttempt::new(&self.profile, loan);
                self.transition(ApplicationState::Confirming)?;
                let instructions = till.instructions_for(&attempt);
                self.store.save_pending_payment(&attempt).await;
                tracing::info!(
                    "Till payment {} of {} opened for session {}",
                    attempt.reference,
                    format_ksh(attempt.amount),
                    self.store.session()
                );
                self.attempt = Some(attempt);
                self.transition(ApplicationState::PaymentInitiated)?;
                Ok(ProceedOutcome::TillInstructions(instructions))
            }
            PaymentStrategy::RemotePush(gateway) => {
                let Some(claim) = self.in_flight.try_claim(self.store.session().as_str()) else {
                    return Ok(ProceedOutcome::AlreadyInFlight);
                };
                self.refresh_profile().await?;

                let mut attempt = PaymentAttempt::new(&self.profile, loan);
                self.transition(ApplicationState::Confirming)?;
                let result = gateway.initiate(&attempt.to_push_request()).await;

                match result {
                    Ok(ack) => {
                        attempt.mark_sent();
                        let reference = attempt.reference.clone();
                        self.attempt = Some(attempt);
                        self.transition(ApplicationState::PaymentInitiated)?;
                        self.store.clear().await;
                        drop(claim);
                        tracing::info!("Push payment {} sent, application complete", reference);
                        Ok(ProceedOutcome::RequestSent {
                            reference,
                            message: ack.message,
                            next: Route::Home,
                        })
                    }
                    Err(e) => {
                        attempt.mark_failed();
                        self.attempt = Some(attempt);
                        self.transition(ApplicationState::PaymentFailed)?;
                        Err(StepError::Payment(e))
                    }
                }
            }
        }
    }

    /// Records the applicant's report that the till payment was made.
    ///
    /// The pending attempt is read back from the session, so this works on a
    /// freshly entered step and always settles the attempt whose
    /// instructions were shown. The payment is not checked against any
    /// settlement record; the attempt is marked sent, the profile is cleared
    /// and the applicant returns home.
    pub async fn confirm_manual_payment(&mut self, reference: &str) -> Result<Route, StepError> {
        if !matches!(self.strategy, PaymentStrategy::Manual(_)) {
            return Err(StepError::WrongStrategy);
        }
        self.refresh_profile().await?;

        let mut attempt = self
            .store
            .load_pending_payment()
            .await
            .filter(|a| a.status == PaymentStatus::Pending)
            .ok_or(StepError::NoPendingPayment)?;
        if attempt.reference != reference {
            tracing::warn!(
                "Till payment report for {} does not match pending {}",
                reference,
                attempt.reference
            );
            return Err(StepError::ReferenceMismatch);
        }

        attempt.mark_sent();
        tracing::info!(
            "Till payment {} reported by applicant, application complete",
            attempt.reference
        );
        self.attempt = Some(attempt);
        self.store.clear().await;
        Ok(Route::Home)
    }

    async fn refresh_profile(&mut self) -> Result<(), StepError> {
        match self.store.load().await.and_then(|raw| validate(&raw).ok()) {
            Some(profile) => {
                self.profile = profile;
                Ok(())
            }
            None => {
                tracing::info!(
                    "Profile for session {} no longer available, payment not started",
                    self.store.session()
                );
                Err(StepError::ProfileMissing)
            }
        }
    }

    fn transition(&mut self, to: ApplicationState) -> Result<(), StepError> {
        if !is_valid_transition(self.state, to) {
            return Err(StepError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::debug!("Application step {:?} -> {:?}", self.state, to);
        self.state = to;
        Ok(())
    }
}
