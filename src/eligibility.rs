//! Eligibility step.
//!
//! Collects the applicant profile, validates it and persists it for the
//! application step. States:
//!
//! ```text
//! editing ──submit──> submitting ──> advanced
//!    ^  \                               |
//!    |   └─submit (invalid)──> rejected  |
//!    └──────── edit ───────────┴─────────┘
//! ```

use crate::models::RawProfile;
use crate::navigation::Route;
use crate::session_store::ProfileStore;
use crate::validation::{validate, ValidationError};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EligibilityState {
    /// Form open for input.
    Editing,
    /// Profile persisted; the eligibility check is running.
    Submitting,
    /// Done; the applicant moves on to the application page.
    Advanced,
    /// Last submission failed validation.
    Rejected(ValidationError),
}

fn is_valid_transition(from: &EligibilityState, to: &EligibilityState) -> bool {
    use EligibilityState::*;
    matches!(
        (from, to),
        (Editing, Submitting)
            | (Editing, Rejected(_))
            | (Rejected(_), Editing)
            | (Rejected(_), Submitting)
            | (Rejected(_), Rejected(_))
            | (Submitting, Advanced)
            | (Advanced, Editing)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EligibilityError {
    /// The form failed validation; carries the first violated rule.
    Invalid(ValidationError),
    InvalidTransition {
        from: EligibilityState,
        to: EligibilityState,
    },
}

impl fmt::Display for EligibilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EligibilityError::Invalid(e) => write!(f, "{}", e),
            EligibilityError::InvalidTransition { from, to } => {
                write!(f, "Cannot move from {:?} to {:?}", from, to)
            }
        }
    }
}

impl std::error::Error for EligibilityError {}

impl From<ValidationError> for EligibilityError {
    fn from(err: ValidationError) -> Self {
        EligibilityError::Invalid(err)
    }
}

pub struct EligibilityStep {
    store: ProfileStore,
    check_delay: Duration,
    form: RawProfile,
    state: EligibilityState,
}

impl EligibilityStep {
    /// Opens the form, pre-filled from a profile saved earlier in this
    /// session so back-navigation keeps what was typed.
    pub async fn enter(store: ProfileStore, check_delay: Duration) -> Self {
        let form = store.load().await.unwrap_or_default();
        Self {
            store,
            check_delay,
            form,
            state: EligibilityState::Editing,
        }
    }

    pub fn form(&self) -> &RawProfile {
        &self.form
    }

    pub fn state(&self) -> &EligibilityState {
        &self.state
    }

    /// Replaces the form contents and reopens the form for editing.
    ///
    /// Fails only while a submission is running.
    pub fn edit(&mut self, form: RawProfile) -> Result<(), EligibilityError> {
        if self.state != EligibilityState::Editing {
            self.transition(EligibilityState::Editing)?;
        }
        self.form = form;
        Ok(())
    }

    /// Validates and persists the form.
    ///
    /// Every call validates, including a resubmission after the step has
    /// advanced. On failure nothing is persisted and the first violated rule
    /// is returned.
    pub async fn submit(&mut self) -> Result<Route, EligibilityError> {
        if self.state == EligibilityState::Advanced {
            self.transition(EligibilityState::Editing)?;
        }

        let profile = match validate(&self.form) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::debug!("Eligibility form rejected: {}", e);
                self.transition(EligibilityState::Rejected(e.clone()))?;
                return Err(EligibilityError::Invalid(e));
            }
        };

        self.transition(EligibilityState::Submitting)?;
        self.store.save(&profile).await;

        if !self.check_delay.is_zero() {
            tokio::time::sleep(self.check_delay).await;
        }

        self.transition(EligibilityState::Advanced)?;
        tracing::info!(
            "Applicant eligible for {} loan (session {})",
            profile.loan_type,
            self.store.session()
        );
        Ok(Route::Application)
    }

    fn transition(&mut self, to: EligibilityState) -> Result<(), EligibilityError> {
        if !is_valid_transition(&self.state, &to) {
            return Err(EligibilityError::InvalidTransition {
                from: self.state.clone(),
                to,
            });
        }
        tracing::debug!("Eligibility step {:?} -> {:?}", self.state, to);
        self.state = to;
        Ok(())
    }
}
