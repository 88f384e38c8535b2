/// Payment sub-flow building blocks
///
/// A payment attempt collects the processing fee of one selected loan
/// option. How it is collected depends on the configured strategy:
/// - Manual: the applicant pays a merchant till themselves and reports back
/// - RemotePush: a push request is sent to the payment gateway
use crate::catalog::format_ksh;
use crate::config::{Config, PaymentMode};
use crate::gateway_client::StkPushClient;
use crate::models::{ApplicantProfile, LoanOption, PaymentAttempt, PaymentStatus};
use crate::validation::normalize_phone;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Shown for any transport failure; details go to the logs only.
pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error. Please check your connection and try again.";

/// Shown when the gateway rejects a request without giving a reason.
pub const REJECTED_FALLBACK_MESSAGE: &str = "Payment request failed. Please try again.";

/// Why a payment request did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Gateway unreachable, timed out, or answered with an unreadable body.
    Transport(String),
    /// Gateway explicitly refused the request.
    Rejected(String),
}

impl PaymentError {
    /// Message surfaced to the applicant.
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::Transport(_) => NETWORK_ERROR_MESSAGE,
            PaymentError::Rejected(reason) => reason,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, PaymentError::Transport(_))
    }
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentError::Transport(detail) => write!(f, "Payment gateway unreachable: {}", detail),
            PaymentError::Rejected(reason) => write!(f, "Payment rejected: {}", reason),
        }
    }
}

impl std::error::Error for PaymentError {}

impl PaymentAttempt {
    /// Creates a pending attempt for the selected option.
    ///
    /// The amount is the option's fee and the phone is normalized for the
    /// gateway; the option itself is copied so later catalog changes do not
    /// affect an attempt in progress.
    pub fn new(profile: &ApplicantProfile, loan: LoanOption) -> Self {
        let created_at = Utc::now();
        Self {
            reference: generate_reference(profile, created_at),
            phone: normalize_phone(&profile.phone_number),
            amount: loan.fee,
            loan,
            customer_name: profile.name.clone(),
            status: PaymentStatus::Pending,
            created_at,
        }
    }

    /// pending -> sent. Returns false if the attempt was not pending.
    pub fn mark_sent(&mut self) -> bool {
        self.settle(PaymentStatus::Sent)
    }

    /// pending -> failed. Returns false if the attempt was not pending.
    pub fn mark_failed(&mut self) -> bool {
        self.settle(PaymentStatus::Failed)
    }

    fn settle(&mut self, status: PaymentStatus) -> bool {
        if self.status != PaymentStatus::Pending {
            tracing::warn!(
                "Ignoring {:?} for payment {} already {:?}",
                status,
                self.reference,
                self.status
            );
            return false;
        }
        self.status = status;
        true
    }

    /// Body sent to the push gateway.
    pub fn to_push_request(&self) -> PushRequest {
        PushRequest {
            phone: self.phone.clone(),
            amount: self.amount,
            customer_name: self.customer_name.clone(),
            reference: self.reference.clone(),
        }
    }
}

/// `LN<yyyymmddHHMMSS><8 hex>`; the hash mixes applicant, clock and a nonce.
fn generate_reference(profile: &ApplicantProfile, now: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(profile.id_number.as_bytes());
    hasher.update(profile.phone_number.as_bytes());
    hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!(
        "LN{}{}",
        now.format("%Y%m%d%H%M%S"),
        digest[..8].to_uppercase()
    )
}

// ============ Remote push ============

/// JSON body of a payment-initiation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushRequest {
    pub phone: String,
    pub amount: u64,
    pub customer_name: String,
    pub reference: String,
}

/// Gateway acknowledgment of a push request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushAcknowledgement {
    /// Message to show the applicant.
    pub message: String,
    /// Gateway-side request id, when the gateway returns one.
    pub checkout_request_id: Option<String>,
}

/// Anything that can initiate a push payment.
///
/// The acknowledgment is treated as success. A gateway that confirms
/// settlement before answering can be plugged in behind this same trait.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn initiate(&self, request: &PushRequest) -> Result<PushAcknowledgement, PaymentError>;
}

// ============ Manual till ============

/// Merchant till the applicant pays into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TillDetails {
    pub till_number: String,
    pub merchant_name: String,
}

/// Step-by-step instructions for paying one attempt at the till.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TillInstructions {
    pub reference: String,
    pub merchant_name: String,
    pub till_number: String,
    pub amount: u64,
    pub amount_display: String,
    pub steps: Vec<String>,
}

impl TillDetails {
    pub fn instructions_for(&self, attempt: &PaymentAttempt) -> TillInstructions {
        let amount_display = format_ksh(attempt.amount);
        TillInstructions {
            reference: attempt.reference.clone(),
            merchant_name: self.merchant_name.clone(),
            till_number: self.till_number.clone(),
            amount: attempt.amount,
            steps: vec![
                "Go to M-Pesa on your phone".to_string(),
                "Select Lipa na M-Pesa → Buy Goods & Services".to_string(),
                format!(
                    "Till Number: {} – {}",
                    self.merchant_name, self.till_number
                ),
                format!("Enter Amount: {}", amount_display),
                "Enter your M-Pesa PIN to complete payment".to_string(),
            ],
            amount_display,
        }
    }
}

// ============ Strategy ============

/// How the processing fee is collected.
#[derive(Clone)]
pub enum PaymentStrategy {
    Manual(TillDetails),
    RemotePush(Arc<dyn PushGateway>),
}

impl PaymentStrategy {
    /// Builds the strategy selected in configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        match &config.payment_mode {
            PaymentMode::Manual {
                till_number,
                merchant_name,
            } => Ok(PaymentStrategy::Manual(TillDetails {
                till_number: till_number.clone(),
                merchant_name: merchant_name.clone(),
            })),
            PaymentMode::RemotePush { endpoint, timeout } => {
                let client = StkPushClient::new(endpoint.to_string(), *timeout)?;
                Ok(PaymentStrategy::RemotePush(Arc::new(client)))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PaymentStrategy::Manual(_) => "manual",
            PaymentStrategy::RemotePush(_) => "remote_push",
        }
    }
}

impl fmt::Debug for PaymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStrategy::Manual(till) => f.debug_tuple("Manual").field(till).finish(),
            PaymentStrategy::RemotePush(_) => f.write_str("RemotePush"),
        }
    }
}

// ============ In-flight tracking ============

/// Tracks which sessions currently have a push request in flight.
///
/// Claims expire on their own after the TTL so a crashed request can never
/// lock a session out for good.
#[derive(Clone)]
pub struct InFlightRegistry {
    claims: moka::sync::Cache<String, String>,
}

impl InFlightRegistry {
    /// `ttl` should exceed the gateway timeout.
    pub fn new(ttl: Duration) -> Self {
        Self {
            claims: moka::sync::Cache::builder()
                .time_to_live(ttl)
                .max_capacity(10_000)
                .build(),
        }
    }

    /// Claims the session's payment slot. Returns `None` if another attempt
    /// already holds it.
    pub fn try_claim(&self, session: &str) -> Option<InFlightClaim> {
        let entry = self
            .claims
            .entry(session.to_string())
            .or_insert(Utc::now().to_rfc3339());

        if entry.is_fresh() {
            Some(InFlightClaim {
                claims: self.claims.clone(),
                session: session.to_string(),
            })
        } else {
            tracing::warn!(
                "Payment already in flight for session {} (since {})",
                session,
                entry.into_value()
            );
            None
        }
    }

    pub fn is_in_flight(&self, session: &str) -> bool {
        self.claims.contains_key(session)
    }
}

/// Releases the session's in-flight slot when dropped.
pub struct InFlightClaim {
    claims: moka::sync::Cache<String, String>,
    session: String,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.claims.invalidate(&self.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoanType;

    fn profile() -> ApplicantProfile {
        ApplicantProfile {
            name: "Jane Doe".to_string(),
            phone_number: "0712345678".to_string(),
            id_number: "12345678".to_string(),
            loan_type: LoanType::Business,
        }
    }

    #[test]
    fn test_attempt_charges_fee_to_normalized_phone() {
        let attempt = PaymentAttempt::new(&profile(), LoanOption { amount: 21_200, fee: 270 });
        assert_eq!(attempt.amount, 270);
        assert_eq!(attempt.phone, "254712345678");
        assert_eq!(attempt.loan.amount, 21_200);
        assert_eq!(attempt.status, PaymentStatus::Pending);
    }

    #[test]
    fn test_references_are_unique() {
        let option = LoanOption { amount: 5_500, fee: 100 };
        let a = PaymentAttempt::new(&profile(), option);
        let b = PaymentAttempt::new(&profile(), option);
        assert_ne!(a.reference, b.reference);
        assert!(a.reference.starts_with("LN"));
        assert_eq!(a.reference.len(), 2 + 14 + 8);
    }

    #[test]
    fn test_status_only_leaves_pending_once() {
        let mut attempt = PaymentAttempt::new(&profile(), LoanOption { amount: 5_500, fee: 100 });
        assert!(attempt.mark_failed());
        assert!(!attempt.mark_sent());
        assert_eq!(attempt.status, PaymentStatus::Failed);
    }

    #[test]
    fn test_till_instructions() {
        let till = TillDetails {
            till_number: "4019420".to_string(),
            merchant_name: "Inuka Ventures".to_string(),
        };
        let attempt = PaymentAttempt::new(&profile(), LoanOption { amount: 44_200, fee: 1_010 });
        let instructions = till.instructions_for(&attempt);

        assert_eq!(instructions.amount, 1_010);
        assert_eq!(instructions.amount_display, "Ksh 1,010");
        assert_eq!(instructions.steps.len(), 5);
        assert_eq!(instructions.steps[2], "Till Number: Inuka Ventures – 4019420");
    }

    #[test]
    fn test_in_flight_claim_is_exclusive_until_dropped() {
        let registry = InFlightRegistry::new(Duration::from_secs(60));

        let claim = registry.try_claim("s1").unwrap();
        assert!(registry.is_in_flight("s1"));
        assert!(registry.try_claim("s1").is_none());
        assert!(registry.try_claim("s2").is_some());

        drop(claim);
        assert!(!registry.is_in_flight("s1"));
        assert!(registry.try_claim("s1").is_some());
    }

    #[test]
    fn test_user_messages() {
        let transport = PaymentError::Transport("connection refused".to_string());
        assert_eq!(transport.user_message(), NETWORK_ERROR_MESSAGE);
        assert!(transport.is_transport());

        let rejected = PaymentError::Rejected("Invalid phone number".to_string());
        assert_eq!(rejected.user_message(), "Invalid phone number");
    }
}
