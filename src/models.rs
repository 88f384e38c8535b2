use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============ Applicant Models ============

/// Purpose of the requested loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanType {
    Business,
    Personal,
    Education,
    Medical,
    Emergency,
}

impl LoanType {
    /// All loan types in the order they are offered on the form.
    pub const ALL: [LoanType; 5] = [
        LoanType::Business,
        LoanType::Personal,
        LoanType::Education,
        LoanType::Medical,
        LoanType::Emergency,
    ];

    /// Wire value, as stored in the session document.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanType::Business => "business",
            LoanType::Personal => "personal",
            LoanType::Education => "education",
            LoanType::Medical => "medical",
            LoanType::Emergency => "emergency",
        }
    }

    /// Human-readable label shown in the loan type picker.
    pub fn label(&self) -> &'static str {
        match self {
            LoanType::Business => "Business Loan",
            LoanType::Personal => "Personal Loan",
            LoanType::Education => "Education Loan",
            LoanType::Medical => "Medical Loan",
            LoanType::Emergency => "Emergency Loan",
        }
    }

    /// Parses a wire value. Matching is exact (lowercase).
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for LoanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully validated applicant.
///
/// Only the validation engine constructs this type, so holding one means
/// every field already passed its rule. This is also the exact shape of the
/// JSON document persisted in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    /// Full name, trimmed.
    pub name: String,
    /// Phone number as entered (trimmed, not normalized).
    pub phone_number: String,
    /// National ID number.
    pub id_number: String,
    /// Purpose of the loan.
    pub loan_type: LoanType,
}

/// Loosely-typed profile: form input, pre-fill data, or a session document
/// read back from storage. Nothing here has been validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProfile {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub id_number: Option<String>,
    pub loan_type: Option<String>,
}

impl From<&ApplicantProfile> for RawProfile {
    fn from(profile: &ApplicantProfile) -> Self {
        Self {
            name: Some(profile.name.clone()),
            phone_number: Some(profile.phone_number.clone()),
            id_number: Some(profile.id_number.clone()),
            loan_type: Some(profile.loan_type.as_str().to_string()),
        }
    }
}

// ============ Loan Models ============

/// One row of the loan catalog: a principal and its processing fee (Ksh).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanOption {
    /// Principal disbursed to the applicant.
    pub amount: u64,
    /// Processing fee paid before disbursement.
    pub fee: u64,
}

// ============ Payment Models ============

/// Lifecycle of a single payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Sent,
    Failed,
}

/// A request to collect the processing fee for one selected loan option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    /// Unique per-attempt reference sent to the gateway.
    pub reference: String,
    /// Normalized destination phone (digits only, `254` prefixed).
    pub phone: String,
    /// Amount to collect: the selected option's fee, never the principal.
    pub amount: u64,
    /// The selected option, copied at confirmation time.
    pub loan: LoanOption,
    /// Applicant name forwarded to the gateway.
    pub customer_name: String,
    /// Current status.
    pub status: PaymentStatus,
    /// When the attempt was created.
    pub created_at: DateTime<Utc>,
}

// ============ API Request/Response Models ============

/// Loan type entry for the eligibility form picker.
#[derive(Debug, Serialize)]
pub struct LoanTypeChoice {
    pub value: &'static str,
    pub label: &'static str,
}

/// Response for `GET /api/v1/eligibility`.
#[derive(Debug, Serialize)]
pub struct EligibilityFormResponse {
    /// Pre-filled values from a previous submission in this session.
    pub form: RawProfile,
    /// Available loan types.
    pub loan_types: Vec<LoanTypeChoice>,
    /// Amount range advertised on the form, e.g. "Ksh 5,500 – 60,600".
    pub amount_range: String,
}

/// Catalog row with display strings for the selection grid.
#[derive(Debug, Serialize)]
pub struct LoanOptionView {
    pub amount: u64,
    pub fee: u64,
    pub amount_display: String,
    pub fee_display: String,
}

/// Response for `GET /api/v1/application`.
#[derive(Debug, Serialize)]
pub struct ApplicationPageResponse {
    /// Name used in the greeting.
    pub customer_name: String,
    /// Catalog in display order.
    pub options: Vec<LoanOptionView>,
    /// Configured payment strategy ("manual" or "remote_push").
    pub payment_strategy: &'static str,
}

/// Body for the confirm and payment endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LoanSelectionRequest {
    /// Principal of the selected option. Absent means nothing was selected.
    #[serde(default)]
    pub amount: Option<u64>,
}

/// Body for the verify endpoint: the reference of the till payment shown.
#[derive(Debug, Default, Deserialize)]
pub struct PaymentVerificationRequest {
    #[serde(default)]
    pub reference: String,
}

/// Response carrying the next route the presentation layer navigates to.
#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub message: String,
    pub next: String,
}
