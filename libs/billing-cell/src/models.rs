// libs/billing-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE BILLING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub company_id: Uuid,
    pub location_id: Uuid,
    pub customer_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub total: f64,
    pub balance: f64,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    New,
    PartPaid,
    Paid,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::New => write!(f, "new"),
            InvoiceStatus::PartPaid => write!(f, "part_paid"),
            InvoiceStatus::Paid => write!(f, "paid"),
        }
    }
}

/// External payment channel (card terminal, bank, voucher issuer) attached
/// to a payment at reconciliation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub account_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub payment_method_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

/// Proof-of-payment row. The code is the customer-facing identifier and is
/// expected to be unique across the company's receipts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub payment_id: Uuid,
    pub code: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub name: String,
    pub account_number: Option<String>,
}

/// One payment method's contribution toward the invoice balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodEntry {
    pub payment_method_id: Uuid,
    pub amount: f64,
    pub provider: Option<ProviderRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyPaymentsRequest {
    pub payment_methods: Vec<PaymentMethodEntry>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BillingError {
    #[error("Invoice not found")]
    InvoiceNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
