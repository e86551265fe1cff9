// libs/billing-cell/src/services/reconciliation.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    BillingError, Invoice, InvoiceStatus, Payment, PaymentMethodEntry, Provider, Receipt,
};

const RECEIPT_CODE_PREFIX: &str = "REC";
const RECEIPT_CODE_LEN: usize = 6;
const RECEIPT_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const RECEIPT_CODE_MAX_ATTEMPTS: usize = 10;

/// Everything a payment batch will write, computed up front so the whole
/// batch can be submitted in one transaction.
#[derive(Debug, Clone)]
pub struct PaymentPlan {
    pub providers: Vec<Provider>,
    pub payments: Vec<Payment>,
    pub receipts: Vec<Receipt>,
    pub new_balance: f64,
    pub new_status: Option<InvoiceStatus>,
}

/// Amounts are kept in whole cents; rounding after every subtraction stops
/// binary-float residue from masking a settled balance.
fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Generate one candidate receipt code: `REC` plus six uppercase
/// alphanumerics.
pub fn generate_receipt_code<R: Rng>(rng: &mut R) -> String {
    let mut code = String::with_capacity(RECEIPT_CODE_PREFIX.len() + RECEIPT_CODE_LEN);
    code.push_str(RECEIPT_CODE_PREFIX);
    for _ in 0..RECEIPT_CODE_LEN {
        let idx = rng.gen_range(0..RECEIPT_CODE_ALPHABET.len());
        code.push(RECEIPT_CODE_ALPHABET[idx] as char);
    }
    code
}

/// Retry up to ten times against the known code set; after that the last
/// candidate is used as-is. With 36^6 combinations the residual collision
/// odds are accepted.
pub fn unique_receipt_code<R: Rng>(existing: &HashSet<String>, rng: &mut R) -> String {
    let mut code = generate_receipt_code(rng);
    for _ in 1..RECEIPT_CODE_MAX_ATTEMPTS {
        if !existing.contains(&code) {
            return code;
        }
        code = generate_receipt_code(rng);
    }
    if existing.contains(&code) {
        warn!("Receipt code still colliding after {} attempts", RECEIPT_CODE_MAX_ATTEMPTS);
    }
    code
}

/// Split a payment batch against the invoice balance.
///
/// Each method yields a Payment row and a Receipt row (plus a Provider row
/// when one is attached). The running balance is decremented per method and
/// floored at zero. Status derivation: `paid` when the balance reaches zero,
/// `part_paid` while something has been paid but a balance remains, and no
/// change at all when the batch is empty.
pub fn plan_payments<R: Rng>(
    invoice: &Invoice,
    methods: &[PaymentMethodEntry],
    existing_codes: &HashSet<String>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<PaymentPlan, BillingError> {
    for entry in methods {
        if entry.amount <= 0.0 {
            return Err(BillingError::ValidationError(
                "Payment amount must be positive".to_string(),
            ));
        }
        if let Some(ref provider) = entry.provider {
            if provider.name.trim().is_empty() {
                return Err(BillingError::ValidationError(
                    "Provider name is required".to_string(),
                ));
            }
        }
    }

    let mut providers = Vec::new();
    let mut payments = Vec::with_capacity(methods.len());
    let mut receipts = Vec::with_capacity(methods.len());
    let mut issued_codes = existing_codes.clone();
    let mut balance = round_cents(invoice.balance);

    for entry in methods {
        let provider_id = entry.provider.as_ref().map(|request| {
            let provider = Provider {
                id: Uuid::new_v4(),
                name: request.name.clone(),
                account_number: request.account_number.clone(),
                created_at: now,
            };
            let id = provider.id;
            providers.push(provider);
            id
        });

        let payment = Payment {
            id: Uuid::new_v4(),
            invoice_id: invoice.id,
            payment_method_id: entry.payment_method_id,
            provider_id,
            amount: entry.amount,
            created_at: now,
        };

        let code = unique_receipt_code(&issued_codes, rng);
        issued_codes.insert(code.clone());

        receipts.push(Receipt {
            id: Uuid::new_v4(),
            invoice_id: invoice.id,
            payment_id: payment.id,
            code,
            amount: entry.amount,
            created_at: now,
        });
        payments.push(payment);

        balance = round_cents((balance - entry.amount).max(0.0));
    }

    // An empty batch leaves the invoice status untouched.
    let new_status = if methods.is_empty() {
        None
    } else if balance == 0.0 {
        Some(InvoiceStatus::Paid)
    } else if balance < invoice.total {
        Some(InvoiceStatus::PartPaid)
    } else {
        None
    };

    Ok(PaymentPlan {
        providers,
        payments,
        receipts,
        new_balance: balance,
        new_status,
    })
}

// ==============================================================================
// RECONCILIATION SERVICE
// ==============================================================================

#[derive(Debug, Deserialize)]
struct ReceiptCodeRow {
    code: String,
}

pub struct PaymentReconciliationService {
    supabase: Arc<SupabaseClient>,
}

impl PaymentReconciliationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn get_invoice(
        &self,
        invoice_id: Uuid,
        auth_token: &str,
    ) -> Result<Invoice, BillingError> {
        debug!("Fetching invoice: {}", invoice_id);

        let path = format!("/rest/v1/invoices?id=eq.{}", invoice_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BillingError::InvoiceNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BillingError::DatabaseError(format!("Failed to parse invoice: {}", e)))
    }

    /// Apply a payment batch to an invoice. The plan is computed in memory
    /// and submitted in one RPC; a failure anywhere rolls back every row.
    pub async fn apply_payments(
        &self,
        invoice_id: Uuid,
        methods: &[PaymentMethodEntry],
        auth_token: &str,
    ) -> Result<Invoice, BillingError> {
        info!("Applying {} payment methods to invoice {}", methods.len(), invoice_id);

        let invoice = self.get_invoice(invoice_id, auth_token).await?;
        let existing_codes = self.load_receipt_codes(auth_token).await?;

        let now = Utc::now();
        let plan = plan_payments(&invoice, methods, &existing_codes, now, &mut rand::thread_rng())?;

        if plan.payments.is_empty() {
            debug!("Empty payment batch for invoice {}, nothing to apply", invoice_id);
            return Ok(invoice);
        }

        let args = json!({
            "invoice_id": invoice_id,
            "providers": plan.providers,
            "payments": plan.payments,
            "receipts": plan.receipts,
            "balance": plan.new_balance,
            "status": plan.new_status.map(|status| status.to_string()),
            "updated_at": now.to_rfc3339()
        });

        let updated: Value = self
            .supabase
            .rpc("apply_invoice_payments", auth_token, args)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        let invoice: Invoice = serde_json::from_value(updated)
            .map_err(|e| BillingError::DatabaseError(format!("Failed to parse invoice: {}", e)))?;

        info!("Invoice {} now {} with balance {}", invoice.id, invoice.status, invoice.balance);
        Ok(invoice)
    }

    async fn load_receipt_codes(&self, auth_token: &str) -> Result<HashSet<String>, BillingError> {
        let rows: Vec<ReceiptCodeRow> = self
            .supabase
            .request(Method::GET, "/rest/v1/receipts?select=code", Some(auth_token), None)
            .await
            .map_err(|e| BillingError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.code).collect())
    }
}
