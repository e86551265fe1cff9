// libs/billing-cell/tests/reconciliation_test.rs

use std::collections::HashSet;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use billing_cell::models::{
    BillingError, Invoice, InvoiceStatus, PaymentMethodEntry, ProviderRequest,
};
use billing_cell::services::reconciliation::{
    generate_receipt_code, plan_payments, PaymentReconciliationService,
};
use shared_utils::test_utils::TestConfig;

// ==============================================================================
// FIXTURES
// ==============================================================================

fn invoice(total: f64, balance: f64, status: InvoiceStatus) -> Invoice {
    let now = Utc.with_ymd_and_hms(2031, 6, 20, 9, 0, 0).single().expect("valid time");
    Invoice {
        id: Uuid::new_v4(),
        company_id: Uuid::new_v4(),
        location_id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        appointment_id: None,
        total,
        balance,
        status,
        created_at: now,
        updated_at: now,
    }
}

fn entry(amount: f64) -> PaymentMethodEntry {
    PaymentMethodEntry {
        payment_method_id: Uuid::new_v4(),
        amount,
        provider: None,
    }
}

fn plan(
    invoice: &Invoice,
    methods: &[PaymentMethodEntry],
    existing: &HashSet<String>,
) -> Result<billing_cell::services::reconciliation::PaymentPlan, BillingError> {
    let now = Utc.with_ymd_and_hms(2031, 6, 20, 10, 0, 0).single().expect("valid time");
    let mut rng = StdRng::seed_from_u64(42);
    plan_payments(invoice, methods, existing, now, &mut rng)
}

// ==============================================================================
// BALANCE / STATUS DERIVATION
// ==============================================================================

#[test]
fn exact_payment_settles_the_invoice() {
    let invoice = invoice(100.0, 100.0, InvoiceStatus::New);
    let result = plan(&invoice, &[entry(60.0), entry(40.0)], &HashSet::new())
        .expect("plans");

    assert_eq!(result.new_balance, 0.0);
    assert_eq!(result.new_status, Some(InvoiceStatus::Paid));
    assert_eq!(result.payments.len(), 2);
    assert_eq!(result.receipts.len(), 2);
}

#[test]
fn partial_payment_leaves_part_paid_balance() {
    let invoice = invoice(100.0, 100.0, InvoiceStatus::New);
    let result = plan(&invoice, &[entry(30.0)], &HashSet::new()).expect("plans");

    assert_eq!(result.new_balance, 70.0);
    assert_eq!(result.new_status, Some(InvoiceStatus::PartPaid));
}

#[test]
fn overpayment_is_floored_at_zero() {
    let invoice = invoice(100.0, 40.0, InvoiceStatus::PartPaid);
    let result = plan(&invoice, &[entry(75.0)], &HashSet::new()).expect("plans");

    assert_eq!(result.new_balance, 0.0);
    assert_eq!(result.new_status, Some(InvoiceStatus::Paid));
}

#[test]
fn fractional_amounts_settle_without_residue() {
    let invoice = invoice(100.0, 100.0, InvoiceStatus::New);
    let result = plan(&invoice, &[entry(33.33), entry(66.67)], &HashSet::new())
        .expect("plans");

    assert_eq!(result.new_balance, 0.0);
    assert_eq!(result.new_status, Some(InvoiceStatus::Paid));
}

#[test]
fn empty_batch_leaves_status_untouched() {
    let invoice = invoice(100.0, 100.0, InvoiceStatus::New);
    let result = plan(&invoice, &[], &HashSet::new()).expect("plans");

    assert_eq!(result.new_balance, 100.0);
    assert_eq!(result.new_status, None);
    assert!(result.payments.is_empty());
    assert!(result.receipts.is_empty());
    assert!(result.providers.is_empty());
}

#[test]
fn non_positive_amounts_are_rejected() {
    let invoice = invoice(100.0, 100.0, InvoiceStatus::New);

    assert_matches!(
        plan(&invoice, &[entry(0.0)], &HashSet::new()),
        Err(BillingError::ValidationError(_))
    );
    assert_matches!(
        plan(&invoice, &[entry(-5.0)], &HashSet::new()),
        Err(BillingError::ValidationError(_))
    );
}

#[test]
fn provider_rows_are_generated_per_entry() {
    let invoice = invoice(100.0, 100.0, InvoiceStatus::New);
    let mut with_provider = entry(50.0);
    with_provider.provider = Some(ProviderRequest {
        name: "Visa Terminal".to_string(),
        account_number: Some("4111".to_string()),
    });

    let result = plan(&invoice, &[with_provider, entry(50.0)], &HashSet::new())
        .expect("plans");

    assert_eq!(result.providers.len(), 1);
    assert_eq!(result.providers[0].name, "Visa Terminal");
    assert_eq!(result.payments[0].provider_id, Some(result.providers[0].id));
    assert_eq!(result.payments[1].provider_id, None);
}

#[test]
fn nameless_provider_is_rejected() {
    let invoice = invoice(100.0, 100.0, InvoiceStatus::New);
    let mut bad = entry(50.0);
    bad.provider = Some(ProviderRequest {
        name: "  ".to_string(),
        account_number: None,
    });

    assert_matches!(
        plan(&invoice, &[bad], &HashSet::new()),
        Err(BillingError::ValidationError(_))
    );
}

// ==============================================================================
// RECEIPT CODES
// ==============================================================================

#[test]
fn receipt_codes_have_the_documented_shape() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
        let code = generate_receipt_code(&mut rng);
        assert_eq!(code.len(), 9);
        assert!(code.starts_with("REC"));
        assert!(code[3..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}

#[test]
fn batch_receipt_codes_stay_unique_against_a_seeded_code_set() {
    let invoice = invoice(10_000.0, 10_000.0, InvoiceStatus::New);

    // Pre-existing codes chosen so the planner's rng collides on its first
    // candidates and has to retry.
    let mut preview = StdRng::seed_from_u64(42);
    let mut existing: HashSet<String> = (0..5).map(|_| generate_receipt_code(&mut preview)).collect();
    for i in 0..1_000 {
        existing.insert(format!("REC{:06}", i));
    }

    let methods: Vec<PaymentMethodEntry> = (0..20).map(|_| entry(10.0)).collect();
    let result = plan(&invoice, &methods, &existing).expect("plans");

    let mut seen = existing.clone();
    for receipt in &result.receipts {
        assert!(
            seen.insert(receipt.code.clone()),
            "duplicate receipt code {} in batch",
            receipt.code
        );
    }
    assert_eq!(result.receipts.len(), 20);
}

// ==============================================================================
// SERVICE LOOKUPS (mocked PostgREST)
// ==============================================================================

#[tokio::test]
async fn missing_invoice_surfaces_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let service = PaymentReconciliationService::new(&config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let result = service.get_invoice(Uuid::new_v4(), "test_token").await;
    assert_matches!(result, Err(BillingError::InvoiceNotFound));
}

#[tokio::test]
async fn empty_batch_applies_without_writing() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let service = PaymentReconciliationService::new(&config);

    let existing = invoice(100.0, 100.0, InvoiceStatus::New);
    Mock::given(method("GET"))
        .and(path("/rest/v1/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            serde_json::to_value(&existing).expect("serializes"),
        ]))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/receipts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    // No RPC mock mounted: an attempted write would fail the request
    let result = service
        .apply_payments(existing.id, &[], "test_token")
        .await
        .expect("applies");

    assert_eq!(result.status, InvoiceStatus::New);
    assert_eq!(result.balance, 100.0);
}
