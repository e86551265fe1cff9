// libs/billing-cell/src/services/mod.rs
pub mod reconciliation;
