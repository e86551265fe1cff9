// libs/appointment-cell/src/services/mod.rs
pub mod availability;
pub mod booking;
pub mod lifecycle;
