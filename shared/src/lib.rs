//! Shared domain types and rules for the charcoal distribution backend
//!
//! Everything in this crate is free of I/O: the backend loads rows, hands them
//! to the planners and books defined here, and persists whatever they produce.

pub mod error;
pub mod ledger;
pub mod models;
pub mod money;
pub mod projection;
pub mod reconciliation;
pub mod sales;
pub mod transfer;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
