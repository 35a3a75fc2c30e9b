//! Domain models for the charcoal distribution backend

mod catalog;
mod expense;
mod inventory;
mod order;
mod payment;
mod sale;
mod user;
mod waste;

pub use catalog::*;
pub use expense::*;
pub use inventory::*;
pub use order::*;
pub use payment::*;
pub use sale::*;
pub use user::*;
pub use waste::*;
