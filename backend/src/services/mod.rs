//! Business logic services for the charcoal distribution backend

pub mod access;
pub mod auth;
pub mod catalog;
pub mod deposit;
pub mod expense;
pub mod order;
pub mod payment;
pub mod sale;
pub mod stock;
pub mod transfer;
pub mod user;
pub mod waste;

pub use auth::AuthService;
pub use catalog::CatalogService;
pub use deposit::DepositService;
pub use expense::ExpenseService;
pub use order::OrderService;
pub use payment::PaymentService;
pub use sale::SaleService;
pub use stock::InventoryService;
pub use transfer::TransferService;
pub use user::UserService;
pub use waste::WasteService;
