//! HTTP request handlers

pub mod auth;
pub mod catalog;
pub mod deposit;
pub mod expense;
pub mod form;
pub mod health;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod sale;
pub mod transfer;
pub mod user;
pub mod waste;
