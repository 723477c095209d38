//! Data models representing database entities and API payloads.

pub mod account;
pub mod alert;
pub mod api_key;
pub mod audit;
pub mod branch;
pub mod card;
pub mod credit;
pub mod customer;
pub mod dashboard;
/// Uniform `{success, message, data, error}` wrapper
pub mod envelope;
pub mod money;
pub mod reconciliation;
pub mod statement;
pub mod transaction;
pub mod workflow;
