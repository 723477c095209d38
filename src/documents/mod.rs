//! Generated documents: PDF statements and CSV exports.

pub mod export;
pub mod pdf;
pub mod statement;
