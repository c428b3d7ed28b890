//! Year-scoped extraction schemas for university financial statements and
//! enrollment disclosures, and the residual pass that derives the income
//! statement's "other" line items.

pub mod core;

pub use crate::core::*;
