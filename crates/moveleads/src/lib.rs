//! Lead matching, reveal pricing and the credit ledger behind the removals lead marketplace.
//!
//! The [`marketplace`] module holds the domain services; [`config`], [`error`] and
//! [`telemetry`] carry the process-level plumbing shared with the API service.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod telemetry;
