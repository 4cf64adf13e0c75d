//! Core domain concepts shared across all subdomains.
//!
//! - [`ids::StageId`] / [`ids::ExamId`] — identifiers carried by every exam
//! - [`error::DomainError`] — domain-level errors

pub mod error;
pub mod ids;
