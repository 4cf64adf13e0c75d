//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod coordinate_review;
pub mod messenger;
pub mod run_worker;

#[cfg(test)]
pub(crate) mod test_support;
