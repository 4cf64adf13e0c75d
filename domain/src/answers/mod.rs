//! Answer keys
//!
//! - [`entities::Answer`] / [`entities::AnswerSet`] — the correct responses of one stage
//! - [`store::AnswerStore`] — per-stage key storage with a derived lookup cache

pub mod entities;
pub mod store;
