//! Submitted exams and their scores

pub mod entities;
