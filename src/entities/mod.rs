//! Request and response entities plus the submission workflow built on them.

pub mod analysis;
pub mod submission;
