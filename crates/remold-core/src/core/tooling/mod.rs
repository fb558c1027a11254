//! Error taxonomy and command outcomes.

pub mod error;
pub mod outcome;
