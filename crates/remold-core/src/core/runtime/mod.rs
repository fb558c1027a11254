//! Process execution and the effect seams that wrap it.

pub mod effects;
pub mod process;
