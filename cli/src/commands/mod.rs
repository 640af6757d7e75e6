//! Command implementations

pub mod job;
pub mod tenant;
