//! Common module - shared types, errors, clock and collaborator traits

pub mod clock;
pub mod errors;
pub mod traits;
pub mod types;
