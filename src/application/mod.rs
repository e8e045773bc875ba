//! # Application Layer
//!
//! Port contracts and the two-stage classification pipeline built on them.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
