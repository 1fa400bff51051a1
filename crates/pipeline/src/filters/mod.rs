//! Filter implementations for the candidate pipeline.
//!
//! This module contains all the concrete filter implementations
//! that can be composed into a FilterPipeline.

pub mod already_rated;
pub mod minimum_stars;
pub mod open_business;

// Re-export for convenience
pub use already_rated::AlreadyRatedFilter;
pub use minimum_stars::MinimumStarsFilter;
pub use open_business::OpenBusinessFilter;
