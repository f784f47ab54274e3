//! Collaborator interfaces for counsel
//!
//! This crate defines the narrow interfaces the scheduling core uses to reach
//! external services (video-conferencing links and SMS delivery). It contains
//! no provider code itself, only the traits and recording mocks for tests.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
