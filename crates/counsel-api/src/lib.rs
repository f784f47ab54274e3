//! Shared record types for counsel
//!
//! This crate defines the records that live in the shared store and the
//! values handed to the presentation layer:
//! - Client records and the client document
//! - Sessions with their status and payment state machines
//! - The slot availability document
//! - Calendar day descriptors and authentication outcomes

mod slots;
mod status;
mod types;

pub use slots::*;
pub use status::*;
pub use types::*;
