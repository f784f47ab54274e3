//! Store trait definitions

use counsel_api::{ClientBook, SessionBook, SlotBook};
use std::fmt;

use crate::{AuditEvent, StoreResult};

/// The persisted documents of the shared store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    Clients,
    Slots,
    Sessions,
}

impl Document {
    pub const ALL: [Document; 3] = [Document::Clients, Document::Slots, Document::Sessions];

    pub fn name(&self) -> &'static str {
        match self {
            Document::Clients => "clients",
            Document::Slots => "slots",
            Document::Sessions => "sessions",
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Main store trait
///
/// Documents are read and written whole. A reader always sees the last
/// committed snapshot; there is no isolation between a load and a later
/// save, so callers re-load right before computing what they save.
pub trait Store: Send + Sync {
    // Documents

    /// Load the client document (empty if never saved)
    fn load_clients(&self) -> StoreResult<ClientBook>;

    /// Replace the client document
    fn save_clients(&self, clients: &ClientBook) -> StoreResult<()>;

    /// Load the slot availability document (empty if never saved)
    fn load_slots(&self) -> StoreResult<SlotBook>;

    /// Replace the slot availability document
    fn save_slots(&self, slots: &SlotBook) -> StoreResult<()>;

    /// Load the session document (empty if never saved)
    fn load_sessions(&self) -> StoreResult<SessionBook>;

    /// Replace the session document
    fn save_sessions(&self, sessions: &SessionBook) -> StoreResult<()>;

    /// Number of committed saves of a document (0 if never saved)
    fn revision(&self, document: Document) -> StoreResult<u64>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
