use crate::domain::error::DomainError;
use crate::domain::ticket::TicketHandle;

/// Storage of ticket entries.
///
/// Methods are synchronous: the registry calls them while holding a
/// ticket lock and must never await in that window. Implementations must
/// not hold internal guards once a method returns. Faults surface as
/// [`DomainError::StorageUnavailable`] and are never retried by the engine.
pub trait TicketStore: Send + Sync {
    /// Insert a new entry. Fails if the id is already present.
    fn insert(&self, id: String, ticket: TicketHandle) -> Result<(), DomainError>;

    fn get(&self, id: &str) -> Result<Option<TicketHandle>, DomainError>;

    fn remove(&self, id: &str) -> Result<Option<TicketHandle>, DomainError>;

    /// Point-in-time copy of all entries.
    fn snapshot(&self) -> Result<Vec<(String, TicketHandle)>, DomainError>;

    fn len(&self) -> Result<usize, DomainError>;
}
