//! In-memory ticket store backed by `DashMap`.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::domain::error::DomainError;
use crate::domain::repo::TicketStore;
use crate::domain::ticket::TicketHandle;

/// Handles are cloned out of the map before being returned, so no shard
/// guard outlives a call and callers can lock tickets freely.
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    tickets: DashMap<String, TicketHandle>,
}

impl InMemoryTicketStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TicketStore for InMemoryTicketStore {
    fn insert(&self, id: String, ticket: TicketHandle) -> Result<(), DomainError> {
        match self.tickets.entry(id) {
            Entry::Occupied(e) => Err(DomainError::internal(format!(
                "duplicate ticket id '{}'",
                e.key()
            ))),
            Entry::Vacant(e) => {
                e.insert(ticket);
                Ok(())
            }
        }
    }

    fn get(&self, id: &str) -> Result<Option<TicketHandle>, DomainError> {
        Ok(self.tickets.get(id).map(|entry| entry.value().clone()))
    }

    fn remove(&self, id: &str) -> Result<Option<TicketHandle>, DomainError> {
        Ok(self.tickets.remove(id).map(|(_, ticket)| ticket))
    }

    fn snapshot(&self) -> Result<Vec<(String, TicketHandle)>, DomainError> {
        Ok(self
            .tickets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    fn len(&self) -> Result<usize, DomainError> {
        Ok(self.tickets.len())
    }
}
