// src/db/memory.rs
//
// Armazenamento em memória (STORE_BACKEND=memory). Mesma semântica do
// PostgreSQL: commit condicional pela versão do contador, chave (dono, custom_id),
// created_at atribuído no commit e monotônico.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{
        AccountStore, AllocationSnapshot, CommitOutcome, CounterState, TicketQuery, TicketStore,
    },
    models::{
        auth::{NewUser, User},
        destination::Destination,
        ticket::{NewTicket, Ticket, TicketFields, TicketKey},
    },
    services::access_policy::TicketScope,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    counters: HashMap<Uuid, CounterState>,
    // dono -> custom_id -> albarán
    tickets: HashMap<Uuid, BTreeMap<String, Ticket>>,
    destinations: HashMap<Uuid, Vec<Destination>>,
    last_created_at: Option<DateTime<Utc>>,
}

impl MemoryState {
    // "Timestamp do servidor": nunca repete nem volta no tempo.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(stamp);
        stamp
    }

    // O dono é sempre o da subárvore onde o registro está guardado.
    fn read_ticket(owner_id: Uuid, stored: &Ticket) -> Ticket {
        Ticket { owner_id, ..stored.clone() }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn counter(&self, owner_id: Uuid) -> CounterState {
        let state = self.state.read().await;
        state.counters.get(&owner_id).copied().unwrap_or_default()
    }

    /// Insere um albarán pronto (com created_at arbitrário) sem passar pelo contador.
    #[cfg(test)]
    pub async fn seed_ticket(&self, ticket: Ticket) {
        let mut state = self.state.write().await;
        state
            .tickets
            .entry(ticket.owner_id)
            .or_default()
            .insert(ticket.custom_id.clone(), ticket);
    }

    #[cfg(test)]
    pub async fn ticket_count(&self, owner_id: Uuid) -> usize {
        let state = self.state.read().await;
        state.tickets.get(&owner_id).map(|t| t.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == new_user.email) {
            return Err(AppError::EmailAlreadyExists);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            role: new_user.role,
            password_hash: new_user.password_hash,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn load_allocation_snapshot(&self, owner_id: Uuid) -> Result<AllocationSnapshot, AppError> {
        let state = self.state.read().await;
        Ok(AllocationSnapshot {
            username: state.users.get(&owner_id).and_then(|u| u.username.clone()),
            counter: state.counters.get(&owner_id).copied().unwrap_or_default(),
        })
    }

    async fn commit_allocation(
        &self,
        ticket: NewTicket,
        expected_version: i64,
    ) -> Result<CommitOutcome, AppError> {
        let mut state = self.state.write().await;
        let owner_id = ticket.key.owner_id;

        let counter = state.counters.get(&owner_id).copied().unwrap_or_default();
        if counter.version != expected_version {
            return Ok(CommitOutcome::Conflict);
        }

        let exists = state
            .tickets
            .get(&owner_id)
            .is_some_and(|owned| owned.contains_key(&ticket.key.custom_id));
        if exists {
            return Err(AppError::TicketAlreadyExists(ticket.key.custom_id));
        }

        // Daqui em diante nada falha: as duas escritas acontecem juntas.
        let created_at = state.next_timestamp();
        state.counters.insert(
            owner_id,
            CounterState { current: ticket.ticket_num, version: counter.version + 1 },
        );
        let stored = Ticket::from_new(ticket, created_at);
        state
            .tickets
            .entry(owner_id)
            .or_default()
            .insert(stored.custom_id.clone(), stored.clone());

        Ok(CommitOutcome::Committed(stored))
    }

    async fn get_ticket(&self, key: &TicketKey) -> Result<Option<Ticket>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .tickets
            .get(&key.owner_id)
            .and_then(|owned| owned.get(&key.custom_id))
            .map(|t| MemoryState::read_ticket(key.owner_id, t)))
    }

    async fn update_ticket(&self, key: &TicketKey, fields: &TicketFields) -> Result<Ticket, AppError> {
        let mut state = self.state.write().await;
        let stored = state
            .tickets
            .get_mut(&key.owner_id)
            .and_then(|owned| owned.get_mut(&key.custom_id))
            .ok_or_else(|| AppError::TicketNotFound(key.custom_id.clone()))?;

        stored.fields = fields.clone();
        Ok(MemoryState::read_ticket(key.owner_id, stored))
    }

    async fn mark_printed(&self, key: &TicketKey) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let stored = state
            .tickets
            .get_mut(&key.owner_id)
            .and_then(|owned| owned.get_mut(&key.custom_id))
            .ok_or_else(|| AppError::TicketNotFound(key.custom_id.clone()))?;

        stored.printed = true;
        Ok(())
    }

    async fn delete_ticket(&self, key: &TicketKey) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        state
            .tickets
            .get_mut(&key.owner_id)
            .and_then(|owned| owned.remove(&key.custom_id))
            .map(|_| ())
            .ok_or_else(|| AppError::TicketNotFound(key.custom_id.clone()))
    }

    async fn query_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>, AppError> {
        let state = self.state.read().await;

        let in_window = |t: &Ticket| {
            query.created_from.is_none_or(|from| t.created_at >= from)
                && query.created_to.is_none_or(|to| t.created_at <= to)
        };

        let mut found: Vec<Ticket> = state
            .tickets
            .iter()
            .filter(|(owner_id, _)| match query.scope {
                TicketScope::OwnTickets(id) => **owner_id == id,
                TicketScope::AllTickets => true,
            })
            .flat_map(|(owner_id, owned)| {
                owned.values().map(move |t| MemoryState::read_ticket(*owner_id, t))
            })
            .filter(|t| in_window(t))
            .collect();

        found.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.custom_id.cmp(&a.custom_id))
        });

        if let Some(limit) = query.limit {
            found.truncate(usize::try_from(limit).unwrap_or(0));
        }

        Ok(found)
    }

    async fn list_destinations(&self, owner_id: Uuid) -> Result<Vec<Destination>, AppError> {
        let state = self.state.read().await;
        let mut destinations = state.destinations.get(&owner_id).cloned().unwrap_or_default();
        destinations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(destinations)
    }

    async fn add_destination(
        &self,
        owner_id: Uuid,
        name: &str,
        address: &str,
    ) -> Result<Destination, AppError> {
        let mut state = self.state.write().await;
        let destination = Destination {
            id: Uuid::new_v4(),
            owner_id,
            name: name.to_string(),
            address: address.to_string(),
            created_at: Utc::now(),
        };
        state
            .destinations
            .entry(owner_id)
            .or_default()
            .push(destination.clone());
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ticket::TicketDraft;

    fn new_ticket(owner_id: Uuid, custom_id: &str, num: i64) -> NewTicket {
        NewTicket {
            key: TicketKey::new(owner_id, custom_id),
            ticket_num: num,
            fields: TicketDraft::default().into_fields(),
            client_id: owner_id,
            client_username: None,
        }
    }

    #[tokio::test]
    async fn commit_with_stale_version_writes_nothing() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        let first = store.commit_allocation(new_ticket(owner, "NOV-00001", 1), 0).await.unwrap();
        assert!(matches!(first, CommitOutcome::Committed(_)));

        // Versão 0 já foi consumida
        let stale = store.commit_allocation(new_ticket(owner, "NOV-00002", 2), 0).await.unwrap();
        assert!(matches!(stale, CommitOutcome::Conflict));

        assert_eq!(store.counter(owner).await, CounterState { current: 1, version: 1 });
        assert_eq!(store.ticket_count(owner).await, 1);
    }

    #[tokio::test]
    async fn existing_key_is_never_overwritten() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        store.commit_allocation(new_ticket(owner, "NOV-00001", 1), 0).await.unwrap();

        let err = store
            .commit_allocation(new_ticket(owner, "NOV-00001", 2), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TicketAlreadyExists(id) if id == "NOV-00001"));
        assert_eq!(store.counter(owner).await.current, 1);
    }

    #[tokio::test]
    async fn created_at_is_strictly_increasing() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let mut last: Option<DateTime<Utc>> = None;

        for n in 1..=20 {
            let outcome = store
                .commit_allocation(new_ticket(owner, &format!("NOV-{n:05}"), n), n - 1)
                .await
                .unwrap();
            let CommitOutcome::Committed(ticket) = outcome else { panic!("conflito inesperado") };
            if let Some(prev) = last {
                assert!(ticket.created_at > prev);
            }
            last = Some(ticket.created_at);
        }
    }

    #[tokio::test]
    async fn update_of_missing_ticket_is_not_found() {
        let store = MemoryStore::new();
        let key = TicketKey::new(Uuid::new_v4(), "NOV-00009");
        let err = store
            .update_ticket(&key, &TicketFields::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TicketNotFound(_)));
    }
}
