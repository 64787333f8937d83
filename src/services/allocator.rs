// src/services/allocator.rs

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{CommitOutcome, TicketStore},
    models::ticket::{NewTicket, Ticket, TicketFields, TicketKey},
};

/// Prefixo do albarán: três primeiros caracteres do username, em maiúsculas.
/// Sem username (ou vazio) => prefixo padrão.
pub fn ticket_prefix(username: Option<&str>, fallback: &str) -> String {
    match username.map(str::trim) {
        Some(name) if !name.is_empty() => name.chars().take(3).collect::<String>().to_uppercase(),
        _ => fallback.to_string(),
    }
}

/// "PRE-00001". Números maiores que 5 dígitos não são truncados.
pub fn format_custom_id(prefix: &str, ticket_num: i64) -> String {
    format!("{}-{:05}", prefix, ticket_num)
}

/// Reserva o próximo número do dono e cria o albarán no mesmo commit.
///
/// Controle otimista: lê perfil + contador (com versão), calcula o próximo ID e
/// grava somente se a versão não mudou. Em conflito, tenta de novo com espera
/// linear, até `max_attempts`.
#[derive(Clone)]
pub struct TicketAllocator {
    store: Arc<dyn TicketStore>,
    fallback_prefix: String,
    max_attempts: u32,
    backoff: Duration,
}

impl TicketAllocator {
    pub fn new(
        store: Arc<dyn TicketStore>,
        fallback_prefix: impl Into<String>,
        max_attempts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            store,
            fallback_prefix: fallback_prefix.into(),
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub async fn allocate_and_create(
        &self,
        owner_id: Uuid,
        fields: TicketFields,
    ) -> Result<Ticket, AppError> {
        for attempt in 1..=self.max_attempts {
            // 1. Conjunto de leitura: perfil + contador
            let snapshot = self.store.load_allocation_snapshot(owner_id).await?;

            // 2. Próximo número e ID legível
            let next = snapshot.counter.current + 1;
            let prefix = ticket_prefix(snapshot.username.as_deref(), &self.fallback_prefix);
            let custom_id = format_custom_id(&prefix, next);

            // 3. Carimba o rascunho (created_at fica com o armazenamento)
            let new_ticket = NewTicket {
                key: TicketKey::new(owner_id, custom_id),
                ticket_num: next,
                fields: fields.clone(),
                client_id: owner_id,
                client_username: snapshot.username.filter(|u| !u.trim().is_empty()),
            };

            // 4. Commit condicional
            match self
                .store
                .commit_allocation(new_ticket, snapshot.counter.version)
                .await?
            {
                CommitOutcome::Committed(ticket) => {
                    tracing::info!(
                        "🧾 Albarán {} criado para {} (tentativa {})",
                        ticket.custom_id,
                        owner_id,
                        attempt
                    );
                    return Ok(ticket);
                }
                CommitOutcome::Conflict => {
                    tracing::warn!(
                        "Contador de {} mudou durante a alocação (tentativa {}/{})",
                        owner_id,
                        attempt,
                        self.max_attempts
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
            }
        }

        Err(AppError::AllocationContention { attempts: self.max_attempts })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        db::{
            store::{AccountStore, AllocationSnapshot, TicketQuery},
            MemoryStore,
        },
        models::{
            auth::{NewUser, ROLE_CLIENT},
            destination::Destination,
            ticket::TicketDraft,
        },
        services::access_policy::TicketScope,
    };

    async fn client(store: &MemoryStore, username: Option<&str>) -> Uuid {
        store
            .create_user(NewUser {
                email: format!("{}@novapack.com", username.unwrap_or("sinperfil")),
                username: username.map(str::to_string),
                role: ROLE_CLIENT.to_string(),
                password_hash: String::new(),
            })
            .await
            .unwrap()
            .id
    }

    fn allocator(store: Arc<dyn TicketStore>, max_attempts: u32) -> TicketAllocator {
        TicketAllocator::new(store, "NOV", max_attempts, Duration::from_millis(1))
    }

    fn fields() -> TicketFields {
        TicketDraft { receiver: Some("Lucía".into()), ..Default::default() }.into_fields()
    }

    #[test]
    fn custom_id_from_username_and_number() {
        let prefix = ticket_prefix(Some("mariogarcia"), "NOV");
        assert_eq!(format_custom_id(&prefix, 7), "MAR-00007");
    }

    #[test]
    fn prefix_edge_cases() {
        assert_eq!(ticket_prefix(None, "NOV"), "NOV");
        assert_eq!(ticket_prefix(Some(""), "NOV"), "NOV");
        assert_eq!(ticket_prefix(Some("al"), "NOV"), "AL");
        assert_eq!(ticket_prefix(Some("ñandú"), "NOV"), "ÑAN");
        assert_eq!(format_custom_id("MAR", 123_456), "MAR-123456");
    }

    #[tokio::test]
    async fn sequential_allocations_count_up_from_one() {
        let store = MemoryStore::new();
        let owner = client(&store, Some("mariogarcia")).await;
        let alloc = allocator(Arc::new(store.clone()), 5);

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(alloc.allocate_and_create(owner, fields()).await.unwrap());
        }

        let custom_ids: Vec<_> = ids.iter().map(|t| t.custom_id.as_str()).collect();
        assert_eq!(custom_ids, ["MAR-00001", "MAR-00002", "MAR-00003"]);
        assert!(ids.iter().all(|t| t.owner_id == owner && t.client_id == owner));
        assert_eq!(ids[0].client_username.as_deref(), Some("mariogarcia"));
        assert!(!ids[0].printed);
        assert_eq!(store.counter(owner).await.current, 3);
    }

    #[tokio::test]
    async fn owner_without_profile_uses_fallback_prefix() {
        let store = MemoryStore::new();
        let owner = client(&store, None).await;
        let alloc = allocator(Arc::new(store.clone()), 5);

        let ticket = alloc.allocate_and_create(owner, fields()).await.unwrap();
        assert_eq!(ticket.custom_id, "NOV-00001");
        assert_eq!(ticket.client_username, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_allocations_are_gapless_and_unique() {
        const N: i64 = 25;
        let store = MemoryStore::new();
        let owner = client(&store, Some("mariogarcia")).await;
        let other = client(&store, Some("pepe")).await;
        let alloc = allocator(Arc::new(store.clone()), 64);

        let mut handles = Vec::new();
        for i in 0..N * 2 {
            let alloc = alloc.clone();
            let who = if i % 2 == 0 { owner } else { other };
            handles.push(tokio::spawn(async move { alloc.allocate_and_create(who, fields()).await }));
        }

        let mut mine = BTreeSet::new();
        let mut theirs = BTreeSet::new();
        for handle in handles {
            let ticket = handle.await.unwrap().unwrap();
            let set = if ticket.owner_id == owner { &mut mine } else { &mut theirs };
            assert!(set.insert(ticket.ticket_num), "número duplicado {}", ticket.ticket_num);
        }

        let expected: BTreeSet<i64> = (1..=N).collect();
        assert_eq!(mine, expected);
        assert_eq!(theirs, expected);
        assert_eq!(store.counter(owner).await.current, N);
    }

    #[tokio::test]
    async fn deleting_never_reclaims_a_number() {
        let store = MemoryStore::new();
        let owner = client(&store, Some("mariogarcia")).await;
        let alloc = allocator(Arc::new(store.clone()), 5);

        for _ in 0..3 {
            alloc.allocate_and_create(owner, fields()).await.unwrap();
        }
        store.delete_ticket(&TicketKey::new(owner, "MAR-00003")).await.unwrap();
        assert_eq!(store.counter(owner).await.current, 3);

        let next = alloc.allocate_and_create(owner, fields()).await.unwrap();
        assert_eq!(next.custom_id, "MAR-00004");
        assert_eq!(next.ticket_num, 4);
    }

    // Armazenamento que delega ao MemoryStore, mas permite forçar o comportamento do commit.
    struct ScriptedStore {
        inner: MemoryStore,
        commits: AtomicU32,
        mode: Mode,
    }

    enum Mode {
        // Outro escritor passa na frente no primeiro commit
        RaceOnce,
        AlwaysConflict,
        Fail,
    }

    #[async_trait]
    impl TicketStore for ScriptedStore {
        async fn load_allocation_snapshot(&self, owner_id: Uuid) -> Result<AllocationSnapshot, AppError> {
            self.inner.load_allocation_snapshot(owner_id).await
        }

        async fn commit_allocation(
            &self,
            ticket: NewTicket,
            expected_version: i64,
        ) -> Result<CommitOutcome, AppError> {
            let n = self.commits.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::RaceOnce if n == 0 => {
                    let rival = NewTicket { client_username: Some("rival".into()), ..ticket.clone() };
                    self.inner.commit_allocation(rival, expected_version).await?;
                    self.inner.commit_allocation(ticket, expected_version).await
                }
                Mode::AlwaysConflict => Ok(CommitOutcome::Conflict),
                Mode::Fail => Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut)),
                _ => self.inner.commit_allocation(ticket, expected_version).await,
            }
        }

        async fn get_ticket(&self, key: &TicketKey) -> Result<Option<Ticket>, AppError> {
            self.inner.get_ticket(key).await
        }

        async fn update_ticket(&self, key: &TicketKey, fields: &TicketFields) -> Result<Ticket, AppError> {
            self.inner.update_ticket(key, fields).await
        }

        async fn mark_printed(&self, key: &TicketKey) -> Result<(), AppError> {
            self.inner.mark_printed(key).await
        }

        async fn delete_ticket(&self, key: &TicketKey) -> Result<(), AppError> {
            self.inner.delete_ticket(key).await
        }

        async fn query_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>, AppError> {
            self.inner.query_tickets(query).await
        }

        async fn list_destinations(&self, owner_id: Uuid) -> Result<Vec<Destination>, AppError> {
            self.inner.list_destinations(owner_id).await
        }

        async fn add_destination(
            &self,
            owner_id: Uuid,
            name: &str,
            address: &str,
        ) -> Result<Destination, AppError> {
            self.inner.add_destination(owner_id, name, address).await
        }
    }

    fn scripted(inner: &MemoryStore, mode: Mode) -> Arc<ScriptedStore> {
        Arc::new(ScriptedStore { inner: inner.clone(), commits: AtomicU32::new(0), mode })
    }

    #[tokio::test]
    async fn conflict_is_retried_with_a_fresh_number() {
        let store = MemoryStore::new();
        let owner = client(&store, Some("mariogarcia")).await;
        let racing = scripted(&store, Mode::RaceOnce);
        let alloc = allocator(racing.clone(), 5);

        let ticket = alloc.allocate_and_create(owner, fields()).await.unwrap();

        assert_eq!(ticket.custom_id, "MAR-00002");
        assert_eq!(racing.commits.load(Ordering::SeqCst), 2);
        let rival = store.get_ticket(&TicketKey::new(owner, "MAR-00001")).await.unwrap().unwrap();
        assert_eq!(rival.client_username.as_deref(), Some("rival"));
    }

    #[tokio::test]
    async fn exhausted_retries_leave_no_trace() {
        let store = MemoryStore::new();
        let owner = client(&store, Some("mariogarcia")).await;
        let alloc = allocator(scripted(&store, Mode::AlwaysConflict), 3);

        let err = alloc.allocate_and_create(owner, fields()).await.unwrap_err();

        assert!(matches!(err, AppError::AllocationContention { attempts: 3 }));
        assert_eq!(store.ticket_count(owner).await, 0);
        assert_eq!(store.counter(owner).await.current, 0);
    }

    #[tokio::test]
    async fn store_failure_is_surfaced_without_partial_write() {
        let store = MemoryStore::new();
        let owner = client(&store, Some("mariogarcia")).await;
        let alloc = allocator(scripted(&store, Mode::Fail), 3);

        let err = alloc.allocate_and_create(owner, fields()).await.unwrap_err();

        assert!(matches!(err, AppError::DatabaseError(_)));
        assert_eq!(store.ticket_count(owner).await, 0);
        let own = TicketQuery {
            scope: TicketScope::OwnTickets(owner),
            created_from: None,
            created_to: None,
            limit: None,
        };
        assert!(store.query_tickets(&own).await.unwrap().is_empty());
    }
}
