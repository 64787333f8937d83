// src/db/ticket_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{AllocationSnapshot, CommitOutcome, CounterState, TicketQuery, TicketStore},
    models::{
        destination::Destination,
        ticket::{NewTicket, Ticket, TicketFields, TicketKey},
    },
    services::access_policy::TicketScope,
};

const TICKET_COLUMNS: &str = r#"
    owner_id, custom_id, ticket_num, created_at,
    sender, receiver, address, packages, weight, size, shipping_type, cod, notes,
    status, printed, client_id, client_username
"#;

// Linha crua da tabela 'tickets'
#[derive(Debug, FromRow)]
struct TicketRow {
    owner_id: Uuid,
    custom_id: String,
    ticket_num: i64,
    created_at: DateTime<Utc>,
    sender: String,
    receiver: String,
    address: String,
    packages: i32,
    weight: String,
    size: String,
    shipping_type: String,
    cod: Option<Decimal>,
    notes: String,
    status: String,
    printed: bool,
    client_id: Uuid,
    client_username: Option<String>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = AppError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket {
            // O dono vem da coluna-chave, nunca de client_id.
            owner_id: row.owner_id,
            custom_id: row.custom_id,
            ticket_num: row.ticket_num,
            created_at: row.created_at,
            fields: TicketFields {
                sender: row.sender,
                receiver: row.receiver,
                address: row.address,
                packages: row.packages,
                weight: row.weight,
                size: row.size,
                shipping_type: row.shipping_type,
                cod: row.cod,
                notes: row.notes,
                status: row.status.parse()?,
            },
            printed: row.printed,
            client_id: row.client_id,
            client_username: row.client_username,
        })
    }
}

#[derive(Clone)]
pub struct TicketRepository {
    pool: PgPool,
}

impl TicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketStore for TicketRepository {
    // =========================================================================
    //  ALOCAÇÃO
    // =========================================================================

    async fn load_allocation_snapshot(&self, owner_id: Uuid) -> Result<AllocationSnapshot, AppError> {
        // Uma única instrução => perfil e contador vêm do mesmo snapshot.
        let row = sqlx::query_as::<_, (Option<String>, i64, i64)>(
            r#"
            SELECT u.username, COALESCE(c.current, 0), COALESCE(c.version, 0)
            FROM users u
            LEFT JOIN ticket_counters c ON c.owner_id = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some((username, current, version)) => AllocationSnapshot {
                username,
                counter: CounterState { current, version },
            },
            None => AllocationSnapshot::default(),
        })
    }

    async fn commit_allocation(
        &self,
        ticket: NewTicket,
        expected_version: i64,
    ) -> Result<CommitOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Avança o contador somente se ninguém o mexeu desde a leitura
        let counter_result = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO ticket_counters (owner_id, current, version)
                VALUES ($1, $2, 1)
                ON CONFLICT (owner_id) DO NOTHING
                "#,
            )
            .bind(ticket.key.owner_id)
            .bind(ticket.ticket_num)
            .execute(&mut *tx)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE ticket_counters
                SET current = $2, version = version + 1
                WHERE owner_id = $1 AND version = $3
                "#,
            )
            .bind(ticket.key.owner_id)
            .bind(ticket.ticket_num)
            .bind(expected_version)
            .execute(&mut *tx)
            .await?
        };

        if counter_result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(CommitOutcome::Conflict);
        }

        // 2. Cria o albarán na chave calculada (INSERT, nunca upsert)
        let custom_id = ticket.key.custom_id.clone();
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r#"
            INSERT INTO tickets (
                owner_id, custom_id, ticket_num,
                sender, receiver, address, packages, weight, size, shipping_type, cod, notes,
                status, printed, client_id, client_username
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, FALSE, $14, $15)
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(ticket.key.owner_id)
        .bind(&ticket.key.custom_id)
        .bind(ticket.ticket_num)
        .bind(&ticket.fields.sender)
        .bind(&ticket.fields.receiver)
        .bind(&ticket.fields.address)
        .bind(ticket.fields.packages)
        .bind(&ticket.fields.weight)
        .bind(&ticket.fields.size)
        .bind(&ticket.fields.shipping_type)
        .bind(ticket.fields.cod)
        .bind(&ticket.fields.notes)
        .bind(ticket.fields.status.as_str())
        .bind(ticket.client_id)
        .bind(&ticket.client_username)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::TicketAlreadyExists(custom_id.clone());
                }
            }
            e.into()
        })?;

        // 3. Se falhar antes daqui, o drop do tx faz rollback dos dois.
        tx.commit().await?;

        Ok(CommitOutcome::Committed(row.try_into()?))
    }

    // =========================================================================
    //  ALBARANES
    // =========================================================================

    async fn get_ticket(&self, key: &TicketKey) -> Result<Option<Ticket>, AppError> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE owner_id = $1 AND custom_id = $2"
        ))
        .bind(key.owner_id)
        .bind(&key.custom_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Ticket::try_from).transpose()
    }

    async fn update_ticket(&self, key: &TicketKey, fields: &TicketFields) -> Result<Ticket, AppError> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r#"
            UPDATE tickets
            SET sender = $3, receiver = $4, address = $5, packages = $6, weight = $7,
                size = $8, shipping_type = $9, cod = $10, notes = $11, status = $12
            WHERE owner_id = $1 AND custom_id = $2
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(key.owner_id)
        .bind(&key.custom_id)
        .bind(&fields.sender)
        .bind(&fields.receiver)
        .bind(&fields.address)
        .bind(fields.packages)
        .bind(&fields.weight)
        .bind(&fields.size)
        .bind(&fields.shipping_type)
        .bind(fields.cod)
        .bind(&fields.notes)
        .bind(fields.status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::TicketNotFound(key.custom_id.clone()))?;

        row.try_into()
    }

    async fn mark_printed(&self, key: &TicketKey) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE tickets SET printed = TRUE WHERE owner_id = $1 AND custom_id = $2",
        )
        .bind(key.owner_id)
        .bind(&key.custom_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::TicketNotFound(key.custom_id.clone()));
        }
        Ok(())
    }

    async fn delete_ticket(&self, key: &TicketKey) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM tickets WHERE owner_id = $1 AND custom_id = $2")
            .bind(key.owner_id)
            .bind(&key.custom_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::TicketNotFound(key.custom_id.clone()));
        }
        Ok(())
    }

    async fn query_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>, AppError> {
        let owner_filter = match query.scope {
            TicketScope::OwnTickets(owner_id) => Some(owner_id),
            TicketScope::AllTickets => None,
        };

        // Sem dono => varre os albaranes de todos os donos (visão do administrador).
        // LIMIT NULL = sem limite.
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            r#"
            SELECT {TICKET_COLUMNS}
            FROM tickets
            WHERE ($1::uuid IS NULL OR owner_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            ORDER BY created_at DESC, custom_id DESC
            LIMIT $4
            "#
        ))
        .bind(owner_filter)
        .bind(query.created_from)
        .bind(query.created_to)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Ticket::try_from).collect()
    }

    // =========================================================================
    //  DESTINOS
    // =========================================================================

    async fn list_destinations(&self, owner_id: Uuid) -> Result<Vec<Destination>, AppError> {
        let destinations = sqlx::query_as::<_, Destination>(
            r#"
            SELECT id, owner_id, name, address, created_at
            FROM destinations
            WHERE owner_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(destinations)
    }

    async fn add_destination(
        &self,
        owner_id: Uuid,
        name: &str,
        address: &str,
    ) -> Result<Destination, AppError> {
        let destination = sqlx::query_as::<_, Destination>(
            r#"
            INSERT INTO destinations (owner_id, name, address)
            VALUES ($1, $2, $3)
            RETURNING id, owner_id, name, address, created_at
            "#,
        )
        .bind(owner_id)
        .bind(name)
        .bind(address)
        .fetch_one(&self.pool)
        .await?;

        Ok(destination)
    }
}

// Rodam contra um PostgreSQL real:
// DATABASE_URL=postgres://... cargo test -- --ignored
#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, sync::Arc, time::Duration};

    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::{
        db::{store::AccountStore, UserRepository},
        models::auth::{NewUser, ROLE_CLIENT},
        services::allocator::TicketAllocator,
    };

    async fn pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL para os testes de PostgreSQL");
        let pool = PgPoolOptions::new().max_connections(10).connect(&url).await.unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        pool
    }

    // E-mail único por execução: o banco de teste é reaproveitado
    async fn owner(pool: &PgPool, username: &str) -> Uuid {
        UserRepository::new(pool.clone())
            .create_user(NewUser {
                email: format!("{}-{}@novapack.test", username, Uuid::new_v4()),
                username: Some(username.to_string()),
                role: ROLE_CLIENT.to_string(),
                password_hash: String::new(),
            })
            .await
            .unwrap()
            .id
    }

    fn new_ticket(owner_id: Uuid, custom_id: &str, ticket_num: i64) -> NewTicket {
        NewTicket {
            key: TicketKey::new(owner_id, custom_id),
            ticket_num,
            fields: TicketFields::default(),
            client_id: owner_id,
            client_username: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requer PostgreSQL (DATABASE_URL)"]
    async fn conditional_commit_rejects_stale_versions() {
        let pool = pool().await;
        let repo = TicketRepository::new(pool.clone());
        let owner_id = owner(&pool, "mariogarcia").await;

        // Contador ausente: versão 0 cria a linha uma única vez
        let snapshot = repo.load_allocation_snapshot(owner_id).await.unwrap();
        assert_eq!(snapshot.counter, CounterState::default());
        assert_eq!(snapshot.username.as_deref(), Some("mariogarcia"));

        let first = repo.commit_allocation(new_ticket(owner_id, "MAR-00001", 1), 0).await.unwrap();
        assert!(matches!(first, CommitOutcome::Committed(_)));
        let again = repo.commit_allocation(new_ticket(owner_id, "MAR-00001", 1), 0).await.unwrap();
        assert!(matches!(again, CommitOutcome::Conflict));

        // Versão velha não grava nada
        let stale = repo.commit_allocation(new_ticket(owner_id, "MAR-00002", 2), 7).await.unwrap();
        assert!(matches!(stale, CommitOutcome::Conflict));
        assert!(repo.get_ticket(&TicketKey::new(owner_id, "MAR-00002")).await.unwrap().is_none());

        let snapshot = repo.load_allocation_snapshot(owner_id).await.unwrap();
        assert_eq!(snapshot.counter, CounterState { current: 1, version: 1 });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requer PostgreSQL (DATABASE_URL)"]
    async fn concurrent_allocations_in_postgres_are_gapless() {
        const N: i64 = 20;
        let pool = pool().await;
        let repo = Arc::new(TicketRepository::new(pool.clone()));
        let owner_id = owner(&pool, "pepe").await;
        let allocator = TicketAllocator::new(repo.clone(), "NOV", 64, Duration::from_millis(2));

        let mut handles = Vec::new();
        for _ in 0..N {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                allocator.allocate_and_create(owner_id, TicketFields::default()).await
            }));
        }

        let mut nums = BTreeSet::new();
        for handle in handles {
            let ticket = handle.await.unwrap().unwrap();
            assert!(nums.insert(ticket.ticket_num), "número duplicado {}", ticket.ticket_num);
            assert_eq!(ticket.custom_id, format!("PEP-{:05}", ticket.ticket_num));
        }
        assert_eq!(nums, (1..=N).collect::<BTreeSet<i64>>());

        // Sem limite (LIMIT NULL) e ordenado por created_at desc
        let all = repo
            .query_tickets(&TicketQuery {
                scope: TicketScope::OwnTickets(owner_id),
                created_from: None,
                created_to: None,
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(all.len() as i64, N);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert!(all.iter().all(|t| t.owner_id == owner_id));
    }
}
