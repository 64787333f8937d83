// src/db/store.rs
//
// Os "serviços externos" que o núcleo consome: contas/perfis e o armazenamento
// de albaranes. Existem duas implementações: PostgreSQL (user_repo / ticket_repo)
// e em memória (memory.rs), usada em desenvolvimento local e nos testes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{NewUser, User},
        destination::Destination,
        ticket::{NewTicket, Ticket, TicketFields, TicketKey},
    },
    services::access_policy::TicketScope,
};

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Falha com `EmailAlreadyExists` se o e-mail já estiver em uso.
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError>;
}

/// Contador de um dono: último ticket_num entregue + versão para o controle otimista.
/// Contador inexistente = `{ current: 0, version: 0 }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterState {
    pub current: i64,
    pub version: i64,
}

/// O conjunto de leitura da alocação: perfil do dono + contador, lidos juntos.
#[derive(Debug, Clone, Default)]
pub struct AllocationSnapshot {
    pub username: Option<String>,
    pub counter: CounterState,
}

#[derive(Debug, Clone)]
pub enum CommitOutcome {
    Committed(Ticket),
    /// A versão do contador mudou desde a leitura; nada foi gravado.
    Conflict,
}

/// Consulta já com o escopo decidido pela política de acesso.
#[derive(Debug, Clone)]
pub struct TicketQuery {
    pub scope: TicketScope,
    /// Limites inclusivos sobre created_at.
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn load_allocation_snapshot(&self, owner_id: Uuid) -> Result<AllocationSnapshot, AppError>;

    /// Grava o albarán e avança o contador para `ticket.ticket_num` atomicamente,
    /// somente se a versão do contador ainda for `expected_version`.
    /// Um albarán já existente na mesma chave é erro (`TicketAlreadyExists`), nunca sobrescrito.
    async fn commit_allocation(
        &self,
        ticket: NewTicket,
        expected_version: i64,
    ) -> Result<CommitOutcome, AppError>;

    async fn get_ticket(&self, key: &TicketKey) -> Result<Option<Ticket>, AppError>;

    /// Atualização condicional: `TicketNotFound` se a chave não existir.
    async fn update_ticket(&self, key: &TicketKey, fields: &TicketFields) -> Result<Ticket, AppError>;

    async fn mark_printed(&self, key: &TicketKey) -> Result<(), AppError>;

    /// Não toca no contador.
    async fn delete_ticket(&self, key: &TicketKey) -> Result<(), AppError>;

    /// Ordenado por created_at desc (desempate por custom_id desc).
    async fn query_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>, AppError>;

    async fn list_destinations(&self, owner_id: Uuid) -> Result<Vec<Destination>, AppError>;

    async fn add_destination(
        &self,
        owner_id: Uuid,
        name: &str,
        address: &str,
    ) -> Result<Destination, AppError>;
}
