// src/services/query_service.rs

use std::sync::Arc;

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};

use crate::{
    common::error::AppError,
    db::store::{TicketQuery, TicketStore},
    models::{
        auth::Principal,
        ticket::{Ticket, TicketDayGroup, TicketListing},
    },
    services::access_policy::{AccessPolicy, TicketScope},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketFilter {
    /// Os mais recentes (limitados).
    Recent,
    /// Um dia civil no fuso local, sem limite.
    Day(NaiveDate),
}

impl From<Option<NaiveDate>> for TicketFilter {
    fn from(date: Option<NaiveDate>) -> Self {
        date.map(TicketFilter::Day).unwrap_or(TicketFilter::Recent)
    }
}

// Maior salto de horário de verão considerado ao procurar um instante válido
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Primeiro instante válido a partir de `naive`. Dentro de um buraco de
/// horário de verão (meia-noite que não existe) avança até o fim do buraco.
fn first_valid_from<T>(
    naive: NaiveDateTime,
    resolve: impl Fn(&NaiveDateTime) -> LocalResult<T>,
) -> Option<T> {
    (0..=MAX_GAP_MINUTES).find_map(|m| resolve(&(naive + TimeDelta::minutes(m))).earliest())
}

/// Último instante válido até `naive` (mesma regra, recuando).
fn last_valid_until<T>(
    naive: NaiveDateTime,
    resolve: impl Fn(&NaiveDateTime) -> LocalResult<T>,
) -> Option<T> {
    (0..=MAX_GAP_MINUTES).find_map(|m| resolve(&(naive - TimeDelta::minutes(m))).latest())
}

/// [00:00:00.000, 23:59:59.999] do dia, no fuso local, convertidos para UTC.
pub fn day_window(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let invalid = || AppError::QueryFailed(format!("fecha inválida {}", date));

    let start = date.and_hms_milli_opt(0, 0, 0, 0).ok_or_else(invalid)?;
    let end = date.and_hms_milli_opt(23, 59, 59, 999).ok_or_else(invalid)?;

    let start = first_valid_from(start, |t| Local.from_local_datetime(t)).ok_or_else(invalid)?;
    let end = last_valid_until(end, |t| Local.from_local_datetime(t)).ok_or_else(invalid)?;

    Ok((start.with_timezone(&Utc), end.with_timezone(&Utc)))
}

/// Rótulo do dia, por idioma. Espanhol é o padrão do produto.
pub fn day_label(created_at: DateTime<Utc>, lang: &str) -> String {
    let local = created_at.with_timezone(&Local);
    match lang {
        "en" => local
            .format_localized("%A, %B %-d, %Y", chrono::Locale::en_US)
            .to_string(),
        "pt" => local
            .format_localized("%A, %-d de %B de %Y", chrono::Locale::pt_BR)
            .to_string(),
        _ => local
            .format_localized("%A, %-d de %B de %Y", chrono::Locale::es_ES)
            .to_string(),
    }
}

#[derive(Clone)]
pub struct TicketQueryService {
    store: Arc<dyn TicketStore>,
    policy: AccessPolicy,
    recent_limit: i64,
}

impl TicketQueryService {
    pub fn new(store: Arc<dyn TicketStore>, policy: AccessPolicy, recent_limit: i64) -> Self {
        Self { store, policy, recent_limit }
    }

    pub async fn list(
        &self,
        principal: &Principal,
        filter: TicketFilter,
        lang: &str,
    ) -> Result<TicketListing, AppError> {
        // 1. Escopo decidido pela política, nunca pelo chamador
        let scope = self.policy.scope_for(principal);

        // 2. Janela / limite
        let query = match filter {
            TicketFilter::Recent => TicketQuery {
                scope,
                created_from: None,
                created_to: None,
                limit: Some(self.recent_limit),
            },
            TicketFilter::Day(date) => {
                let (from, to) = day_window(date)?;
                TicketQuery { scope, created_from: Some(from), created_to: Some(to), limit: None }
            }
        };

        // 3. Consulta (sem retry, sem resultado parcial)
        let mut tickets = self.store.query_tickets(&query).await.map_err(|e| {
            tracing::error!("Falha ao consultar albaranes ({}): {}", scope.label(), e);
            match e {
                AppError::QueryFailed(reason) => AppError::QueryFailed(reason),
                AppError::DatabaseError(db) => AppError::QueryFailed(db.to_string()),
                other => AppError::QueryFailed(other.to_string()),
            }
        })?;

        // 4. Registros de outro dono não passam no escopo próprio
        if let TicketScope::OwnTickets(owner_id) = scope {
            let before = tickets.len();
            tickets.retain(|t| t.owner_id == owner_id);
            if tickets.len() != before {
                tracing::warn!(
                    "Descartados {} albaranes de outro dono na listagem de {}",
                    before - tickets.len(),
                    owner_id
                );
            }
        }

        // 5. Ordem estrita antes de agrupar
        tickets.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.custom_id.cmp(&a.custom_id))
        });

        let total = tickets.len();
        Ok(TicketListing {
            scope: scope.label().to_string(),
            total,
            groups: group_by_day(tickets, lang),
        })
    }
}

// Sequências contíguas com o mesmo rótulo de dia.
fn group_by_day(tickets: Vec<Ticket>, lang: &str) -> Vec<TicketDayGroup> {
    let mut groups: Vec<TicketDayGroup> = Vec::new();

    for ticket in tickets {
        let label = day_label(ticket.created_at, lang);
        match groups.last_mut() {
            Some(group) if group.label == label => group.tickets.push(ticket),
            _ => groups.push(TicketDayGroup {
                date: ticket.created_at.with_timezone(&Local).date_naive(),
                label,
                tickets: vec![ticket],
            }),
        }
    }

    groups
}
