// src/models/ticket.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// Valores padrão do formulário original
pub const DEFAULT_SENDER: &str = "Remitente Desconocido";
pub const DEFAULT_RECEIVER: &str = "Destinatario Desconocido";
pub const DEFAULT_ADDRESS: &str = "Sin Dirección";
pub const DEFAULT_WEIGHT: &str = "0kg";
pub const DEFAULT_SIZE: &str = "Estándar";
pub const DEFAULT_SHIPPING_TYPE: &str = "Pagados";

// ---
// 1. Chave composta (dono, custom_id)
// ---
// O dono vem SEMPRE da chave de armazenamento, nunca de client_id/client_username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketKey {
    pub owner_id: Uuid,
    #[schema(example = "MAR-00007")]
    pub custom_id: String,
}

impl TicketKey {
    pub fn new(owner_id: Uuid, custom_id: impl Into<String>) -> Self {
        Self { owner_id, custom_id: custom_id.into() }
    }
}

impl fmt::Display for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.custom_id)
    }
}

// ---
// 2. Estado
// ---
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    #[default]
    Pending,
    Delivered,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Delivered => "delivered",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TicketStatus::Pending),
            "delivered" => Ok(TicketStatus::Delivered),
            other => Err(anyhow::anyhow!("Estado de albarán desconhecido: {}", other)),
        }
    }
}

// ---
// 3. Campos editáveis (já normalizados)
// ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketFields {
    #[schema(example = "Talleres Pérez")]
    pub sender: String,
    #[schema(example = "Lucía Martín")]
    pub receiver: String,
    #[schema(example = "C/ Mayor 12, 28013 Madrid")]
    pub address: String,
    #[schema(example = 2)]
    pub packages: i32,
    #[schema(example = "5kg")]
    pub weight: String,
    #[schema(example = "Mediano")]
    pub size: String,
    #[schema(example = "Pagados")]
    pub shipping_type: String,
    #[schema(example = "25.50")]
    pub cod: Option<Decimal>,
    pub notes: String,
    pub status: TicketStatus,
}

impl Default for TicketFields {
    fn default() -> Self {
        TicketDraft::default().into_fields()
    }
}

// ---
// 4. Rascunho (o "formulário" da API)
// ---
// Campos ausentes ou em branco recebem os valores padrão.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketDraft {
    #[validate(length(max = 200, message = "Remitente demasiado largo."))]
    pub sender: Option<String>,

    #[validate(length(max = 200, message = "Destinatario demasiado largo."))]
    pub receiver: Option<String>,

    #[validate(length(max = 500, message = "Dirección demasiado larga."))]
    pub address: Option<String>,

    #[schema(example = 1)]
    pub packages: Option<i32>,

    #[validate(length(max = 50))]
    pub weight: Option<String>,

    #[validate(length(max = 50))]
    pub size: Option<String>,

    #[validate(length(max = 50))]
    pub shipping_type: Option<String>,

    #[validate(custom(function = "validate_cod"))]
    pub cod: Option<Decimal>,

    #[validate(length(max = 2000, message = "Notas demasiado largas."))]
    pub notes: Option<String>,

    pub status: Option<TicketStatus>,
}

fn validate_cod(cod: &Decimal) -> Result<(), ValidationError> {
    if cod.is_sign_negative() {
        let mut err = ValidationError::new("cod_negative");
        err.message = Some("El reembolso no puede ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

fn or_default(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

impl TicketDraft {
    pub fn into_fields(self) -> TicketFields {
        TicketFields {
            sender: or_default(self.sender, DEFAULT_SENDER),
            receiver: or_default(self.receiver, DEFAULT_RECEIVER),
            address: or_default(self.address, DEFAULT_ADDRESS),
            packages: self.packages.filter(|p| *p > 0).unwrap_or(1),
            weight: or_default(self.weight, DEFAULT_WEIGHT),
            size: or_default(self.size, DEFAULT_SIZE),
            shipping_type: or_default(self.shipping_type, DEFAULT_SHIPPING_TYPE),
            cod: self.cod.filter(|c| !c.is_zero()),
            notes: self.notes.map(|n| n.trim().to_string()).unwrap_or_default(),
            status: self.status.unwrap_or_default(),
        }
    }
}

// ---
// 5. Albarán carimbado pelo alocador, aguardando o commit
// ---
// created_at e printed são atribuídos pelo armazenamento.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub key: TicketKey,
    pub ticket_num: i64,
    pub fields: TicketFields,
    pub client_id: Uuid,
    pub client_username: Option<String>,
}

// ---
// 6. Albarán persistido
// ---
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub owner_id: Uuid,
    #[schema(example = "MAR-00007")]
    pub custom_id: String,
    #[schema(example = 7)]
    pub ticket_num: i64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: TicketFields,
    pub printed: bool,
    // Pistas desnormalizadas para a visão do administrador. Nunca usadas para acesso.
    pub client_id: Uuid,
    pub client_username: Option<String>,
}

impl Ticket {
    pub fn key(&self) -> TicketKey {
        TicketKey::new(self.owner_id, self.custom_id.clone())
    }

    pub fn from_new(new_ticket: NewTicket, created_at: DateTime<Utc>) -> Self {
        Self {
            owner_id: new_ticket.key.owner_id,
            custom_id: new_ticket.key.custom_id,
            ticket_num: new_ticket.ticket_num,
            created_at,
            fields: new_ticket.fields,
            printed: false,
            client_id: new_ticket.client_id,
            client_username: new_ticket.client_username,
        }
    }
}

// ---
// 7. Payloads / respostas
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketPayload {
    #[serde(flatten)]
    #[validate(nested)]
    pub draft: TicketDraft,

    // Guarda o destinatário na agenda (melhor esforço)
    #[serde(default)]
    pub save_destination: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTicketsQuery {
    /// Dia no formato YYYY-MM-DD. Sem data => os 50 mais recentes.
    #[param(example = "2024-03-15")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketDayGroup {
    pub date: NaiveDate,
    #[schema(example = "viernes, 15 de marzo de 2024")]
    pub label: String,
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketListing {
    #[schema(example = "own")]
    pub scope: String,
    pub total: usize,
    pub groups: Vec<TicketDayGroup>,
}

#[cfg(test)]
impl TicketListing {
    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.groups.iter().flat_map(|g| g.tickets.iter())
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinks {
    pub whatsapp_url: String,
    pub mailto_url: String,
}
