// src/models/destination.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

// Entrada da agenda de destinos. Só serve para autocompletar o formulário.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub id: Uuid,
    #[schema(ignore)]
    pub owner_id: Uuid,
    #[schema(example = "Lucía Martín")]
    pub name: String,
    #[schema(example = "C/ Mayor 12, 28013 Madrid")]
    pub address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDestinationPayload {
    #[validate(length(min = 1, max = 200, message = "El nombre es obligatorio."))]
    pub name: String,
    #[validate(length(min = 1, max = 500, message = "La dirección es obligatoria."))]
    pub address: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchDestinationsQuery {
    /// Texto para autocompletar (mínimo 2 caracteres)
    pub q: Option<String>,
}
