// src/services/destination_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{common::error::AppError, db::store::TicketStore, models::destination::Destination};

// Abaixo disso o autocompletar não dispara
const MIN_QUERY_CHARS: usize = 2;

/// Agenda de destinos do usuário. Cache de conveniência, sem vínculo transacional
/// com os albaranes.
#[derive(Clone)]
pub struct DestinationService {
    store: Arc<dyn TicketStore>,
}

impl DestinationService {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<Destination>, AppError> {
        self.store.list_destinations(owner_id).await
    }

    /// Autocompletar: nome contém `q` (sem diferenciar maiúsculas).
    pub async fn search(&self, owner_id: Uuid, q: &str) -> Result<Vec<Destination>, AppError> {
        let needle = q.trim().to_lowercase();
        if needle.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }

        let all = self.store.list_destinations(owner_id).await?;
        Ok(all
            .into_iter()
            .filter(|d| d.name.to_lowercase().contains(&needle))
            .collect())
    }

    /// Grava se ainda não houver um destino com o mesmo nome. `None` = já existia.
    pub async fn save_if_new(
        &self,
        owner_id: Uuid,
        name: &str,
        address: &str,
    ) -> Result<Option<Destination>, AppError> {
        let name = name.trim();
        let existing = self.store.list_destinations(owner_id).await?;
        if existing.iter().any(|d| d.name.to_lowercase() == name.to_lowercase()) {
            return Ok(None);
        }

        let saved = self.store.add_destination(owner_id, name, address.trim()).await?;
        tracing::info!("📇 Destino '{}' guardado para {}", saved.name, owner_id);
        Ok(Some(saved))
    }
}
