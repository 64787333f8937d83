// src/services/ticket_service.rs

use std::sync::Arc;

use crate::{
    common::error::AppError,
    db::store::TicketStore,
    models::{
        auth::Principal,
        ticket::{ShareLinks, Ticket, TicketDraft, TicketKey},
    },
    services::{
        access_policy::AccessPolicy,
        allocator::TicketAllocator,
        destination_service::DestinationService,
        document_service::DocumentService,
        share,
    },
};

/// Ciclo de vida do albarán: criar, ler, editar, apagar, imprimir, compartilhar.
/// Toda operação sobre uma chave passa pela política de acesso antes do armazenamento.
#[derive(Clone)]
pub struct TicketService {
    store: Arc<dyn TicketStore>,
    policy: AccessPolicy,
    allocator: TicketAllocator,
    destinations: DestinationService,
    documents: DocumentService,
    brand: String,
}

impl TicketService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        policy: AccessPolicy,
        allocator: TicketAllocator,
        destinations: DestinationService,
        documents: DocumentService,
        brand: impl Into<String>,
    ) -> Self {
        Self { store, policy, allocator, destinations, documents, brand: brand.into() }
    }

    /// Cria sempre na subárvore do próprio principal.
    /// Remetente em branco => nome de exibição de quem cria.
    pub async fn create(
        &self,
        principal: &Principal,
        mut draft: TicketDraft,
        save_destination: bool,
    ) -> Result<Ticket, AppError> {
        if draft.sender.as_deref().is_none_or(|s| s.trim().is_empty()) {
            draft.sender = Some(principal.display_name());
        }
        let fields = draft.into_fields();
        let ticket = self.allocator.allocate_and_create(principal.id, fields).await?;

        // Melhor esforço: falha na agenda não desfaz o albarán
        if save_destination {
            if let Err(e) = self
                .destinations
                .save_if_new(principal.id, &ticket.fields.receiver, &ticket.fields.address)
                .await
            {
                tracing::warn!("Não foi possível guardar o destino de {}: {}", ticket.custom_id, e);
            }
        }

        Ok(ticket)
    }

    pub async fn get(&self, principal: &Principal, key: &TicketKey) -> Result<Ticket, AppError> {
        self.policy.authorize_read(principal, key)?;
        self.store
            .get_ticket(key)
            .await?
            .ok_or_else(|| AppError::TicketNotFound(key.custom_id.clone()))
    }

    /// Edita no lugar, na subárvore do dono da chave (não na de quem edita).
    pub async fn update(
        &self,
        principal: &Principal,
        key: &TicketKey,
        draft: TicketDraft,
    ) -> Result<Ticket, AppError> {
        self.policy.authorize_mutation(principal, key)?;
        let ticket = self.store.update_ticket(key, &draft.into_fields()).await?;
        tracing::info!("✏️ Albarán {} atualizado por {}", key, principal.id);
        Ok(ticket)
    }

    pub async fn delete(&self, principal: &Principal, key: &TicketKey) -> Result<(), AppError> {
        self.policy.authorize_mutation(principal, key)?;
        self.store.delete_ticket(key).await?;
        tracing::info!("🗑️ Albarán {} apagado por {}", key, principal.id);
        Ok(())
    }

    /// PDF do albarán. A primeira impressão bem-sucedida marca `printed`.
    pub async fn print_delivery_note(
        &self,
        principal: &Principal,
        key: &TicketKey,
    ) -> Result<(Ticket, Vec<u8>), AppError> {
        self.policy.authorize_mutation(principal, key)?;
        let mut ticket = self.get(principal, key).await?;

        let pdf = self.documents.delivery_note_pdf(&ticket)?;

        if !ticket.printed {
            self.store.mark_printed(&ticket.key()).await?;
            ticket.printed = true;
        }
        Ok((ticket, pdf))
    }

    pub async fn print_label(
        &self,
        principal: &Principal,
        key: &TicketKey,
    ) -> Result<(Ticket, Vec<u8>), AppError> {
        let ticket = self.get(principal, key).await?;
        let pdf = self.documents.label_pdf(&ticket)?;
        Ok((ticket, pdf))
    }

    pub async fn share_links(&self, principal: &Principal, key: &TicketKey) -> Result<ShareLinks, AppError> {
        let ticket = self.get(principal, key).await?;
        Ok(share::share_links(&ticket, &self.brand))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::{
        db::{store::AccountStore, MemoryStore},
        models::{
            auth::{NewUser, Role, ROLE_CLIENT},
            ticket::{TicketStatus, DEFAULT_SENDER},
        },
    };

    struct Fixture {
        store: MemoryStore,
        service: TicketService,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let shared: Arc<dyn TicketStore> = Arc::new(store.clone());
        let allocator = TicketAllocator::new(shared.clone(), "NOV", 5, Duration::from_millis(1));
        let service = TicketService::new(
            shared.clone(),
            AccessPolicy::new("admin@novapack.com"),
            allocator,
            DestinationService::new(shared),
            DocumentService::new("/sin/fuentes", "NOVAPACK"),
            "NOVAPACK",
        );
        Fixture { store, service }
    }

    async fn client(store: &MemoryStore, username: &str) -> Principal {
        let user = store
            .create_user(NewUser {
                email: format!("{}@novapack.com", username),
                username: Some(username.to_string()),
                role: ROLE_CLIENT.to_string(),
                password_hash: String::new(),
            })
            .await
            .unwrap();
        Principal { id: user.id, email: user.email, username: user.username, role: Role::Client }
    }

    fn admin() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: "admin@novapack.com".into(),
            username: None,
            role: Role::Administrator,
        }
    }

    fn draft(receiver: &str) -> TicketDraft {
        TicketDraft {
            receiver: Some(receiver.into()),
            address: Some("C/ Mayor 12".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn administrator_edit_stays_in_owner_subtree() {
        let fx = fixture();
        let bea = client(&fx.store, "beatriz").await;
        let created = fx.service.create(&bea, draft("Lucía"), false).await.unwrap();
        let admin = admin();

        let edited = fx
            .service
            .update(
                &admin,
                &created.key(),
                TicketDraft { status: Some(TicketStatus::Delivered), ..draft("Lucía Martín") },
            )
            .await
            .unwrap();

        assert_eq!(edited.owner_id, bea.id);
        assert_eq!(edited.custom_id, "BEA-00001");
        assert_eq!(edited.ticket_num, created.ticket_num);
        assert_eq!(edited.created_at, created.created_at);
        assert_eq!(edited.fields.status, TicketStatus::Delivered);
        assert_eq!(fx.store.ticket_count(bea.id).await, 1);
        assert_eq!(fx.store.ticket_count(admin.id).await, 0);
    }

    #[tokio::test]
    async fn client_cannot_touch_another_owners_ticket() {
        let fx = fixture();
        let ana = client(&fx.store, "ana").await;
        let bea = client(&fx.store, "beatriz").await;
        let ticket = fx.service.create(&bea, draft("Lucía"), false).await.unwrap();

        let key = ticket.key();
        assert!(matches!(fx.service.get(&ana, &key).await, Err(AppError::Forbidden(_))));
        assert!(matches!(
            fx.service.update(&ana, &key, draft("Otro")).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(fx.service.delete(&ana, &key).await, Err(AppError::Forbidden(_))));
        assert_eq!(fx.store.ticket_count(bea.id).await, 1);
    }

    #[tokio::test]
    async fn update_of_deleted_ticket_is_not_found() {
        let fx = fixture();
        let ana = client(&fx.store, "ana").await;
        let ticket = fx.service.create(&ana, draft("Lucía"), false).await.unwrap();

        fx.service.delete(&ana, &ticket.key()).await.unwrap();

        let err = fx.service.update(&ana, &ticket.key(), draft("Lucía")).await.unwrap_err();
        assert!(matches!(err, AppError::TicketNotFound(_)));
        assert_eq!(fx.store.counter(ana.id).await.current, 1);
    }

    #[tokio::test]
    async fn create_can_save_the_destination() {
        let fx = fixture();
        let ana = client(&fx.store, "ana").await;

        fx.service.create(&ana, draft("Lucía"), true).await.unwrap();
        fx.service.create(&ana, draft("lucía"), true).await.unwrap();
        fx.service.create(&ana, draft("Pedro"), false).await.unwrap();

        let saved = fx.store.list_destinations(ana.id).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, "Lucía");
    }

    #[tokio::test]
    async fn blank_sender_defaults_to_the_creator() {
        let fx = fixture();
        let mario = client(&fx.store, "mariogarcia").await;

        let ticket = fx.service.create(&mario, draft("Lucía"), false).await.unwrap();
        assert_eq!(ticket.fields.sender, "Mariogarcia");

        let typed = TicketDraft { sender: Some("  Talleres Pérez ".into()), ..draft("Lucía") };
        let ticket = fx.service.create(&mario, typed, false).await.unwrap();
        assert_eq!(ticket.fields.sender, "Talleres Pérez");

        // Sem username de perfil: parte local do e-mail
        let created = fx.service.create(&admin(), draft("Lucía"), false).await.unwrap();
        assert_eq!(created.fields.sender, "Admin");

        // A edição não reaplica o nome de quem edita
        let edited = fx.service.update(&mario, &ticket.key(), draft("Lucía")).await.unwrap();
        assert_eq!(edited.fields.sender, DEFAULT_SENDER);
    }

    #[tokio::test]
    async fn failed_print_does_not_mark_printed() {
        let fx = fixture();
        let ana = client(&fx.store, "ana").await;
        let ticket = fx.service.create(&ana, draft("Lucía"), false).await.unwrap();

        // Sem fontes => o PDF falha
        let err = fx.service.print_delivery_note(&ana, &ticket.key()).await.unwrap_err();
        assert!(matches!(err, AppError::FontNotFound(_)));
        assert!(!fx.service.get(&ana, &ticket.key()).await.unwrap().printed);
    }

    #[tokio::test]
    async fn share_links_reference_the_custom_id() {
        let fx = fixture();
        let ana = client(&fx.store, "ana").await;
        let ticket = fx.service.create(&ana, draft("Lucía"), false).await.unwrap();

        let links = fx.service.share_links(&admin(), &ticket.key()).await.unwrap();
        assert!(links.whatsapp_url.contains("ANA-00001"));
    }
}
