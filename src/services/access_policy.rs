// src/services/access_policy.rs

use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{Principal, Role, User, ROLE_ADMIN},
        ticket::TicketKey,
    },
};

/// Conjunto de albaranes que uma consulta pode abranger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    OwnTickets(Uuid),
    AllTickets,
}

impl TicketScope {
    pub fn label(&self) -> &'static str {
        match self {
            TicketScope::OwnTickets(_) => "own",
            TicketScope::AllTickets => "all",
        }
    }
}

/// Decide quem vê e quem altera o quê. Dois papéis apenas: cliente e administrador.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    admin_email: String,
}

impl AccessPolicy {
    pub fn new(admin_email: impl Into<String>) -> Self {
        Self { admin_email: admin_email.into() }
    }

    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    /// Resolvido no servidor na autenticação: papel gravado OU e-mail de administrador configurado.
    pub fn resolve_role(&self, user: &User) -> Role {
        if user.role == ROLE_ADMIN || user.email == self.admin_email {
            Role::Administrator
        } else {
            Role::Client
        }
    }

    pub fn principal_for(&self, user: &User) -> Principal {
        Principal {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: self.resolve_role(user),
        }
    }

    pub fn is_administrator(&self, principal: &Principal) -> bool {
        principal.role == Role::Administrator
    }

    pub fn scope_for(&self, principal: &Principal) -> TicketScope {
        if self.is_administrator(principal) {
            TicketScope::AllTickets
        } else {
            TicketScope::OwnTickets(principal.id)
        }
    }

    pub fn authorize_read(&self, principal: &Principal, key: &TicketKey) -> Result<(), AppError> {
        self.authorize(principal, key, "leer")
    }

    /// Regra do lado do servidor: só o dono ou o administrador alteram um albarán.
    pub fn authorize_mutation(&self, principal: &Principal, key: &TicketKey) -> Result<(), AppError> {
        self.authorize(principal, key, "modificar")
    }

    fn authorize(&self, principal: &Principal, key: &TicketKey, action: &str) -> Result<(), AppError> {
        if self.is_administrator(principal) || key.owner_id == principal.id {
            return Ok(());
        }

        tracing::warn!(
            "⛔ {} tentou {} o albarán {} de outro dono",
            principal.id,
            action,
            key
        );
        Err(AppError::Forbidden(format!("{} {}", action, key)))
    }
}
