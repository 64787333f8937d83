// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Papel guardado no registro do usuário ("client" | "admin")
pub const ROLE_CLIENT: &str = "client";
pub const ROLE_ADMIN: &str = "admin";

// Representa um usuário (conta + perfil) vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[schema(example = "mariogarcia@novapack.com")]
    pub email: String,

    // Conta sem perfil => None (o prefixo do albarán cai no padrão)
    #[schema(example = "mariogarcia")]
    pub username: Option<String>,

    #[schema(example = "client")]
    pub role: String,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    #[schema(ignore)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Dados para criar uma conta (já com hash)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: Option<String>,
    pub role: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Role {
    Client,
    Administrator,
}

// A identidade autenticada de uma requisição. O papel é resolvido no servidor
// (AccessPolicy::resolve_role), nunca a partir de um campo editável pelo cliente.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub role: Role,
}

impl Principal {
    /// Nome para exibição: o username do perfil ou a parte local do e-mail, capitalizada.
    pub fn display_name(&self) -> String {
        let raw = match &self.username {
            Some(name) if !name.trim().is_empty() => name.trim(),
            _ => self.email.split('@').next().unwrap_or_default(),
        };
        let mut chars = raw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

// Dados para registro de um novo usuário
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUserPayload {
    #[validate(length(min = 1, max = 64, message = "El nombre de usuario es obligatorio."))]
    #[schema(example = "mariogarcia")]
    pub username: String,
    // O tamanho mínimo é conferido no serviço (WeakPassword)
    #[schema(example = "secreto123")]
    pub password: String,
}

// Dados para login: "usuario" ou e-mail completo
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserPayload {
    #[validate(length(min = 1, max = 254, message = "El usuario es obligatorio."))]
    #[schema(example = "mariogarcia")]
    pub username: String,
    #[validate(length(min = 1, message = "La contraseña es obligatoria."))]
    pub password: String,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário)
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}
