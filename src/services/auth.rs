// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::AccountStore,
    models::auth::{Claims, NewUser, Principal, User, ROLE_ADMIN, ROLE_CLIENT},
    services::access_policy::AccessPolicy,
};

const MIN_PASSWORD_CHARS: usize = 6;

/// "mario garcía" -> "mariogarca@novapack.com". Com '@' o valor é usado como está.
pub fn email_for_login(input: &str, login_domain: &str) -> String {
    let input = input.trim();
    if input.contains('@') {
        return input.to_string();
    }

    let local: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect::<String>()
        .to_lowercase();
    format!("{}@{}", local, login_domain)
}

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    policy: AccessPolicy,
    jwt_secret: String,
    login_domain: String,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        policy: AccessPolicy,
        jwt_secret: impl Into<String>,
        login_domain: impl Into<String>,
    ) -> Self {
        Self {
            accounts,
            policy,
            jwt_secret: jwt_secret.into(),
            login_domain: login_domain.into(),
        }
    }

    async fn hash_password(password: &str) -> Result<String, AppError> {
        let password_clone = password.to_owned();
        let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
        Ok(hashed)
    }

    pub async fn register_user(&self, username: &str, password: &str) -> Result<String, AppError> {
        // 1. Senha mínima
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AppError::WeakPassword);
        }

        // 2. E-mail derivado do username (mesma regra do login)
        let username = username.trim();
        let email = email_for_login(username, &self.login_domain);

        // O e-mail do administrador é reservado: a conta só nasce no bootstrap
        if email.eq_ignore_ascii_case(self.policy.admin_email()) {
            tracing::warn!("⚠️ Tentativa de registrar o e-mail reservado {}", email);
            return Err(AppError::EmailAlreadyExists);
        }

        // 3. Hash fora do runtime async
        let password_hash = Self::hash_password(password).await?;

        // 4. Conta + perfil no mesmo registro
        let user = self
            .accounts
            .create_user(NewUser {
                email,
                username: Some(username.to_string()),
                role: ROLE_CLIENT.to_string(),
                password_hash,
            })
            .await?;

        tracing::info!("👤 Conta criada: {} ({})", user.email, user.role);
        self.create_token(user.id)
    }

    pub async fn login_user(&self, username: &str, password: &str) -> Result<String, AppError> {
        let email = email_for_login(username, &self.login_domain);
        let user = self
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || {
            verify(&password_clone, &password_hash_clone)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::WrongPassword);
        }

        self.create_token(user.id)
    }

    /// Token -> usuário relido do armazenamento -> papel resolvido agora.
    pub async fn validate_token(&self, token: &str) -> Result<Principal, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        let user = self
            .accounts
            .find_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        Ok(self.policy.principal_for(&user))
    }

    /// Cria a conta do administrador na inicialização, se ainda não existir.
    /// Sem username de perfil: o prefixo dos seus albaranes é o padrão.
    pub async fn bootstrap_admin(&self, password: &str) -> Result<Option<User>, AppError> {
        let email = self.policy.admin_email().to_string();
        if self.accounts.find_by_email(&email).await?.is_some() {
            return Ok(None);
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AppError::WeakPassword);
        }

        let password_hash = Self::hash_password(password).await?;
        let admin = self
            .accounts
            .create_user(NewUser {
                email,
                username: None,
                role: ROLE_ADMIN.to_string(),
                password_hash,
            })
            .await?;

        tracing::info!("🔑 Conta de administrador criada: {}", admin.email);
        Ok(Some(admin))
    }

    fn create_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(7);

        let claims = Claims {
            sub: user_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{store::AccountStore, MemoryStore},
        models::auth::Role,
    };

    fn service(store: &MemoryStore) -> AuthService {
        AuthService::new(
            Arc::new(store.clone()),
            AccessPolicy::new("admin@novapack.com"),
            "segredo-de-teste",
            "novapack.com",
        )
    }

    #[test]
    fn login_email_derivation() {
        assert_eq!(email_for_login("MarioGarcia", "novapack.com"), "mariogarcia@novapack.com");
        assert_eq!(email_for_login(" mario garcía! ", "novapack.com"), "mariogarca@novapack.com");
        assert_eq!(email_for_login("j.perez_2-b", "novapack.com"), "j.perez_2-b@novapack.com");
        assert_eq!(email_for_login("Ana@Empresa.es", "novapack.com"), "Ana@Empresa.es");
    }

    #[tokio::test]
    async fn register_then_login_resolves_a_client() {
        let store = MemoryStore::new();
        let auth = service(&store);

        let token = auth.register_user(" mariogarcia ", "secreto1").await.unwrap();
        let principal = auth.validate_token(&token).await.unwrap();
        assert_eq!(principal.email, "mariogarcia@novapack.com");
        assert_eq!(principal.username.as_deref(), Some("mariogarcia"));
        assert_eq!(principal.role, Role::Client);

        let token = auth.login_user("MarioGarcia", "secreto1").await.unwrap();
        assert_eq!(auth.validate_token(&token).await.unwrap().id, principal.id);
    }

    #[tokio::test]
    async fn auth_errors_are_distinguished() {
        let store = MemoryStore::new();
        let auth = service(&store);
        auth.register_user("ana", "secreto1").await.unwrap();

        assert!(matches!(auth.register_user("bea", "12345").await, Err(AppError::WeakPassword)));
        assert!(matches!(auth.register_user("ANA", "secreto1").await, Err(AppError::EmailAlreadyExists)));
        assert!(matches!(auth.login_user("nadie", "secreto1").await, Err(AppError::UserNotFound)));
        assert!(matches!(auth.login_user("ana", "otra-clave").await, Err(AppError::WrongPassword)));
        assert!(matches!(auth.validate_token("no-es-un-jwt").await, Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn administrator_email_cannot_be_registered() {
        let store = MemoryStore::new();
        let auth = service(&store);

        for input in ["admin", "Admin", "admin@novapack.com", "ADMIN@novapack.com"] {
            assert!(matches!(
                auth.register_user(input, "secreto1").await,
                Err(AppError::EmailAlreadyExists)
            ));
        }
        assert!(store.find_by_email("admin@novapack.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bootstrap_creates_the_administrator_once() {
        let store = MemoryStore::new();
        let auth = service(&store);

        let admin = auth.bootstrap_admin("clave-admin").await.unwrap().unwrap();
        assert_eq!(admin.username, None);
        assert!(auth.bootstrap_admin("clave-admin").await.unwrap().is_none());

        let token = auth.login_user("admin", "clave-admin").await.unwrap();
        assert_eq!(auth.validate_token(&token).await.unwrap().role, Role::Administrator);
    }
}
