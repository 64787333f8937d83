// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{AccountStore, MemoryStore, TicketRepository, TicketStore, UserRepository},
    services::{
        access_policy::AccessPolicy, allocator::TicketAllocator, auth::AuthService,
        destination_service::DestinationService, document_service::DocumentService,
        query_service::TicketQueryService, ticket_service::TicketService,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow!("STORE_BACKEND inválido: {}", other)),
        }
    }
}

// Tudo que vem do ambiente (.env)
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub admin_email: String,
    pub admin_password: Option<String>,
    pub login_domain: String,
    pub ticket_prefix_fallback: String,
    pub allocation_max_attempts: u32,
    pub allocation_backoff: Duration,
    pub recent_tickets_limit: i64,
    pub fonts_dir: String,
    pub brand_name: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        fn parsed<T: FromStr>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
        where
            T::Err: std::fmt::Display,
        {
            match raw {
                Some(v) => v
                    .trim()
                    .parse()
                    .map_err(|e| anyhow!("{} inválido ({}): {}", key, v, e)),
                None => Ok(default),
            }
        }

        let store_backend = parsed("STORE_BACKEND", var("STORE_BACKEND"), StoreBackend::Postgres)?;
        let database_url = var("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL deve ser definida"));
        }

        Ok(Self {
            store_backend,
            database_url,
            jwt_secret: var("JWT_SECRET").context("JWT_SECRET deve ser definido")?,
            bind_addr: or("BIND_ADDR", "0.0.0.0:3000"),
            admin_email: or("ADMIN_EMAIL", "admin@novapack.com"),
            admin_password: var("ADMIN_PASSWORD"),
            login_domain: or("LOGIN_DOMAIN", "novapack.com"),
            ticket_prefix_fallback: or("TICKET_PREFIX_FALLBACK", "NOV"),
            allocation_max_attempts: parsed("ALLOCATION_MAX_ATTEMPTS", var("ALLOCATION_MAX_ATTEMPTS"), 5)?,
            allocation_backoff: Duration::from_millis(parsed(
                "ALLOCATION_BACKOFF_MS",
                var("ALLOCATION_BACKOFF_MS"),
                25,
            )?),
            recent_tickets_limit: parsed("RECENT_TICKETS_LIMIT", var("RECENT_TICKETS_LIMIT"), 50)?,
            fonts_dir: or("FONTS_DIR", "./fonts"),
            brand_name: or("BRAND_NAME", "NOVAPACK"),
        })
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: Option<PgPool>,
    pub admin_password: Option<String>,
    pub auth_service: AuthService,
    pub ticket_service: TicketService,
    pub query_service: TicketQueryService,
    pub destination_service: DestinationService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        match config.store_backend {
            StoreBackend::Postgres => {
                let database_url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL deve ser definida")?;

                // Conecta ao banco de dados, usando '?' para propagar erros
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await?;

                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

                let mut state = Self::with_stores(
                    config,
                    Arc::new(UserRepository::new(db_pool.clone())),
                    Arc::new(TicketRepository::new(db_pool.clone())),
                );
                state.db_pool = Some(db_pool);
                Ok(state)
            }
            StoreBackend::Memory => {
                tracing::warn!("⚠️ STORE_BACKEND=memory: os dados não sobrevivem ao reinício.");
                let store = MemoryStore::new();
                Ok(Self::with_stores(config, Arc::new(store.clone()), Arc::new(store)))
            }
        }
    }

    // --- Monta o gráfico de dependências ---
    pub fn with_stores(
        config: &Config,
        accounts: Arc<dyn AccountStore>,
        tickets: Arc<dyn TicketStore>,
    ) -> Self {
        let policy = AccessPolicy::new(config.admin_email.clone());

        let allocator = TicketAllocator::new(
            tickets.clone(),
            config.ticket_prefix_fallback.clone(),
            config.allocation_max_attempts,
            config.allocation_backoff,
        );
        let destination_service = DestinationService::new(tickets.clone());
        let document_service = DocumentService::new(config.fonts_dir.clone(), config.brand_name.clone());

        Self {
            db_pool: None,
            admin_password: config.admin_password.clone(),
            auth_service: AuthService::new(
                accounts,
                policy.clone(),
                config.jwt_secret.clone(),
                config.login_domain.clone(),
            ),
            ticket_service: TicketService::new(
                tickets.clone(),
                policy.clone(),
                allocator,
                destination_service.clone(),
                document_service,
                config.brand_name.clone(),
            ),
            query_service: TicketQueryService::new(tickets, policy, config.recent_tickets_limit),
            destination_service,
        }
    }
}
