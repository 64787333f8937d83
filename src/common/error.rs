// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// As mensagens visíveis ao usuário ficam em espanhol (o produto é espanhol).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // --- Autenticação ---
    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Senha incorreta")]
    WrongPassword,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Senha fraca")]
    WeakPassword,

    #[error("Token inválido")]
    InvalidToken,

    // --- Acesso / albaranes ---
    #[error("Acesso negado: {0}")]
    Forbidden(String),

    #[error("Albarán não encontrado: {0}")]
    TicketNotFound(String),

    #[error("Albarán já existe: {0}")]
    TicketAlreadyExists(String),

    #[error("Contador disputado após {attempts} tentativas")]
    AllocationContention { attempts: u32 },

    #[error("Falha na consulta: {0}")]
    QueryFailed(String),

    // --- Documentos ---
    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    #[error("Erro ao gerar documento: {0}")]
    DocumentError(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::WeakPassword => StatusCode::BAD_REQUEST,
            AppError::WrongPassword | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::UserNotFound | AppError::TicketNotFound(_) => StatusCode::NOT_FOUND,
            AppError::EmailAlreadyExists | AppError::TicketAlreadyExists(_) => StatusCode::CONFLICT,
            AppError::AllocationContention { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Mensagem exibida ao usuário final.
    pub fn user_message(&self) -> String {
        match self {
            AppError::ValidationError(_) => "Uno o más campos no son válidos.".to_string(),
            AppError::EmailAlreadyExists => "Ese usuario ya está registrado.".to_string(),
            AppError::WrongPassword => "Contraseña incorrecta.".to_string(),
            AppError::UserNotFound => "El usuario no existe.".to_string(),
            AppError::WeakPassword => "La contraseña debe tener al menos 6 caracteres.".to_string(),
            AppError::InvalidToken => "Token de autenticación inválido o ausente.".to_string(),
            AppError::Forbidden(_) => "No tienes permiso para modificar este albarán.".to_string(),
            AppError::TicketNotFound(id) => format!("El albarán {} no existe.", id),
            AppError::TicketAlreadyExists(id) => format!("Error: el albarán {} ya existe.", id),
            AppError::AllocationContention { attempts } => format!(
                "Error: no se pudo reservar el número de albarán tras {} intentos. Inténtalo de nuevo.",
                attempts
            ),
            AppError::QueryFailed(reason) => format!("Error cargando datos: {}", reason),
            // Na alocação o usuário vê o motivo cru e pode reenviar.
            AppError::DatabaseError(e) => format!("Error: {}", e),
            AppError::FontNotFound(_) | AppError::DocumentError(_) => {
                "Error al generar el documento.".to_string()
            }
            _ => "Ha ocurrido un error inesperado.".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Retorna todos os detalhes da validação.
        if let AppError::ValidationError(errors) = &self {
            let mut details = std::collections::HashMap::new();
            for (field, field_errors) in errors.field_errors() {
                let messages: Vec<String> = field_errors
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .collect();
                details.insert(field.to_string(), messages);
            }
            let body = Json(json!({
                "error": self.user_message(),
                "details": details,
            }));
            return (status, body).into_response();
        }

        if status.is_server_error() {
            tracing::error!("🔥 Erro Interno do Servidor: {}", self);
        }

        let body = Json(json!({ "error": self.user_message() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_have_distinct_statuses_and_messages() {
        assert_eq!(AppError::UserNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::WrongPassword.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::EmailAlreadyExists.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::WeakPassword.status(), StatusCode::BAD_REQUEST);

        assert_eq!(AppError::WrongPassword.user_message(), "Contraseña incorrecta.");
        assert_eq!(AppError::UserNotFound.user_message(), "El usuario no existe.");
    }

    #[test]
    fn query_failures_carry_the_reason() {
        let err = AppError::QueryFailed("timeout".into());
        assert_eq!(err.user_message(), "Error cargando datos: timeout");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
