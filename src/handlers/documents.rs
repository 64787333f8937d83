// src/handlers/documents.rs

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{
    common::error::AppError, config::AppState, middleware::auth::AuthenticatedUser,
    models::ticket::TicketKey,
};

fn pdf_response(filename: String, pdf_bytes: Vec<u8>) -> Response {
    // Configura os Headers para o navegador baixar ou mostrar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("inline; filename=\"{}\"", filename)),
    ];
    (headers, pdf_bytes).into_response()
}

#[utoipa::path(
    get,
    path = "/api/tickets/{owner_id}/{custom_id}/pdf",
    tag = "Documents",
    params(
        ("owner_id" = Uuid, Path, description = "Dono do albarán"),
        ("custom_id" = String, Path, description = "Número do albarán")
    ),
    responses(
        (status = 200, description = "Albarán em PDF (duas vias). Marca como impresso."),
        (status = 403, description = "Albarán de outro dono"),
        (status = 404, description = "Albarán não existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn delivery_note_pdf(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path((owner_id, custom_id)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    let key = TicketKey::new(owner_id, custom_id);
    let (ticket, pdf_bytes) = app_state
        .ticket_service
        .print_delivery_note(&principal, &key)
        .await?;

    Ok(pdf_response(format!("albaran_{}.pdf", ticket.custom_id), pdf_bytes))
}

#[utoipa::path(
    get,
    path = "/api/tickets/{owner_id}/{custom_id}/label",
    tag = "Documents",
    params(
        ("owner_id" = Uuid, Path, description = "Dono do albarán"),
        ("custom_id" = String, Path, description = "Número do albarán")
    ),
    responses(
        (status = 200, description = "Etiqueta 10x15 em PDF"),
        (status = 403, description = "Albarán de outro dono"),
        (status = 404, description = "Albarán não existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn label_pdf(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path((owner_id, custom_id)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    let key = TicketKey::new(owner_id, custom_id);
    let (ticket, pdf_bytes) = app_state.ticket_service.print_label(&principal, &key).await?;

    Ok(pdf_response(format!("etiqueta_{}.pdf", ticket.custom_id), pdf_bytes))
}
