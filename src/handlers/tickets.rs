// src/handlers/tickets.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::ticket::{
        CreateTicketPayload, ListTicketsQuery, ShareLinks, Ticket, TicketDraft, TicketKey,
        TicketListing,
    },
};

#[utoipa::path(
    get,
    path = "/api/tickets",
    tag = "Tickets",
    params(ListTicketsQuery),
    responses(
        (status = 200, description = "Albaranes visíveis ao usuário, agrupados por dia", body = TicketListing),
        (status = 500, description = "Error cargando datos")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_tickets(
    State(app_state): State<AppState>,
    Locale(lang): Locale,
    AuthenticatedUser(principal): AuthenticatedUser,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<TicketListing>, AppError> {
    let listing = app_state
        .query_service
        .list(&principal, query.date.into(), &lang)
        .await?;

    Ok(Json(listing))
}

#[utoipa::path(
    post,
    path = "/api/tickets",
    tag = "Tickets",
    request_body = CreateTicketPayload,
    responses(
        (status = 201, description = "Albarán criado com número sequencial", body = Ticket),
        (status = 409, description = "Albarán já existe"),
        (status = 503, description = "Contador disputado, tente de novo")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_ticket(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(payload): Json<CreateTicketPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let ticket = app_state
        .ticket_service
        .create(&principal, payload.draft, payload.save_destination)
        .await?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

#[utoipa::path(
    get,
    path = "/api/tickets/{owner_id}/{custom_id}",
    tag = "Tickets",
    params(
        ("owner_id" = Uuid, Path, description = "Dono do albarán"),
        ("custom_id" = String, Path, description = "Número do albarán (ex.: MAR-00007)")
    ),
    responses(
        (status = 200, description = "Albarán", body = Ticket),
        (status = 403, description = "Albarán de outro dono"),
        (status = 404, description = "Albarán não existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_ticket(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path((owner_id, custom_id)): Path<(Uuid, String)>,
) -> Result<Json<Ticket>, AppError> {
    let key = TicketKey::new(owner_id, custom_id);
    Ok(Json(app_state.ticket_service.get(&principal, &key).await?))
}

#[utoipa::path(
    put,
    path = "/api/tickets/{owner_id}/{custom_id}",
    tag = "Tickets",
    request_body = TicketDraft,
    params(
        ("owner_id" = Uuid, Path, description = "Dono do albarán"),
        ("custom_id" = String, Path, description = "Número do albarán")
    ),
    responses(
        (status = 200, description = "Albarán atualizado na subárvore do dono", body = Ticket),
        (status = 403, description = "Albarán de outro dono"),
        (status = 404, description = "Albarán não existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_ticket(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path((owner_id, custom_id)): Path<(Uuid, String)>,
    Json(draft): Json<TicketDraft>,
) -> Result<Json<Ticket>, AppError> {
    draft.validate()?;

    let key = TicketKey::new(owner_id, custom_id);
    let ticket = app_state.ticket_service.update(&principal, &key, draft).await?;
    Ok(Json(ticket))
}

#[utoipa::path(
    delete,
    path = "/api/tickets/{owner_id}/{custom_id}",
    tag = "Tickets",
    params(
        ("owner_id" = Uuid, Path, description = "Dono do albarán"),
        ("custom_id" = String, Path, description = "Número do albarán")
    ),
    responses(
        (status = 204, description = "Albarán apagado (o número não é reutilizado)"),
        (status = 403, description = "Albarán de outro dono"),
        (status = 404, description = "Albarán não existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_ticket(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path((owner_id, custom_id)): Path<(Uuid, String)>,
) -> Result<StatusCode, AppError> {
    let key = TicketKey::new(owner_id, custom_id);
    app_state.ticket_service.delete(&principal, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/tickets/{owner_id}/{custom_id}/share",
    tag = "Tickets",
    params(
        ("owner_id" = Uuid, Path, description = "Dono do albarán"),
        ("custom_id" = String, Path, description = "Número do albarán")
    ),
    responses(
        (status = 200, description = "Links de WhatsApp e e-mail", body = ShareLinks)
    ),
    security(("api_jwt" = []))
)]
pub async fn share_ticket(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path((owner_id, custom_id)): Path<(Uuid, String)>,
) -> Result<Json<ShareLinks>, AppError> {
    let key = TicketKey::new(owner_id, custom_id);
    Ok(Json(app_state.ticket_service.share_links(&principal, &key).await?))
}
