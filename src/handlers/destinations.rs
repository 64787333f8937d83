// src/handlers/destinations.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::destination::{CreateDestinationPayload, Destination, SearchDestinationsQuery},
};

#[utoipa::path(
    get,
    path = "/api/destinations",
    tag = "Destinations",
    params(SearchDestinationsQuery),
    responses(
        (status = 200, description = "Agenda de destinos (ou sugestões quando q tem 2+ caracteres)", body = [Destination])
    ),
    security(("api_jwt" = []))
)]
pub async fn list_destinations(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Query(query): Query<SearchDestinationsQuery>,
) -> Result<Json<Vec<Destination>>, AppError> {
    let service = &app_state.destination_service;
    let destinations = match query.q.as_deref() {
        Some(q) => service.search(principal.id, q).await?,
        None => service.list(principal.id).await?,
    };
    Ok(Json(destinations))
}

#[utoipa::path(
    post,
    path = "/api/destinations",
    tag = "Destinations",
    request_body = CreateDestinationPayload,
    responses(
        (status = 201, description = "Destino guardado", body = Destination),
        (status = 200, description = "Já existia um destino com esse nome")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_destination(
    State(app_state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(payload): Json<CreateDestinationPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let saved = app_state
        .destination_service
        .save_if_new(principal.id, &payload.name, &payload.address)
        .await?;

    Ok(match saved {
        Some(destination) => (StatusCode::CREATED, Json(Some(destination))),
        None => (StatusCode::OK, Json(None)),
    })
}
