// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,

        // --- Tickets ---
        handlers::tickets::list_tickets,
        handlers::tickets::create_ticket,
        handlers::tickets::get_ticket,
        handlers::tickets::update_ticket,
        handlers::tickets::delete_ticket,
        handlers::tickets::share_ticket,

        // --- Documents ---
        handlers::documents::delivery_note_pdf,
        handlers::documents::label_pdf,

        // --- Destinations ---
        handlers::destinations::list_destinations,
        handlers::destinations::create_destination,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::Role,
            models::auth::Principal,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Tickets ---
            models::ticket::TicketKey,
            models::ticket::TicketStatus,
            models::ticket::TicketFields,
            models::ticket::TicketDraft,
            models::ticket::Ticket,
            models::ticket::CreateTicketPayload,
            models::ticket::TicketDayGroup,
            models::ticket::TicketListing,
            models::ticket::ShareLinks,

            // --- Destinations ---
            models::destination::Destination,
            models::destination::CreateDestinationPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário"),
        (name = "Tickets", description = "Albaranes: numeração, consulta e edição"),
        (name = "Documents", description = "Albarán e etiqueta em PDF"),
        (name = "Destinations", description = "Agenda de destinos")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
