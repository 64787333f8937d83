// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers, middleware::auth::auth_guard};

pub fn router(app_state: AppState) -> Router {
    // Define as rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    // Define as rotas de usuário (protegidas pelo middleware)
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let ticket_routes = Router::new()
        .route(
            "/",
            get(handlers::tickets::list_tickets).post(handlers::tickets::create_ticket),
        )
        .route(
            "/{owner_id}/{custom_id}",
            get(handlers::tickets::get_ticket)
                .put(handlers::tickets::update_ticket)
                .delete(handlers::tickets::delete_ticket),
        )
        .route("/{owner_id}/{custom_id}/pdf", get(handlers::documents::delivery_note_pdf))
        .route("/{owner_id}/{custom_id}/label", get(handlers::documents::label_pdf))
        .route("/{owner_id}/{custom_id}/share", get(handlers::tickets::share_ticket))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let destination_routes = Router::new()
        .route(
            "/",
            get(handlers::destinations::list_destinations)
                .post(handlers::destinations::create_destination),
        )
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/tickets", ticket_routes)
        .nest("/api/destinations", destination_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}
